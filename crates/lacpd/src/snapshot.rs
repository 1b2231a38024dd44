//! Read-only operational views.
//!
//! Port actors publish a fresh [`PortSnapshot`] after every event turn;
//! everything an operator (or another task) reads comes from these copies,
//! never from live machine state.

use crate::aggregator::Selection;
use serde::Serialize;
use sonic_lacp_types::{LacpState, SystemId};

/// Per-port protocol counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PortCounters {
    pub lacpdu_rx: u64,
    pub lacpdu_tx: u64,
    pub marker_rx: u64,
    pub marker_response_tx: u64,
    /// Frames dropped by the codec; a bad PDU never moves a machine.
    pub parse_errors: u64,
    pub actor_churn_events: u64,
    pub partner_churn_events: u64,
}

/// Copy-on-read view of one port's operational state.
#[derive(Debug, Clone, Serialize)]
pub struct PortSnapshot {
    pub number: u16,
    pub actor_system: SystemId,
    pub actor_oper_key: u16,
    pub actor_state: LacpState,
    pub partner_system: SystemId,
    pub partner_oper_key: u16,
    pub partner_port_number: u16,
    pub partner_state: LacpState,
    pub selection: Selection,
    pub agg_id: u32,
    pub ready_n: bool,
    pub port_enabled: bool,
    pub lacp_enabled: bool,
    pub rx_state: &'static str,
    pub periodic_state: &'static str,
    pub mux_state: &'static str,
    pub actor_churn_state: &'static str,
    pub partner_churn_state: &'static str,
    pub counters: PortCounters,
}

/// Copy-on-read view of one aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatorOperView {
    pub id: u32,
    pub name: String,
    pub oper_key: u16,
    pub partner_system: SystemId,
    pub partner_oper_key: u16,
    pub members: Vec<u16>,
    pub selected_members: Vec<u16>,
    pub ready: bool,
    pub min_links: u16,
}
