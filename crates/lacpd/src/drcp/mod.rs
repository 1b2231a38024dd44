//! Distributed Relay Control Protocol: portal state and machines
//! (802.1AX-2014 clause 9).
//!
//! Each Distributed Relay runs as one portal actor owning the Portal
//! System, Gateway and Aggregator machines plus the per-IPP Receive,
//! Periodic and Network/IPL machines, with the same inbox/effects design
//! as the port actors.

pub mod conversation;
pub mod gateway_vector;
pub mod machines;
pub mod portal;

use crate::error::{ConfigError, ConfigResult};
use crate::system::LacpSystem;
use serde::{Deserialize, Serialize};
use sonic_lacp_types::MacAddress;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

use machines::aggregator::AggEvent;
use machines::gateway::GatewayEvent;
use machines::ipp_periodic::IppPeriodicEvent;
use machines::ipp_rx::IppRxEvent;
use machines::net_ipl::NetIplEvent;
use machines::ps::PsEvent;

/// Parameters for creating a Distributed Relay.
#[derive(Debug, Clone, Deserialize)]
pub struct DistributedRelayConfig {
    pub name: String,
    /// Shared portal identity; must match on both portal systems.
    pub portal_addr: MacAddress,
    #[serde(default = "default_portal_priority")]
    pub portal_priority: u16,
    /// This system's number within the portal: 1 or 2.
    pub system_number: u8,
    /// The LACP aggregator this relay fronts.
    pub aggregator_id: u32,
    pub aggregator_mac: MacAddress,
    #[serde(default = "default_portal_priority")]
    pub aggregator_priority: u16,
    pub admin_aggregator_key: u16,
    /// The intra-portal link's port number.
    pub ipp_port: u16,
    #[serde(default)]
    pub three_system: bool,
    /// Overrides applied on top of the default VID time-sharing map:
    /// (conversation id, portal system preference list).
    #[serde(default)]
    pub gateway_assignments: Vec<(u16, Vec<u8>)>,
}

fn default_portal_priority() -> u16 {
    32768
}

/// Timers of one portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortalTimerKind {
    IppCurrentWhile,
    IppPeriodic,
}

/// External events delivered to a portal actor.
#[derive(Debug)]
pub enum PortalEvent {
    Begin,
    /// A raw frame arrived on the intra-portal link.
    IppFrame(Vec<u8>),
    Timer(PortalTimerKind),
    /// The fronted LACP aggregator changed (keys, membership).
    AggregatorChanged,
    Kill(oneshot::Sender<()>),
}

/// An event addressed to one of the portal's machines.
#[derive(Debug)]
pub enum PortalMachineInput {
    Ps(PsEvent),
    Gateway(GatewayEvent),
    Agg(AggEvent),
    IppRx(IppRxEvent),
    IppPeriodic(IppPeriodicEvent),
    NetIpl(NetIplEvent),
}

/// Side effects produced by a portal machine step.
#[derive(Debug)]
pub enum PortalAction {
    Machine(PortalMachineInput),
    StartTimer(PortalTimerKind, Duration),
    StopTimer(PortalTimerKind),
    /// Transmit a DRCPDU on the intra-portal link.
    NttIpp,
}

pub type PortalActions = Vec<PortalAction>;

/// Read-only operational view of a portal.
#[derive(Debug, Clone, Serialize)]
pub struct DrOperView {
    pub name: String,
    pub system_number: u8,
    pub ps_state: &'static str,
    pub gateway_state: &'static str,
    pub aggregator_state: &'static str,
    pub ipp_rx_state: &'static str,
    pub ipp_periodic_state: &'static str,
    pub net_ipl_state: &'static str,
    /// Conversation ids this portal system gateways.
    pub gateway_conversations: Vec<u16>,
    /// Conversation ids carried by locally collected frames.
    pub port_conversations: Vec<u16>,
    pub gateway_digest: [u8; 16],
    pub differ_portal: bool,
    pub drcpdu_rx: u64,
    pub drcpdu_tx: u64,
    pub parse_errors: u64,
}

/// Handle for delivering events to a portal actor.
#[derive(Debug, Clone)]
pub struct PortalHandle {
    pub name: String,
    pub(crate) events: mpsc::UnboundedSender<PortalEvent>,
    pub snapshot: watch::Receiver<DrOperView>,
}

impl PortalHandle {
    pub(crate) fn send(&self, event: PortalEvent) {
        if self.events.send(event).is_err() {
            warn!(portal = %self.name, "event for stopped portal actor dropped");
        }
    }

    pub fn deliver_frame(&self, _port: u16, frame: Vec<u8>) {
        self.send(PortalEvent::IppFrame(frame));
    }

    pub fn same_portal(&self, other: &PortalHandle) -> bool {
        self.events.same_channel(&other.events)
    }
}

impl LacpSystem {
    /// Creates a Distributed Relay and starts its portal actor.
    pub async fn create_dr(&self, config: DistributedRelayConfig) -> ConfigResult<()> {
        if config.three_system {
            return Err(ConfigError::ThreeSystemPortal);
        }
        if !(1..=2).contains(&config.system_number) {
            return Err(ConfigError::InvalidPortalSystemNumber(config.system_number));
        }
        if self.portal(&config.name).is_some() {
            return Err(ConfigError::DuplicatePortal(config.name));
        }

        let name = config.name.clone();
        let ipp_port = config.ipp_port;
        let handle = portal::spawn_portal(config, self.clone());
        self.insert_portal(name.clone(), handle.clone(), ipp_port);
        handle.send(PortalEvent::Begin);
        info!(portal = %name, "distributed relay created");
        Ok(())
    }

    /// Deletes a Distributed Relay, stopping its actor with a barrier.
    pub async fn delete_dr(&self, name: &str) -> ConfigResult<()> {
        let handle = self
            .remove_portal(name)
            .ok_or_else(|| ConfigError::UnknownPortal(name.to_string()))?;
        let (ack_tx, ack_rx) = oneshot::channel();
        handle.send(PortalEvent::Kill(ack_tx));
        let _ = ack_rx.await;
        info!(portal = name, "distributed relay deleted");
        Ok(())
    }

    /// The current operational view of a Distributed Relay.
    pub fn dr_view(&self, name: &str) -> Option<DrOperView> {
        self.portal(name).map(|h| h.snapshot.borrow().clone())
    }
}
