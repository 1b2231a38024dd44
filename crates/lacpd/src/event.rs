//! Events and effects flowing through a port actor.
//!
//! External inputs arrive as [`PortEvent`]s on the actor's inbox. Machines
//! never touch timers, hardware or the wire directly: they append
//! [`Action`]s to the turn's effect list and the actor applies them, which
//! keeps every machine synchronous and every cross-machine interaction an
//! explicit message.

use crate::aggregator::Selection;
use crate::machines::churn::ChurnEvent;
use crate::machines::mux::MuxEvent;
use crate::machines::periodic::PeriodicEvent;
use crate::machines::rx::RxEvent;
use crate::machines::tx::TxEvent;
use crate::timers::TimerKind;
use sonic_lacp_pdu::SlowPdu;
use sonic_lacp_types::{LacpMode, LacpTimeout, SystemId};
use std::time::Duration;
use tokio::sync::oneshot;

/// External events delivered to a port actor.
#[derive(Debug)]
pub enum PortEvent {
    /// Reset every machine to its initial state.
    Begin,
    /// Link came up (or the port was administratively enabled).
    PortUp,
    /// Link went down (or the port was administratively disabled).
    PortDown,
    /// Configuration changed the LACP mode and/or timeout.
    SetLacpMode {
        mode: LacpMode,
        timeout: Option<LacpTimeout>,
    },
    /// Membership management toggled the aggregatable admin bit.
    SetAggregatable(bool),
    /// Membership management changed the actor admin key.
    SetAdminKey(u16),
    /// Something relevant to selection changed elsewhere (an aggregator was
    /// created, a member list was edited); run a selection pass.
    Reevaluate,
    /// A raw frame arrived from the link.
    Frame(Vec<u8>),
    /// One of the port's timers expired.
    Timer(TimerKind),
    /// A selection pass assigned this port a new verdict.
    Selection(SelectionVerdict),
    /// The port's aggregator finished waiting: every selected member is
    /// ready to attach.
    AggregatorReady,
    /// This port's partner has been seen on another port.
    PortMoved,
    /// Stop the actor; the barrier is acknowledged once timers are stopped
    /// and the task is about to exit.
    Kill(oneshot::Sender<()>),
}

/// The outcome of a selection pass for one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionVerdict {
    pub selection: Selection,
    pub agg_id: u32,
    /// Whether the aggregator's other members were already converged when
    /// this verdict was computed; lets the Mux machine skip the wait.
    pub agg_ready: bool,
}

/// An event addressed to one of the port's machines.
#[derive(Debug)]
pub enum MachineInput {
    Rx(RxEvent),
    Periodic(PeriodicEvent),
    Mux(MuxEvent),
    Churn(ChurnEvent),
    Tx(TxEvent),
}

/// Data-plane commands issued by the Mux machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxHwOp {
    Attach,
    Detach,
    EnableCollecting,
    DisableCollecting,
    EnableDistributing,
    DisableDistributing,
    EnableCollectingDistributing,
    DisableCollectingDistributing,
}

/// Side effects produced by a machine step.
#[derive(Debug)]
pub enum Action {
    /// Deliver a follow-up event to a machine of the same port.
    Machine(MachineInput),
    StartTimer(TimerKind, Duration),
    StopTimer(TimerKind),
    /// Set need-to-transmit and poke the Tx machine.
    Ntt,
    /// Program the ASIC.
    Hardware(MuxHwOp),
    /// Send a PDU out this port.
    Transmit(SlowPdu),
    /// Re-run selection for this port.
    Reselect,
    /// This port's wait_while is over: record ready_N and let the
    /// aggregator decide whether everyone may attach.
    EvaluateReady,
    /// Look for another local port that already recorded this partner.
    CheckPortMoved {
        partner_system: SystemId,
        partner_port: u16,
    },
}

/// The effect list of one machine step.
pub type Actions = Vec<Action>;
