//! Per-port operational variables and the port actor task.
//!
//! A port's five machines and all of its variables are owned by exactly one
//! tokio task. The task drains one inbox of [`PortEvent`]s; within a turn it
//! runs machine follow-up events to quiescence and then publishes a fresh
//! snapshot. Nothing outside the task ever touches live port state.

use crate::aggregator::Selection;
use crate::event::{Action, Actions, MachineInput, MuxHwOp, PortEvent, SelectionVerdict};
use crate::machines::churn::{ChurnEvent, ChurnMachine};
use crate::machines::marker;
use crate::machines::mux::{MuxEvent, MuxMachine, MuxState};
use crate::machines::periodic::{PeriodicEvent, PeriodicMachine};
use crate::machines::rx::{RxEvent, RxMachine};
use crate::machines::tx::{TxEvent, TxMachine};
use crate::registry::{PortHandle, PortRecord};
use crate::selection;
use crate::snapshot::{PortCounters, PortSnapshot};
use crate::system::LacpSystem;
use crate::timers::{TimerKind, TimerSet, LONG_TIMEOUT, SHORT_TIMEOUT};
use sonic_lacp_pdu::{ParticipantInfo, SlowPdu, SlowProtocolFrame};
use sonic_lacp_types::{LacpMode, LacpState, LacpTimeout, PortIdentity, PortProperties, SystemId};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// The operational variables of one aggregation port (802.1AX-2014 6.4.7),
/// shared by its five machines.
#[derive(Debug, Clone)]
pub struct PortVars {
    pub number: u16,
    pub actor_system: SystemId,
    pub actor_port: PortIdentity,
    pub actor_admin_key: u16,
    pub actor_oper_key: u16,
    pub actor_admin_state: LacpState,
    pub actor_oper_state: LacpState,
    pub partner_admin: ParticipantInfo,
    pub partner_oper: ParticipantInfo,
    pub actor_collector_max_delay: u16,
    pub partner_collector_max_delay: u16,
    pub agg_id: u32,
    pub selection: Selection,
    /// Last known "everyone else is converged" flag for this port's
    /// aggregator, carried on selection verdicts.
    pub agg_ready: bool,
    pub ready_n: bool,
    pub port_enabled: bool,
    pub lacp_enabled: bool,
    pub mode: LacpMode,
    pub properties: PortProperties,
    pub ntt: bool,
    pub counters: PortCounters,
}

impl PortVars {
    pub fn new(
        system: SystemId,
        number: u16,
        priority: u16,
        admin_key: u16,
        mode: LacpMode,
        timeout: LacpTimeout,
        properties: PortProperties,
    ) -> Self {
        let mut admin_state = LacpState::default();
        if mode.lacp_enabled() {
            admin_state.set(LacpState::AGGREGATION);
        }
        if mode == LacpMode::Active {
            admin_state.set(LacpState::ACTIVITY);
        }
        if timeout == LacpTimeout::Short {
            admin_state.set(LacpState::TIMEOUT);
        }

        // a defaulted partner is assumed willing: aggregatable and in sync,
        // so a lone system can still bring links into service
        let partner_admin = ParticipantInfo {
            system: SystemId::ZERO,
            key: 0,
            port: PortIdentity::default(),
            state: LacpState::new(
                LacpState::AGGREGATION
                    | LacpState::SYNC
                    | LacpState::COLLECTING
                    | LacpState::DISTRIBUTING,
            ),
        };

        PortVars {
            number,
            actor_system: system,
            actor_port: PortIdentity::new(priority, number),
            actor_admin_key: admin_key,
            actor_oper_key: admin_key,
            actor_admin_state: admin_state,
            actor_oper_state: admin_state,
            partner_admin,
            partner_oper: partner_admin,
            actor_collector_max_delay: 0,
            partner_collector_max_delay: 0,
            agg_id: 0,
            selection: Selection::Unselected,
            agg_ready: false,
            ready_n: false,
            port_enabled: false,
            lacp_enabled: mode.lacp_enabled(),
            mode,
            properties,
            ntt: false,
            counters: PortCounters::default(),
        }
    }

    /// The actor record transmitted in LACPDUs.
    pub fn actor_participant(&self) -> ParticipantInfo {
        ParticipantInfo {
            system: self.actor_system,
            key: self.actor_oper_key,
            port: self.actor_port,
            state: self.actor_oper_state,
        }
    }

    /// recordDefault: partner oper falls back to the admin record.
    pub fn record_default(&mut self) {
        self.partner_oper = self.partner_admin;
        self.actor_oper_state.set(LacpState::DEFAULTED);
    }

    /// The admin record the partner oper falls back to when defaulted.
    pub fn partner_admin_defaulted(&self) -> ParticipantInfo {
        self.partner_admin
    }

    /// current_while interval chosen by our own timeout preference.
    pub fn current_while_interval(&self) -> Duration {
        if self.actor_oper_state.short_timeout() {
            SHORT_TIMEOUT
        } else {
            LONG_TIMEOUT
        }
    }

    /// Applies a mode/timeout configuration change the way the original
    /// set-mode operation does: admin and oper bits move together.
    pub fn apply_mode(&mut self, mode: LacpMode, timeout: Option<LacpTimeout>) {
        if let Some(timeout) = timeout {
            let short = timeout == LacpTimeout::Short;
            self.actor_admin_state.assign(LacpState::TIMEOUT, short);
            self.actor_oper_state.assign(LacpState::TIMEOUT, short);
        }

        if mode != self.mode {
            self.mode = mode;
            self.lacp_enabled = mode.lacp_enabled();
            let aggregatable = mode.lacp_enabled();
            let active = mode == LacpMode::Active;
            self.actor_admin_state
                .assign(LacpState::AGGREGATION, aggregatable);
            self.actor_oper_state
                .assign(LacpState::AGGREGATION, aggregatable);
            self.actor_admin_state.assign(LacpState::ACTIVITY, active);
            self.actor_oper_state.assign(LacpState::ACTIVITY, active);
        }
    }

    /// The mirror of this port the selection logic works on.
    pub fn to_record(&self) -> PortRecord {
        PortRecord {
            number: self.number,
            actor_port: self.actor_port,
            actor_admin_key: self.actor_admin_key,
            actor_oper_key: self.actor_oper_key,
            aggregatable: self.actor_oper_state.aggregation(),
            partner_system: self.partner_oper.system,
            partner_oper_key: self.partner_oper.key,
            partner_port_number: self.partner_oper.port.number,
            partner_aggregatable: self.partner_oper.state.aggregation(),
            enabled: self.port_enabled,
            lacp_enabled: self.lacp_enabled,
            properties: self.properties,
            selection: self.selection,
            agg_id: self.agg_id,
        }
    }
}

/// One aggregation port: variables plus its five machines.
pub struct AggPort {
    pub vars: PortVars,
    pub rx: RxMachine,
    pub periodic: PeriodicMachine,
    pub mux: MuxMachine,
    pub churn: ChurnMachine,
    pub tx: TxMachine,
}

impl AggPort {
    pub fn new(vars: PortVars, coupled_mux: bool) -> Self {
        let number = vars.number;
        AggPort {
            vars,
            rx: RxMachine::new(number),
            periodic: PeriodicMachine::new(number),
            mux: MuxMachine::new(number, coupled_mux),
            churn: ChurnMachine::new(number),
            tx: TxMachine::new(number),
        }
    }

    pub fn snapshot(&self) -> PortSnapshot {
        PortSnapshot {
            number: self.vars.number,
            actor_system: self.vars.actor_system,
            actor_oper_key: self.vars.actor_oper_key,
            actor_state: self.vars.actor_oper_state,
            partner_system: self.vars.partner_oper.system,
            partner_oper_key: self.vars.partner_oper.key,
            partner_port_number: self.vars.partner_oper.port.number,
            partner_state: self.vars.partner_oper.state,
            selection: self.vars.selection,
            agg_id: self.vars.agg_id,
            ready_n: self.vars.ready_n,
            port_enabled: self.vars.port_enabled,
            lacp_enabled: self.vars.lacp_enabled,
            rx_state: self.rx.state_name(),
            periodic_state: self.periodic.state_name(),
            mux_state: self.mux.state_name(),
            actor_churn_state: self.churn.actor_state_name(),
            partner_churn_state: self.churn.partner_state_name(),
            counters: self.vars.counters,
        }
    }

    pub fn mux_state(&self) -> MuxState {
        self.mux.state()
    }

    fn dispatch(&mut self, input: MachineInput, actions: &mut Actions) {
        match input {
            MachineInput::Rx(ev) => self.rx.on_event(&mut self.vars, ev, actions),
            MachineInput::Periodic(ev) => self.periodic.on_event(&mut self.vars, ev, actions),
            MachineInput::Mux(ev) => self.mux.on_event(&mut self.vars, ev, actions),
            MachineInput::Churn(ev) => self.churn.on_event(&mut self.vars, ev, actions),
            MachineInput::Tx(ev) => self.tx.on_event(&mut self.vars, ev, actions),
        }
    }
}

pub(crate) struct PortCtx {
    pub system: LacpSystem,
    pub timers: TimerSet<TimerKind, PortEvent>,
    pub snapshot: watch::Sender<PortSnapshot>,
}

/// Creates the channels and actor task for a port and returns its handle.
/// The caller registers the handle before any event is sent.
pub(crate) fn spawn_port(vars: PortVars, coupled_mux: bool, system: LacpSystem) -> PortHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let port = AggPort::new(vars, coupled_mux);
    let (snapshot_tx, snapshot_rx) = watch::channel(port.snapshot());

    let handle = PortHandle {
        number: port.vars.number,
        events: events_tx.clone(),
        snapshot: snapshot_rx,
    };

    let ctx = PortCtx {
        system,
        timers: TimerSet::new(events_tx, PortEvent::Timer),
        snapshot: snapshot_tx,
    };

    tokio::spawn(run_port(port, ctx, events_rx));
    handle
}

async fn run_port(
    mut port: AggPort,
    mut ctx: PortCtx,
    mut inbox: mpsc::UnboundedReceiver<PortEvent>,
) {
    info!(port = port.vars.number, "port actor started");
    while let Some(event) = inbox.recv().await {
        match event {
            PortEvent::Kill(ack) => {
                ctx.timers.stop_all();
                let _ = ack.send(());
                break;
            }
            event => {
                handle_event(&mut port, &mut ctx, event).await;
                let _ = ctx.snapshot.send(port.snapshot());
            }
        }
    }
    info!(port = port.vars.number, "port actor stopped");
}

/// Runs one event turn: seed the machine queue from the external event,
/// then drain machines and their effects to quiescence.
async fn handle_event(port: &mut AggPort, ctx: &mut PortCtx, event: PortEvent) {
    let mut queue: VecDeque<MachineInput> = VecDeque::new();
    let mut seed_actions: Actions = Vec::new();

    match event {
        PortEvent::Begin => {
            queue.push_back(MachineInput::Rx(RxEvent::Begin));
            queue.push_back(MachineInput::Periodic(PeriodicEvent::Begin));
            queue.push_back(MachineInput::Mux(MuxEvent::Begin));
            queue.push_back(MachineInput::Churn(ChurnEvent::Begin));
            queue.push_back(MachineInput::Tx(TxEvent::Begin));
        }
        PortEvent::PortUp => {
            port.vars.port_enabled = true;
            queue.push_back(MachineInput::Rx(RxEvent::StatusChanged));
            queue.push_back(MachineInput::Periodic(PeriodicEvent::Evaluate));
            queue.push_back(MachineInput::Tx(TxEvent::Evaluate));
            seed_actions.push(Action::Reselect);
        }
        PortEvent::PortDown => {
            port.vars.port_enabled = false;
            queue.push_back(MachineInput::Rx(RxEvent::StatusChanged));
            queue.push_back(MachineInput::Periodic(PeriodicEvent::Evaluate));
            queue.push_back(MachineInput::Tx(TxEvent::Evaluate));
        }
        PortEvent::SetLacpMode { mode, timeout } => {
            port.vars.apply_mode(mode, timeout);
            queue.push_back(MachineInput::Rx(RxEvent::StatusChanged));
            queue.push_back(MachineInput::Periodic(PeriodicEvent::Evaluate));
            queue.push_back(MachineInput::Tx(TxEvent::Evaluate));
            seed_actions.push(Action::Reselect);
        }
        PortEvent::SetAggregatable(aggregatable) => {
            port.vars
                .actor_admin_state
                .assign(LacpState::AGGREGATION, aggregatable);
            port.vars
                .actor_oper_state
                .assign(LacpState::AGGREGATION, aggregatable);
            seed_actions.push(Action::Ntt);
            seed_actions.push(Action::Reselect);
        }
        PortEvent::SetAdminKey(key) => {
            port.vars.actor_admin_key = key;
            port.vars.actor_oper_key = key;
            seed_actions.push(Action::Ntt);
            seed_actions.push(Action::Reselect);
        }
        PortEvent::Reevaluate => {
            seed_actions.push(Action::Reselect);
        }
        PortEvent::Frame(bytes) => match SlowProtocolFrame::decode(&bytes) {
            Ok(frame) => match frame.pdu {
                SlowPdu::Lacp(pdu) => {
                    port.vars.counters.lacpdu_rx += 1;
                    queue.push_back(MachineInput::Rx(RxEvent::PduReceived(pdu)));
                }
                SlowPdu::Marker(pdu) => {
                    marker::on_marker(&mut port.vars, pdu, &mut seed_actions);
                }
                SlowPdu::Drcp(_) => {
                    debug!(port = port.vars.number, "DRCPDU on aggregation port dropped");
                }
            },
            Err(err) => {
                port.vars.counters.parse_errors += 1;
                debug!(port = port.vars.number, %err, "undecodable frame dropped");
            }
        },
        PortEvent::Timer(kind) => queue.push_back(match kind {
            TimerKind::CurrentWhile => MachineInput::Rx(RxEvent::CurrentWhileExpired),
            TimerKind::Periodic => MachineInput::Periodic(PeriodicEvent::TimerExpired),
            TimerKind::WaitWhile => MachineInput::Mux(MuxEvent::WaitWhileExpired),
            TimerKind::ActorChurn => MachineInput::Churn(ChurnEvent::ActorTimerExpired),
            TimerKind::PartnerChurn => MachineInput::Churn(ChurnEvent::PartnerTimerExpired),
            TimerKind::TxTick => MachineInput::Tx(TxEvent::TickExpired),
        }),
        PortEvent::Selection(verdict) => {
            apply_verdict(&mut port.vars, verdict);
            queue.push_back(MachineInput::Mux(MuxEvent::SelectionChanged));
        }
        PortEvent::AggregatorReady => {
            port.vars.agg_ready = true;
            queue.push_back(MachineInput::Mux(MuxEvent::Ready));
        }
        PortEvent::PortMoved => {
            warn!(port = port.vars.number, "partner moved to another port");
            queue.push_back(MachineInput::Rx(RxEvent::PortMoved));
        }
        PortEvent::Kill(_) => unreachable!("kill handled by the actor loop"),
    }

    apply_actions(port, ctx, seed_actions, &mut queue).await;
    while let Some(input) = queue.pop_front() {
        let mut actions = Vec::new();
        port.dispatch(input, &mut actions);
        apply_actions(port, ctx, actions, &mut queue).await;
    }
}

fn apply_verdict(vars: &mut PortVars, verdict: SelectionVerdict) {
    vars.selection = verdict.selection;
    vars.agg_id = verdict.agg_id;
    vars.agg_ready = verdict.agg_ready;
    if verdict.selection == Selection::Unselected {
        vars.ready_n = false;
    }
}

async fn apply_actions(
    port: &mut AggPort,
    ctx: &mut PortCtx,
    actions: Actions,
    queue: &mut VecDeque<MachineInput>,
) {
    for action in actions {
        match action {
            Action::Machine(input) => queue.push_back(input),
            Action::StartTimer(kind, after) => ctx.timers.start(kind, after),
            Action::StopTimer(kind) => ctx.timers.stop(kind),
            Action::Ntt => {
                port.vars.ntt = true;
                queue.push_back(MachineInput::Tx(TxEvent::Ntt));
            }
            Action::Hardware(op) => apply_hardware(port, ctx, op, queue).await,
            Action::Transmit(pdu) => {
                let frame = SlowProtocolFrame::slow_protocols(port.vars.actor_system.mac, pdu);
                ctx.system
                    .io()
                    .transmit(port.vars.number, frame.encode().to_vec());
            }
            Action::Reselect => {
                ctx.system.registry().update_record(port.vars.to_record());
                selection::reselect(&ctx.system, port.vars.number).await;
            }
            Action::EvaluateReady => {
                ctx.system.registry().update_record(port.vars.to_record());
                selection::evaluate_ready(&ctx.system, port.vars.agg_id, port.vars.number).await;
            }
            Action::CheckPortMoved {
                partner_system,
                partner_port,
            } => {
                let registry = ctx.system.registry();
                if let Some(other) = registry.find_port_with_partner(
                    port.vars.number,
                    partner_system,
                    partner_port,
                ) {
                    registry.send_to_port(other, PortEvent::PortMoved);
                }
            }
        }
    }
}

/// Issues one hardware call with the retry-once policy; a persistent
/// failure demotes the port the same way a link-down does.
async fn apply_hardware(
    port: &mut AggPort,
    ctx: &mut PortCtx,
    op: MuxHwOp,
    queue: &mut VecDeque<MachineInput>,
) {
    let number = port.vars.number;
    let sai = ctx.system.sai().clone();
    let agg_id = port.vars.agg_id;

    let call = |op: MuxHwOp| match op {
        MuxHwOp::Attach => sai.attach_port_to_lag(number, agg_id),
        MuxHwOp::Detach => sai.detach_port_from_lag(number),
        MuxHwOp::EnableCollecting => sai.enable_collecting(number),
        MuxHwOp::DisableCollecting => sai.disable_collecting(number),
        MuxHwOp::EnableDistributing => sai.enable_distributing(number),
        MuxHwOp::DisableDistributing => sai.disable_distributing(number),
        MuxHwOp::EnableCollectingDistributing => sai.enable_collecting_distributing(number),
        MuxHwOp::DisableCollectingDistributing => sai.disable_collecting_distributing(number),
    };

    let mut result = call(op);
    if let Err(ref err) = result {
        if err.is_retryable() {
            warn!(port = number, ?op, %err, "hardware busy, retrying once");
            result = call(op);
        }
    }

    match result {
        Ok(()) => {
            // mirror attach state into the aggregator bookkeeping
            if matches!(op, MuxHwOp::Attach | MuxHwOp::Detach) && agg_id != 0 {
                if let Some(agg) = ctx.system.registry().aggregator(agg_id) {
                    let mut state = agg.state.lock().await;
                    if let Some(member) = state.members.get_mut(&number) {
                        member.attached = op == MuxHwOp::Attach;
                    }
                }
            }
        }
        Err(err) => {
            error!(port = number, ?op, %err, "hardware programming failed, demoting port");
            port.vars.port_enabled = false;
            queue.push_back(MachineInput::Rx(RxEvent::StatusChanged));
            queue.push_back(MachineInput::Periodic(PeriodicEvent::Evaluate));
            queue.push_back(MachineInput::Tx(TxEvent::Evaluate));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::test_vars;
    use super::*;

    #[test]
    fn test_snapshot_reflects_machines() {
        let port = AggPort::new(test_vars(), false);
        let snapshot = port.snapshot();
        assert_eq!(snapshot.number, 1);
        assert_eq!(snapshot.rx_state, "INITIALIZE");
        assert_eq!(snapshot.mux_state, "DETACHED");
        assert_eq!(snapshot.periodic_state, "NO_PERIODIC");
    }

    #[test]
    fn test_apply_mode_on_disables_lacp() {
        let mut vars = test_vars();
        assert!(vars.lacp_enabled);
        vars.apply_mode(LacpMode::On, None);
        assert!(!vars.lacp_enabled);
        assert!(!vars.actor_oper_state.aggregation());
        assert!(!vars.actor_oper_state.activity());

        vars.apply_mode(LacpMode::Passive, Some(LacpTimeout::Long));
        assert!(vars.lacp_enabled);
        assert!(vars.actor_oper_state.aggregation());
        assert!(!vars.actor_oper_state.activity());
        assert!(!vars.actor_oper_state.short_timeout());
    }

    #[test]
    fn test_record_default_sets_defaulted() {
        let mut vars = test_vars();
        vars.partner_oper.key = 99;
        vars.record_default();
        assert_eq!(vars.partner_oper.key, 0);
        assert!(vars.actor_oper_state.defaulted());
        assert!(vars.partner_oper.state.sync());
    }

    #[test]
    fn test_verdict_application() {
        let mut vars = test_vars();
        vars.ready_n = true;
        apply_verdict(
            &mut vars,
            SelectionVerdict {
                selection: Selection::Selected,
                agg_id: 2000,
                agg_ready: false,
            },
        );
        assert_eq!(vars.selection, Selection::Selected);
        assert_eq!(vars.agg_id, 2000);
        // a still-associated verdict keeps ready_n
        assert!(vars.ready_n);

        apply_verdict(
            &mut vars,
            SelectionVerdict {
                selection: Selection::Unselected,
                agg_id: 0,
                agg_ready: false,
            },
        );
        assert!(!vars.ready_n);
    }
}
