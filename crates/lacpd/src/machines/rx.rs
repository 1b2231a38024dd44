//! LACP Receive machine (802.1AX-2014 6.4.12).

use crate::aggregator::Selection;
use crate::event::{Action, Actions, MachineInput};
use crate::fsm::StateHolder;
use crate::machines::churn::ChurnEvent;
use crate::machines::mux::MuxEvent;
use crate::machines::periodic::PeriodicEvent;
use crate::port::PortVars;
use crate::timers::TimerKind;
use sonic_lacp_pdu::LacpPdu;
use sonic_lacp_types::LacpState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    Initialize,
    PortDisabled,
    Expired,
    LacpDisabled,
    Defaulted,
    Current,
}

#[derive(Debug)]
pub enum RxEvent {
    Begin,
    /// port_enabled or lacp_enabled changed; the machine re-reads both.
    StatusChanged,
    PduReceived(LacpPdu),
    CurrentWhileExpired,
    PortMoved,
}

/// Consumes LACPDUs, maintains the partner operational record, and drives
/// re-selection whenever partner knowledge changes.
#[derive(Debug)]
pub struct RxMachine {
    state: StateHolder<RxState>,
}

impl RxMachine {
    pub fn new(port: u16) -> Self {
        RxMachine {
            state: StateHolder::new("rx", port as u32, RxState::Initialize),
        }
    }

    pub fn state(&self) -> RxState {
        self.state.current()
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            RxState::Initialize => "INITIALIZE",
            RxState::PortDisabled => "PORT_DISABLED",
            RxState::Expired => "EXPIRED",
            RxState::LacpDisabled => "LACP_DISABLED",
            RxState::Defaulted => "DEFAULTED",
            RxState::Current => "CURRENT",
        }
    }

    pub fn on_event(&mut self, vars: &mut PortVars, event: RxEvent, actions: &mut Actions) {
        match event {
            RxEvent::Begin => self.begin(vars, actions),
            RxEvent::StatusChanged => self.status_changed(vars, actions),
            RxEvent::PduReceived(pdu) => match self.state.current() {
                RxState::Expired | RxState::Defaulted | RxState::Current => {
                    self.current_rx(vars, pdu, actions)
                }
                // a PDU on a disabled port carries no meaning
                _ => self.state.ignored(&"lacpdu"),
            },
            RxEvent::CurrentWhileExpired => match self.state.current() {
                RxState::Current => self.enter_expired(vars, actions),
                RxState::Expired => self.enter_defaulted(vars, actions),
                // stale timer from an earlier state; drop it
                _ => self.state.ignored(&event),
            },
            RxEvent::PortMoved => self.begin(vars, actions),
        }
    }

    /// INITIALIZE entry, falling through to PORT_DISABLED.
    fn begin(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(RxState::Initialize);
        vars.selection = Selection::Unselected;
        vars.ready_n = false;
        vars.record_default();
        vars.actor_oper_state.clear(LacpState::EXPIRED);
        actions.push(Action::StopTimer(TimerKind::CurrentWhile));
        actions.push(Action::Machine(MachineInput::Mux(MuxEvent::SelectionChanged)));
        self.enter_port_disabled(vars, actions);
    }

    fn status_changed(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        if !vars.port_enabled {
            if self.state.current() != RxState::PortDisabled {
                self.enter_port_disabled(vars, actions);
            }
            return;
        }

        match self.state.current() {
            RxState::PortDisabled => {
                if vars.lacp_enabled {
                    self.enter_expired(vars, actions);
                } else {
                    self.enter_lacp_disabled(vars, actions);
                }
            }
            RxState::Expired | RxState::Defaulted | RxState::Current => {
                if !vars.lacp_enabled {
                    self.enter_lacp_disabled(vars, actions);
                }
            }
            RxState::LacpDisabled => {
                if vars.lacp_enabled {
                    self.enter_expired(vars, actions);
                }
            }
            RxState::Initialize => {}
        }
    }

    fn enter_port_disabled(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(RxState::PortDisabled);
        vars.partner_oper.state.clear(LacpState::SYNC);
        actions.push(Action::StopTimer(TimerKind::CurrentWhile));
        actions.push(Action::Machine(MachineInput::Mux(MuxEvent::PartnerChanged)));
        actions.push(Action::Machine(MachineInput::Churn(ChurnEvent::Evaluate)));
        actions.push(Action::Reselect);

        // unconditional edges out of PORT_DISABLED once the port is up
        if vars.port_enabled {
            if vars.lacp_enabled {
                self.enter_expired(vars, actions);
            } else {
                self.enter_lacp_disabled(vars, actions);
            }
        }
    }

    fn enter_expired(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(RxState::Expired);
        vars.partner_oper.state.clear(LacpState::SYNC);
        vars.partner_oper.state.set(LacpState::TIMEOUT);
        vars.actor_oper_state.set(LacpState::EXPIRED);
        actions.push(Action::StartTimer(
            TimerKind::CurrentWhile,
            crate::timers::SHORT_TIMEOUT,
        ));
        actions.push(Action::Ntt);
        actions.push(Action::Machine(MachineInput::Mux(MuxEvent::PartnerChanged)));
        actions.push(Action::Machine(MachineInput::Churn(ChurnEvent::Evaluate)));
        actions.push(Action::Machine(MachineInput::Periodic(
            PeriodicEvent::Evaluate,
        )));
    }

    fn enter_lacp_disabled(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(RxState::LacpDisabled);
        vars.selection = Selection::Unselected;
        vars.ready_n = false;
        vars.record_default();
        vars.partner_oper.state.clear(LacpState::AGGREGATION);
        vars.actor_oper_state.clear(LacpState::EXPIRED);
        actions.push(Action::StopTimer(TimerKind::CurrentWhile));
        actions.push(Action::Machine(MachineInput::Mux(MuxEvent::SelectionChanged)));
        actions.push(Action::Machine(MachineInput::Periodic(
            PeriodicEvent::Evaluate,
        )));
        actions.push(Action::Reselect);
    }

    fn enter_defaulted(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(RxState::Defaulted);
        // update_Default_Selected: falling back to a different partner
        // record invalidates the current selection
        if !vars.partner_admin.same_participant(&vars.partner_oper) {
            vars.selection = Selection::Unselected;
            vars.ready_n = false;
            actions.push(Action::Machine(MachineInput::Mux(MuxEvent::SelectionChanged)));
        }
        vars.record_default();
        vars.actor_oper_state.clear(LacpState::EXPIRED);
        actions.push(Action::StopTimer(TimerKind::CurrentWhile));
        actions.push(Action::Machine(MachineInput::Mux(MuxEvent::PartnerChanged)));
        actions.push(Action::Machine(MachineInput::Churn(ChurnEvent::Evaluate)));
        actions.push(Action::Machine(MachineInput::Periodic(
            PeriodicEvent::Evaluate,
        )));
        actions.push(Action::Reselect);
    }

    /// A PDU arrived while we are running: record it and become CURRENT.
    fn current_rx(&mut self, vars: &mut PortVars, pdu: LacpPdu, actions: &mut Actions) {
        // an identical actor record only refreshes the timer; suppressing the
        // re-record avoids churning selection on every periodic PDU
        if self.state.current() == RxState::Current && pdu.actor == vars.partner_oper {
            self.update_ntt(vars, &pdu, actions);
            actions.push(Action::StartTimer(
                TimerKind::CurrentWhile,
                vars.current_while_interval(),
            ));
            return;
        }

        // update_Selected: a different partner invalidates the selection
        if !pdu.actor.same_participant(&vars.partner_oper) {
            vars.selection = Selection::Unselected;
            vars.ready_n = false;
            actions.push(Action::Machine(MachineInput::Mux(MuxEvent::SelectionChanged)));
        }

        self.update_ntt(vars, &pdu, actions);

        // recordPDU
        vars.partner_oper = pdu.actor;
        vars.partner_collector_max_delay = pdu.collector_max_delay;
        vars.actor_oper_state.clear(LacpState::DEFAULTED);
        vars.actor_oper_state.clear(LacpState::EXPIRED);

        // Partner_Oper_Port_State.Synchronization: the partner is in sync
        // with us if its view of us matches who we are and it claims Sync
        let sees_us = pdu.partner.system == vars.actor_system
            && pdu.partner.key == vars.actor_oper_key
            && pdu.partner.port == vars.actor_port
            && pdu.partner.state.aggregation() == vars.actor_oper_state.aggregation();
        vars.partner_oper
            .state
            .assign(LacpState::SYNC, sees_us && pdu.actor.state.sync());

        self.state.transition(RxState::Current);
        actions.push(Action::StartTimer(
            TimerKind::CurrentWhile,
            vars.current_while_interval(),
        ));
        actions.push(Action::Machine(MachineInput::Mux(MuxEvent::PartnerChanged)));
        actions.push(Action::Machine(MachineInput::Periodic(
            PeriodicEvent::Evaluate,
        )));
        actions.push(Action::Machine(MachineInput::Churn(ChurnEvent::Evaluate)));
        actions.push(Action::Reselect);
        actions.push(Action::CheckPortMoved {
            partner_system: pdu.actor.system,
            partner_port: pdu.actor.port.number,
        });
    }

    /// update_NTT: if the partner's view of us is stale, answer right away.
    fn update_ntt(&self, vars: &PortVars, pdu: &LacpPdu, actions: &mut Actions) {
        const VIEW_BITS: u8 =
            LacpState::ACTIVITY | LacpState::TIMEOUT | LacpState::AGGREGATION | LacpState::SYNC;

        let view_current = pdu.partner.system == vars.actor_system
            && pdu.partner.key == vars.actor_oper_key
            && pdu.partner.port == vars.actor_port
            && pdu.partner.state.bits() & VIEW_BITS == vars.actor_oper_state.bits() & VIEW_BITS;
        if !view_current {
            actions.push(Action::Ntt);
        }
    }
}
