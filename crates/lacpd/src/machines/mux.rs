//! Mux machine (802.1AX-2014 6.4.15, Figures 6-21 and 6-22).
//!
//! Both control variants live in one machine; the coupled ruleset is
//! chosen at build time from the hardware capability. Entry actions follow
//! the standard: the independent COLLECTING and DISTRIBUTING states remain
//! where they are until an event moves them.

use crate::aggregator::Selection;
use crate::event::{Action, Actions, MuxHwOp};
use crate::fsm::StateHolder;
use crate::port::PortVars;
use crate::timers::{TimerKind, WAIT_WHILE};
use sonic_lacp_types::LacpState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxState {
    Detached,
    Waiting,
    Attached,
    Collecting,
    Distributing,
    CollectingDistributing,
}

#[derive(Debug)]
pub enum MuxEvent {
    Begin,
    /// The port's selection verdict changed (vars already updated).
    SelectionChanged,
    /// Partner Sync/Collecting knowledge changed (vars already updated).
    PartnerChanged,
    /// Every selected member of the aggregator is ready to attach.
    Ready,
    WaitWhileExpired,
}

/// Controls whether this port collects and distributes frames for its
/// aggregator.
#[derive(Debug)]
pub struct MuxMachine {
    state: StateHolder<MuxState>,
    coupled: bool,
}

impl MuxMachine {
    pub fn new(port: u16, coupled: bool) -> Self {
        MuxMachine {
            state: StateHolder::new("mux", port as u32, MuxState::Detached),
            coupled,
        }
    }

    pub fn state(&self) -> MuxState {
        self.state.current()
    }

    pub fn coupled(&self) -> bool {
        self.coupled
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            MuxState::Detached => "DETACHED",
            MuxState::Waiting => "WAITING",
            MuxState::Attached => "ATTACHED",
            MuxState::Collecting => "COLLECTING",
            MuxState::Distributing => "DISTRIBUTING",
            MuxState::CollectingDistributing => "COLLECTING_DISTRIBUTING",
        }
    }

    pub fn on_event(&mut self, vars: &mut PortVars, event: MuxEvent, actions: &mut Actions) {
        match event {
            MuxEvent::Begin => self.enter_detached(vars, actions),
            MuxEvent::SelectionChanged => self.selection_changed(vars, actions),
            MuxEvent::PartnerChanged => self.partner_changed(vars, actions),
            MuxEvent::Ready => {
                if self.state.current() == MuxState::Waiting {
                    if vars.selection == Selection::Selected {
                        self.enter_attached(vars, actions);
                    }
                } else {
                    // late ready notifications are meaningless once attached
                    self.state.ignored(&event);
                }
            }
            MuxEvent::WaitWhileExpired => {
                if self.state.current() == MuxState::Waiting {
                    vars.ready_n = true;
                    actions.push(Action::EvaluateReady);
                } else {
                    self.state.ignored(&event);
                }
            }
        }
    }

    fn selection_changed(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        use MuxState::*;
        match (self.state.current(), vars.selection) {
            (Detached, Selection::Selected | Selection::Standby) => {
                self.enter_waiting(vars, actions)
            }
            (Detached, Selection::Unselected) => {}
            (Waiting, Selection::Unselected) => self.enter_detached(vars, actions),
            (Waiting, _) => {}
            (Attached, Selection::Unselected | Selection::Standby) => {
                self.enter_detached(vars, actions)
            }
            (Attached, Selection::Selected) => {}
            (Collecting, Selection::Unselected | Selection::Standby) => {
                self.enter_attached(vars, actions)
            }
            (Collecting, Selection::Selected) => {}
            (Distributing, Selection::Unselected | Selection::Standby) => {
                self.enter_collecting(vars, actions)
            }
            (Distributing, Selection::Selected) => {}
            (CollectingDistributing, Selection::Unselected | Selection::Standby) => {
                self.enter_attached(vars, actions)
            }
            (CollectingDistributing, Selection::Selected) => {}
        }
    }

    fn partner_changed(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        use MuxState::*;
        let sync = vars.partner_oper.state.sync();
        let collecting = vars.partner_oper.state.collecting();
        match self.state.current() {
            Attached => {
                if vars.selection == Selection::Selected && sync {
                    if self.coupled {
                        self.enter_collecting_distributing(vars, actions);
                    } else {
                        self.enter_collecting(vars, actions);
                        // the partner may already be collecting; re-enter the
                        // ruleset so COLLECTING can advance in the same turn
                        if collecting {
                            actions.push(Action::Machine(crate::event::MachineInput::Mux(
                                MuxEvent::PartnerChanged,
                            )));
                        }
                    }
                }
            }
            Collecting => {
                if !sync {
                    self.enter_attached(vars, actions);
                } else if vars.selection == Selection::Selected && collecting {
                    self.enter_distributing(vars, actions);
                }
            }
            Distributing => {
                // always step down through COLLECTING; a lost Sync falls
                // through to ATTACHED on the re-dispatched event
                if !sync || !collecting {
                    self.enter_collecting(vars, actions);
                    if !sync {
                        actions.push(Action::Machine(crate::event::MachineInput::Mux(
                            MuxEvent::PartnerChanged,
                        )));
                    }
                }
            }
            CollectingDistributing => {
                if !sync {
                    self.enter_attached(vars, actions);
                }
            }
            Detached | Waiting => {}
        }
    }

    fn enter_detached(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(MuxState::Detached);
        vars.ready_n = false;
        vars.actor_oper_state.clear(LacpState::SYNC);
        vars.actor_oper_state
            .clear(LacpState::COLLECTING | LacpState::DISTRIBUTING);
        actions.push(Action::StopTimer(TimerKind::WaitWhile));
        actions.push(Action::Hardware(MuxHwOp::Detach));
        if self.coupled {
            actions.push(Action::Hardware(MuxHwOp::DisableCollectingDistributing));
        } else {
            actions.push(Action::Hardware(MuxHwOp::DisableDistributing));
            actions.push(Action::Hardware(MuxHwOp::DisableCollecting));
        }
        actions.push(Action::Ntt);
    }

    fn enter_waiting(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(MuxState::Waiting);
        // when every sibling is already through its wait there is nobody to
        // coalesce with; report ready immediately instead of burning 2s
        if vars.agg_ready {
            vars.ready_n = true;
            actions.push(Action::EvaluateReady);
        } else {
            actions.push(Action::StartTimer(TimerKind::WaitWhile, WAIT_WHILE));
        }
    }

    fn enter_attached(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(MuxState::Attached);
        vars.actor_oper_state.set(LacpState::SYNC);
        vars.actor_oper_state.clear(LacpState::COLLECTING);
        actions.push(Action::StopTimer(TimerKind::WaitWhile));
        actions.push(Action::Hardware(MuxHwOp::Attach));
        if self.coupled {
            vars.actor_oper_state.clear(LacpState::DISTRIBUTING);
            actions.push(Action::Hardware(MuxHwOp::DisableCollectingDistributing));
        } else {
            actions.push(Action::Hardware(MuxHwOp::DisableCollecting));
        }
        actions.push(Action::Ntt);
    }

    fn enter_collecting(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(MuxState::Collecting);
        actions.push(Action::Hardware(MuxHwOp::EnableCollecting));
        vars.actor_oper_state.set(LacpState::COLLECTING);
        vars.actor_oper_state.clear(LacpState::DISTRIBUTING);
        actions.push(Action::Hardware(MuxHwOp::DisableDistributing));
        actions.push(Action::Ntt);
    }

    fn enter_distributing(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(MuxState::Distributing);
        vars.actor_oper_state.set(LacpState::DISTRIBUTING);
        actions.push(Action::Hardware(MuxHwOp::EnableDistributing));
        // the standard transmits nothing here; the partner already knows
    }

    fn enter_collecting_distributing(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        self.state.transition(MuxState::CollectingDistributing);
        vars.actor_oper_state
            .set(LacpState::COLLECTING | LacpState::DISTRIBUTING);
        actions.push(Action::Hardware(MuxHwOp::EnableCollectingDistributing));
        actions.push(Action::Ntt);
    }
}
