//! Churn Detection machines (802.1AX-2014 6.4.17).
//!
//! Two independent monitors watch the actor's and the partner's Sync bit;
//! sixty seconds out of sync is flagged as churn for observability.

use crate::event::{Action, Actions};
use crate::fsm::StateHolder;
use crate::port::PortVars;
use crate::timers::{TimerKind, CHURN_DETECTION};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChurnState {
    NoChurn,
    Monitoring,
    Churned,
}

#[derive(Debug)]
pub enum ChurnEvent {
    Begin,
    /// Actor or partner Sync changed; both monitors re-read their bit.
    Evaluate,
    ActorTimerExpired,
    PartnerTimerExpired,
}

/// Actor and partner churn monitors for one port.
#[derive(Debug)]
pub struct ChurnMachine {
    actor: StateHolder<ChurnState>,
    partner: StateHolder<ChurnState>,
}

impl ChurnMachine {
    pub fn new(port: u16) -> Self {
        ChurnMachine {
            actor: StateHolder::new("actor-churn", port as u32, ChurnState::NoChurn),
            partner: StateHolder::new("partner-churn", port as u32, ChurnState::NoChurn),
        }
    }

    pub fn actor_state(&self) -> ChurnState {
        self.actor.current()
    }

    pub fn partner_state(&self) -> ChurnState {
        self.partner.current()
    }

    pub fn actor_state_name(&self) -> &'static str {
        Self::name(self.actor.current())
    }

    pub fn partner_state_name(&self) -> &'static str {
        Self::name(self.partner.current())
    }

    fn name(state: ChurnState) -> &'static str {
        match state {
            ChurnState::NoChurn => "NO_CHURN",
            ChurnState::Monitoring => "CHURN_MONITOR",
            ChurnState::Churned => "CHURN",
        }
    }

    pub fn on_event(&mut self, vars: &mut PortVars, event: ChurnEvent, actions: &mut Actions) {
        match event {
            ChurnEvent::Begin => {
                self.actor.transition(ChurnState::NoChurn);
                self.partner.transition(ChurnState::NoChurn);
                actions.push(Action::StopTimer(TimerKind::ActorChurn));
                actions.push(Action::StopTimer(TimerKind::PartnerChurn));
                self.evaluate(vars, actions);
            }
            ChurnEvent::Evaluate => self.evaluate(vars, actions),
            ChurnEvent::ActorTimerExpired => {
                if self.actor.current() == ChurnState::Monitoring {
                    self.actor.transition(ChurnState::Churned);
                    vars.counters.actor_churn_events += 1;
                    warn!(port = vars.number, "actor churn detected");
                } else {
                    self.actor.ignored(&event);
                }
            }
            ChurnEvent::PartnerTimerExpired => {
                if self.partner.current() == ChurnState::Monitoring {
                    self.partner.transition(ChurnState::Churned);
                    vars.counters.partner_churn_events += 1;
                    warn!(port = vars.number, "partner churn detected");
                } else {
                    self.partner.ignored(&event);
                }
            }
        }
    }

    fn evaluate(&mut self, vars: &PortVars, actions: &mut Actions) {
        let monitoring_makes_sense = vars.port_enabled;

        let actor_sync = vars.actor_oper_state.sync();
        match (self.actor.current(), actor_sync) {
            (ChurnState::NoChurn, false) if monitoring_makes_sense => {
                self.actor.transition(ChurnState::Monitoring);
                actions.push(Action::StartTimer(TimerKind::ActorChurn, CHURN_DETECTION));
            }
            (ChurnState::Monitoring | ChurnState::Churned, true) => {
                self.actor.transition(ChurnState::NoChurn);
                actions.push(Action::StopTimer(TimerKind::ActorChurn));
            }
            (ChurnState::Monitoring, false) if !monitoring_makes_sense => {
                self.actor.transition(ChurnState::NoChurn);
                actions.push(Action::StopTimer(TimerKind::ActorChurn));
            }
            _ => {}
        }

        let partner_sync = vars.partner_oper.state.sync();
        match (self.partner.current(), partner_sync) {
            (ChurnState::NoChurn, false) if monitoring_makes_sense => {
                self.partner.transition(ChurnState::Monitoring);
                actions.push(Action::StartTimer(TimerKind::PartnerChurn, CHURN_DETECTION));
            }
            (ChurnState::Monitoring | ChurnState::Churned, true) => {
                self.partner.transition(ChurnState::NoChurn);
                actions.push(Action::StopTimer(TimerKind::PartnerChurn));
            }
            (ChurnState::Monitoring, false) if !monitoring_makes_sense => {
                self.partner.transition(ChurnState::NoChurn);
                actions.push(Action::StopTimer(TimerKind::PartnerChurn));
            }
            _ => {}
        }
    }
}
