//! Periodic Transmission machine (802.1AX-2014 6.4.13).

use crate::event::{Action, Actions};
use crate::fsm::StateHolder;
use crate::port::PortVars;
use crate::timers::{TimerKind, FAST_PERIODIC, SLOW_PERIODIC};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicState {
    NoPeriodic,
    FastPeriodic,
    SlowPeriodic,
    PeriodicTx,
}

#[derive(Debug)]
pub enum PeriodicEvent {
    Begin,
    /// Port status, activity or the partner's timeout preference changed.
    Evaluate,
    TimerExpired,
}

/// Keeps LACPDUs flowing at the rate the partner asked for.
#[derive(Debug)]
pub struct PeriodicMachine {
    state: StateHolder<PeriodicState>,
}

impl PeriodicMachine {
    pub fn new(port: u16) -> Self {
        PeriodicMachine {
            state: StateHolder::new("periodic", port as u32, PeriodicState::NoPeriodic),
        }
    }

    pub fn state(&self) -> PeriodicState {
        self.state.current()
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            PeriodicState::NoPeriodic => "NO_PERIODIC",
            PeriodicState::FastPeriodic => "FAST_PERIODIC",
            PeriodicState::SlowPeriodic => "SLOW_PERIODIC",
            PeriodicState::PeriodicTx => "PERIODIC_TX",
        }
    }

    /// Nothing to send when the port is down, LACP is off, or both ends
    /// are passive.
    fn should_run(vars: &PortVars) -> bool {
        vars.port_enabled
            && vars.lacp_enabled
            && (vars.actor_oper_state.activity() || vars.partner_oper.state.activity())
    }

    pub fn on_event(&mut self, vars: &mut PortVars, event: PeriodicEvent, actions: &mut Actions) {
        match event {
            PeriodicEvent::Begin => {
                self.enter_no_periodic(actions);
                if Self::should_run(vars) {
                    self.enter_fast(actions);
                }
            }
            PeriodicEvent::Evaluate => {
                if !Self::should_run(vars) {
                    if self.state.current() != PeriodicState::NoPeriodic {
                        self.enter_no_periodic(actions);
                    }
                    return;
                }
                match self.state.current() {
                    PeriodicState::NoPeriodic => self.enter_fast(actions),
                    // the partner slowed down: finish the slow interval instead
                    PeriodicState::FastPeriodic => {
                        if !vars.partner_oper.state.short_timeout() {
                            self.enter_slow(actions);
                        }
                    }
                    // the partner sped up: transmit now rather than in 30s
                    PeriodicState::SlowPeriodic => {
                        if vars.partner_oper.state.short_timeout() {
                            self.periodic_tx(vars, actions);
                        }
                    }
                    PeriodicState::PeriodicTx => {}
                }
            }
            PeriodicEvent::TimerExpired => match self.state.current() {
                PeriodicState::FastPeriodic | PeriodicState::SlowPeriodic => {
                    self.periodic_tx(vars, actions)
                }
                _ => self.state.ignored(&event),
            },
        }
    }

    fn enter_no_periodic(&mut self, actions: &mut Actions) {
        self.state.transition(PeriodicState::NoPeriodic);
        actions.push(Action::StopTimer(TimerKind::Periodic));
    }

    fn enter_fast(&mut self, actions: &mut Actions) {
        self.state.transition(PeriodicState::FastPeriodic);
        actions.push(Action::StartTimer(TimerKind::Periodic, FAST_PERIODIC));
    }

    fn enter_slow(&mut self, actions: &mut Actions) {
        self.state.transition(PeriodicState::SlowPeriodic);
        actions.push(Action::StartTimer(TimerKind::Periodic, SLOW_PERIODIC));
    }

    /// PERIODIC_TX entry plus the unconditional fall-through edge back to
    /// the rate the partner currently asks for.
    fn periodic_tx(&mut self, vars: &PortVars, actions: &mut Actions) {
        self.state.transition(PeriodicState::PeriodicTx);
        actions.push(Action::Ntt);
        if vars.partner_oper.state.short_timeout() {
            self.enter_fast(actions);
        } else {
            self.enter_slow(actions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::test_support::test_vars;
    use sonic_lacp_types::LacpState;

    #[test]
    fn test_begin_starts_fast_when_active() {
        let mut vars = test_vars();
        let mut ptx = PeriodicMachine::new(1);
        let mut actions = Vec::new();
        ptx.on_event(&mut vars, PeriodicEvent::Begin, &mut actions);

        assert_eq!(ptx.state(), PeriodicState::FastPeriodic);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::StartTimer(TimerKind::Periodic, d) if *d == FAST_PERIODIC)));
    }

    #[test]
    fn test_both_passive_stops_periodic() {
        let mut vars = test_vars();
        vars.actor_oper_state.clear(LacpState::ACTIVITY);
        vars.partner_oper.state.clear(LacpState::ACTIVITY);
        let mut ptx = PeriodicMachine::new(1);
        let mut actions = Vec::new();
        ptx.on_event(&mut vars, PeriodicEvent::Begin, &mut actions);

        assert_eq!(ptx.state(), PeriodicState::NoPeriodic);
    }

    #[test]
    fn test_timer_expiry_sets_ntt_and_rearms() {
        let mut vars = test_vars();
        // partner asks for fast rate
        vars.partner_oper.state.set(LacpState::TIMEOUT);
        let mut ptx = PeriodicMachine::new(1);
        let mut actions = Vec::new();
        ptx.on_event(&mut vars, PeriodicEvent::Begin, &mut actions);
        actions.clear();

        ptx.on_event(&mut vars, PeriodicEvent::TimerExpired, &mut actions);
        assert_eq!(ptx.state(), PeriodicState::FastPeriodic);
        assert!(actions.iter().any(|a| matches!(a, Action::Ntt)));
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::StartTimer(TimerKind::Periodic, d) if *d == FAST_PERIODIC)));
    }

    #[test]
    fn test_partner_long_timeout_selects_slow_interval() {
        let mut vars = test_vars();
        vars.partner_oper.state.clear(LacpState::TIMEOUT);
        let mut ptx = PeriodicMachine::new(1);
        let mut actions = Vec::new();
        ptx.on_event(&mut vars, PeriodicEvent::Begin, &mut actions);
        assert_eq!(ptx.state(), PeriodicState::FastPeriodic);
        actions.clear();

        // first expiry transmits, then settles on the slow interval
        ptx.on_event(&mut vars, PeriodicEvent::TimerExpired, &mut actions);
        assert_eq!(ptx.state(), PeriodicState::SlowPeriodic);

        // partner flips back to short timeout: transmit immediately
        actions.clear();
        vars.partner_oper.state.set(LacpState::TIMEOUT);
        ptx.on_event(&mut vars, PeriodicEvent::Evaluate, &mut actions);
        assert_eq!(ptx.state(), PeriodicState::FastPeriodic);
        assert!(actions.iter().any(|a| matches!(a, Action::Ntt)));
    }

    #[test]
    fn test_port_down_enters_no_periodic() {
        let mut vars = test_vars();
        let mut ptx = PeriodicMachine::new(1);
        let mut actions = Vec::new();
        ptx.on_event(&mut vars, PeriodicEvent::Begin, &mut actions);
        actions.clear();

        vars.port_enabled = false;
        ptx.on_event(&mut vars, PeriodicEvent::Evaluate, &mut actions);
        assert_eq!(ptx.state(), PeriodicState::NoPeriodic);
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::StopTimer(TimerKind::Periodic))));
    }
}
