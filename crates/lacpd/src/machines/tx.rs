//! Transmit machine (802.1AX-2014 6.4.16).
//!
//! NTT consumer with the standard's rate limit: at most three LACPDUs per
//! fast-periodic interval, enforced as a token bucket of capacity three
//! with one token restored every third of the interval. A pending NTT is
//! flushed as soon as a token comes back.

use crate::event::{Action, Actions};
use crate::fsm::StateHolder;
use crate::port::PortVars;
use crate::timers::{TimerKind, TX_TICK};
use sonic_lacp_pdu::{LacpPdu, SlowPdu};

const TX_BURST: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// LACP or the link is down; nothing is ever sent.
    Off,
    /// Tokens available.
    Ready,
    /// Bucket empty; NTT waits for the next token.
    Throttled,
}

#[derive(Debug)]
pub enum TxEvent {
    Begin,
    /// port_enabled/lacp_enabled changed.
    Evaluate,
    /// Need-to-transmit was raised.
    Ntt,
    /// Token restore tick.
    TickExpired,
}

/// Builds and sends LACPDUs whenever NTT is set and the bucket allows.
#[derive(Debug)]
pub struct TxMachine {
    state: StateHolder<TxState>,
    tokens: u8,
}

impl TxMachine {
    pub fn new(port: u16) -> Self {
        TxMachine {
            state: StateHolder::new("tx", port as u32, TxState::Off),
            tokens: TX_BURST,
        }
    }

    pub fn state(&self) -> TxState {
        self.state.current()
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            TxState::Off => "OFF",
            TxState::Ready => "READY",
            TxState::Throttled => "THROTTLED",
        }
    }

    fn enabled(vars: &PortVars) -> bool {
        vars.port_enabled && vars.lacp_enabled
    }

    pub fn on_event(&mut self, vars: &mut PortVars, event: TxEvent, actions: &mut Actions) {
        match event {
            TxEvent::Begin => {
                self.tokens = TX_BURST;
                vars.ntt = false;
                actions.push(Action::StopTimer(TimerKind::TxTick));
                self.state.transition(if Self::enabled(vars) {
                    TxState::Ready
                } else {
                    TxState::Off
                });
            }
            TxEvent::Evaluate => {
                if !Self::enabled(vars) {
                    vars.ntt = false;
                    actions.push(Action::StopTimer(TimerKind::TxTick));
                    self.state.transition(TxState::Off);
                } else if self.state.current() == TxState::Off {
                    self.state.transition(if self.tokens > 0 {
                        TxState::Ready
                    } else {
                        TxState::Throttled
                    });
                    if vars.ntt {
                        self.try_transmit(vars, actions);
                    }
                }
            }
            TxEvent::Ntt => {
                if self.state.current() == TxState::Off {
                    vars.ntt = false;
                    return;
                }
                self.try_transmit(vars, actions);
            }
            TxEvent::TickExpired => {
                if self.state.current() == TxState::Off {
                    return;
                }
                self.tokens = (self.tokens + 1).min(TX_BURST);
                if self.state.current() == TxState::Throttled {
                    self.state.transition(TxState::Ready);
                }
                if vars.ntt {
                    self.try_transmit(vars, actions);
                } else if self.tokens < TX_BURST {
                    actions.push(Action::StartTimer(TimerKind::TxTick, TX_TICK));
                }
            }
        }
    }

    fn try_transmit(&mut self, vars: &mut PortVars, actions: &mut Actions) {
        if self.tokens == 0 {
            // leave vars.ntt set; the tick flushes it
            self.state.transition(TxState::Throttled);
            return;
        }

        let pdu = Self::build_pdu(vars);
        actions.push(Action::Transmit(SlowPdu::Lacp(pdu)));
        vars.ntt = false;
        vars.counters.lacpdu_tx += 1;
        self.tokens -= 1;
        actions.push(Action::StartTimer(TimerKind::TxTick, TX_TICK));
        self.state.transition(if self.tokens == 0 {
            TxState::Throttled
        } else {
            TxState::Ready
        });
    }

    fn build_pdu(vars: &PortVars) -> LacpPdu {
        LacpPdu {
            actor: vars.actor_participant(),
            partner: vars.partner_oper,
            collector_max_delay: vars.actor_collector_max_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::test_support::test_vars;

    fn transmissions(actions: &Actions) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, Action::Transmit(SlowPdu::Lacp(_))))
            .count()
    }

    #[test]
    fn test_ntt_transmits_current_state() {
        let mut vars = test_vars();
        let mut tx = TxMachine::new(1);
        let mut actions = Vec::new();
        tx.on_event(&mut vars, TxEvent::Begin, &mut actions);

        vars.ntt = true;
        tx.on_event(&mut vars, TxEvent::Ntt, &mut actions);
        assert_eq!(transmissions(&actions), 1);
        assert!(!vars.ntt);
        assert_eq!(vars.counters.lacpdu_tx, 1);

        match actions.iter().find(|a| matches!(a, Action::Transmit(_))) {
            Some(Action::Transmit(SlowPdu::Lacp(pdu))) => {
                assert_eq!(pdu.actor.system, vars.actor_system);
                assert_eq!(pdu.actor.key, vars.actor_oper_key);
                assert_eq!(pdu.partner, vars.partner_oper);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_bucket_caps_burst_at_three() {
        let mut vars = test_vars();
        let mut tx = TxMachine::new(1);
        let mut actions = Vec::new();
        tx.on_event(&mut vars, TxEvent::Begin, &mut actions);

        for _ in 0..5 {
            vars.ntt = true;
            tx.on_event(&mut vars, TxEvent::Ntt, &mut actions);
        }

        assert_eq!(transmissions(&actions), 3);
        assert_eq!(tx.state(), TxState::Throttled);
        // the fourth request is still pending
        assert!(vars.ntt);
    }

    #[test]
    fn test_tick_flushes_pending_ntt() {
        let mut vars = test_vars();
        let mut tx = TxMachine::new(1);
        let mut actions = Vec::new();
        tx.on_event(&mut vars, TxEvent::Begin, &mut actions);
        for _ in 0..4 {
            vars.ntt = true;
            tx.on_event(&mut vars, TxEvent::Ntt, &mut actions);
        }
        assert!(vars.ntt);
        actions.clear();

        tx.on_event(&mut vars, TxEvent::TickExpired, &mut actions);
        assert_eq!(transmissions(&actions), 1);
        assert!(!vars.ntt);
    }

    #[test]
    fn test_off_drops_ntt() {
        let mut vars = test_vars();
        vars.lacp_enabled = false;
        let mut tx = TxMachine::new(1);
        let mut actions = Vec::new();
        tx.on_event(&mut vars, TxEvent::Begin, &mut actions);
        assert_eq!(tx.state(), TxState::Off);

        vars.ntt = true;
        tx.on_event(&mut vars, TxEvent::Ntt, &mut actions);
        assert_eq!(transmissions(&actions), 0);
        assert!(!vars.ntt);
    }

    #[test]
    fn test_reenable_resumes_transmission() {
        let mut vars = test_vars();
        let mut tx = TxMachine::new(1);
        let mut actions = Vec::new();
        tx.on_event(&mut vars, TxEvent::Begin, &mut actions);

        vars.port_enabled = false;
        tx.on_event(&mut vars, TxEvent::Evaluate, &mut actions);
        assert_eq!(tx.state(), TxState::Off);

        vars.port_enabled = true;
        vars.ntt = true;
        tx.on_event(&mut vars, TxEvent::Evaluate, &mut actions);
        assert_eq!(transmissions(&actions), 1);
    }
}
