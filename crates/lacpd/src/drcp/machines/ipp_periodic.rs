//! Per-IPP Periodic Transmission machine (802.1AX-2014 9.4.15), the DRCP
//! mirror of the LACP periodic machine.

use crate::drcp::portal::PortalVars;
use crate::drcp::{PortalAction, PortalActions, PortalTimerKind};
use crate::fsm::StateHolder;
use crate::timers::{FAST_PERIODIC, SLOW_PERIODIC};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IppPeriodicState {
    NoPeriodic,
    FastPeriodic,
    SlowPeriodic,
    PeriodicTx,
}

#[derive(Debug)]
pub enum IppPeriodicEvent {
    Begin,
    Evaluate,
    TimerExpired,
}

#[derive(Debug)]
pub struct IppPeriodicMachine {
    state: StateHolder<IppPeriodicState>,
}

impl IppPeriodicMachine {
    pub fn new(owner: u32) -> Self {
        IppPeriodicMachine {
            state: StateHolder::new("drcp-ipp-periodic", owner, IppPeriodicState::NoPeriodic),
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            IppPeriodicState::NoPeriodic => "NO_PERIODIC",
            IppPeriodicState::FastPeriodic => "FAST_PERIODIC",
            IppPeriodicState::SlowPeriodic => "SLOW_PERIODIC",
            IppPeriodicState::PeriodicTx => "PERIODIC_TX",
        }
    }

    /// The neighbor wants fast DRCPDUs until it has learned us.
    fn fast_wanted(vars: &PortalVars) -> bool {
        !vars.ipp.neighbor.valid || vars.ipp.neighbor.state.short_timeout()
    }

    pub fn on_event(
        &mut self,
        vars: &mut PortalVars,
        event: IppPeriodicEvent,
        actions: &mut PortalActions,
    ) {
        match event {
            IppPeriodicEvent::Begin => {
                self.state.transition(IppPeriodicState::NoPeriodic);
                self.enter_fast(actions);
            }
            IppPeriodicEvent::Evaluate => match self.state.current() {
                IppPeriodicState::NoPeriodic => self.enter_fast(actions),
                IppPeriodicState::FastPeriodic => {
                    if !Self::fast_wanted(vars) {
                        self.enter_slow(actions);
                    }
                }
                IppPeriodicState::SlowPeriodic => {
                    if Self::fast_wanted(vars) {
                        self.periodic_tx(vars, actions);
                    }
                }
                IppPeriodicState::PeriodicTx => {}
            },
            IppPeriodicEvent::TimerExpired => match self.state.current() {
                IppPeriodicState::FastPeriodic | IppPeriodicState::SlowPeriodic => {
                    self.periodic_tx(vars, actions)
                }
                _ => self.state.ignored(&event),
            },
        }
    }

    fn enter_fast(&mut self, actions: &mut PortalActions) {
        self.state.transition(IppPeriodicState::FastPeriodic);
        actions.push(PortalAction::StartTimer(
            PortalTimerKind::IppPeriodic,
            FAST_PERIODIC,
        ));
    }

    fn enter_slow(&mut self, actions: &mut PortalActions) {
        self.state.transition(IppPeriodicState::SlowPeriodic);
        actions.push(PortalAction::StartTimer(
            PortalTimerKind::IppPeriodic,
            SLOW_PERIODIC,
        ));
    }

    fn periodic_tx(&mut self, vars: &PortalVars, actions: &mut PortalActions) {
        self.state.transition(IppPeriodicState::PeriodicTx);
        actions.push(PortalAction::NttIpp);
        if Self::fast_wanted(vars) {
            self.enter_fast(actions);
        } else {
            self.enter_slow(actions);
        }
    }
}
