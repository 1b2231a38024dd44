//! Network/IPL sharing machine (802.1AX-2014 9.4.20).
//!
//! Only time-based sharing is implemented: network and IPL frames may use
//! the same physical link once both portal systems advertise the method.

use crate::drcp::portal::PortalVars;
use crate::drcp::PortalActions;
use crate::fsm::StateHolder;

/// Sharing-by-time method identifier carried in the Network/IPL TLV.
pub const METHOD_TIME_SHARED: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetIplState {
    NoSharing,
    TimeShared,
}

#[derive(Debug)]
pub enum NetIplEvent {
    Begin,
    /// The neighbor's advertised method changed.
    Evaluate,
}

#[derive(Debug)]
pub struct NetIplMachine {
    state: StateHolder<NetIplState>,
}

impl NetIplMachine {
    pub fn new(owner: u32) -> Self {
        NetIplMachine {
            state: StateHolder::new("drcp-net-ipl", owner, NetIplState::NoSharing),
        }
    }

    pub fn state(&self) -> NetIplState {
        self.state.current()
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            NetIplState::NoSharing => "NO_SHARING",
            NetIplState::TimeShared => "TIME_SHARED",
        }
    }

    pub fn on_event(
        &mut self,
        vars: &mut PortalVars,
        event: NetIplEvent,
        _actions: &mut PortalActions,
    ) {
        match event {
            NetIplEvent::Begin => self.state.transition(NetIplState::NoSharing),
            NetIplEvent::Evaluate => {
                let agreed = vars.ipp.neighbor.valid
                    && vars.ipp.neighbor.network_method == METHOD_TIME_SHARED;
                self.state.transition(if agreed {
                    NetIplState::TimeShared
                } else {
                    NetIplState::NoSharing
                });
            }
        }
    }
}
