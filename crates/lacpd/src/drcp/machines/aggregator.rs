//! DRCP Aggregator machine (802.1AX-2014 9.4.18): maintains the home port
//! conversation mask covering locally collected frames.

use crate::drcp::portal::PortalVars;
use crate::drcp::{PortalAction, PortalActions};
use crate::fsm::StateHolder;
use sonic_lacp_pdu::DrcpState;
use sonic_lacp_types::ConversationMask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggMachineState {
    Initialize,
    Update,
}

#[derive(Debug)]
pub enum AggEvent {
    Begin,
    Update,
}

#[derive(Debug)]
pub struct AggMachine {
    state: StateHolder<AggMachineState>,
}

impl AggMachine {
    pub fn new(owner: u32) -> Self {
        AggMachine {
            state: StateHolder::new("drcp-aggregator", owner, AggMachineState::Initialize),
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            AggMachineState::Initialize => "AGGREGATOR_INITIALIZE",
            AggMachineState::Update => "AGGREGATOR_UPDATE",
        }
    }

    pub fn on_event(
        &mut self,
        vars: &mut PortalVars,
        event: AggEvent,
        actions: &mut PortalActions,
    ) {
        match event {
            AggEvent::Begin => {
                self.state.transition(AggMachineState::Initialize);
                vars.home_port_mask = ConversationMask::EMPTY;
                self.update(vars, actions);
            }
            AggEvent::Update => self.update(vars, actions),
        }
    }

    fn update(&mut self, vars: &mut PortalVars, actions: &mut PortalActions) {
        self.state.transition(AggMachineState::Update);
        vars.home_port_digest = vars.conv_admin_gateway.digest();

        // common methods: distribution follows the gateway assignment,
        // including the cede-on-disagreement rule
        let mut mask = vars.conv_admin_gateway.mask_for(vars.system_number);
        if vars.ipp.differ_portal
            && vars.ipp.neighbor.valid
            && vars.system_number > vars.ipp.neighbor.system_number
        {
            mask = mask.difference(&vars.ipp.neighbor.gateway_vector);
        }

        let port_sync = vars.ipp.neighbor.valid
            && vars.ipp.neighbor.port_digest == vars.home_port_digest;
        vars.home_state.assign(DrcpState::PORT_SYNC, port_sync);

        if mask != vars.home_port_mask {
            vars.home_port_mask = mask;
            actions.push(PortalAction::NttIpp);
        }
    }
}
