//! Gateway machine (802.1AX-2014 9.4.17): maintains the home gateway
//! conversation mask and its advertised sequence number.

use crate::drcp::portal::PortalVars;
use crate::drcp::{PortalAction, PortalActions};
use crate::fsm::StateHolder;
use sonic_lacp_pdu::DrcpState;
use sonic_lacp_types::ConversationMask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Initialize,
    Update,
}

#[derive(Debug)]
pub enum GatewayEvent {
    Begin,
    Update,
}

#[derive(Debug)]
pub struct GatewayMachine {
    state: StateHolder<GatewayState>,
}

impl GatewayMachine {
    pub fn new(owner: u32) -> Self {
        GatewayMachine {
            state: StateHolder::new("drcp-gateway", owner, GatewayState::Initialize),
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            GatewayState::Initialize => "GATEWAY_INITIALIZE",
            GatewayState::Update => "GATEWAY_UPDATE",
        }
    }

    pub fn on_event(
        &mut self,
        vars: &mut PortalVars,
        event: GatewayEvent,
        actions: &mut PortalActions,
    ) {
        match event {
            GatewayEvent::Begin => {
                self.state.transition(GatewayState::Initialize);
                vars.home_gateway_mask = ConversationMask::EMPTY;
                self.update(vars, actions);
            }
            GatewayEvent::Update => self.update(vars, actions),
        }
    }

    fn update(&mut self, vars: &mut PortalVars, actions: &mut PortalActions) {
        self.state.transition(GatewayState::Update);
        vars.home_gateway_digest = vars.conv_admin_gateway.digest();

        let mut mask = vars.conv_admin_gateway.mask_for(vars.system_number);
        // with disagreeing administrations the higher-numbered system cedes
        // whatever the neighbor claims, so no conversation has two gateways
        // and the pair settles instead of trading claims back and forth
        if vars.ipp.differ_portal
            && vars.ipp.neighbor.valid
            && vars.system_number > vars.ipp.neighbor.system_number
        {
            mask = mask.difference(&vars.ipp.neighbor.gateway_vector);
        }

        if mask != vars.home_gateway_mask {
            vars.home_gateway_mask = mask;
            vars.home_gateway_sequence = vars.home_gateway_sequence.wrapping_add(1);
            vars.home_state
                .assign(DrcpState::HOME_GATEWAY, !mask.is_empty());
            actions.push(PortalAction::NttIpp);
        }
    }
}
