//! Portal System machine (802.1AX-2014 9.4.16).
//!
//! Reacts to portal-level change: normal updates re-derive the home
//! masks through the Gateway and Aggregator machines; a conversation
//! digest disagreement parks the portal in DIFFER_PORTAL, where the home
//! claims are collapsed so no conversation can be served twice.

use crate::drcp::machines::aggregator::AggEvent;
use crate::drcp::machines::gateway::GatewayEvent;
use crate::drcp::portal::PortalVars;
use crate::drcp::{PortalAction, PortalActions, PortalMachineInput};
use crate::fsm::StateHolder;
use sonic_lacp_pdu::DrcpState;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsState {
    Initialize,
    PortalSystemUpdate,
    DifferPortal,
}

#[derive(Debug)]
pub enum PsEvent {
    Begin,
    /// Portal configuration or aggregator linkage changed.
    Update,
    /// The neighbor's conversation digests agree with ours.
    DigestMatch,
    /// The neighbor administers a different conversation map.
    DigestMismatch,
}

#[derive(Debug)]
pub struct PsMachine {
    state: StateHolder<PsState>,
}

impl PsMachine {
    pub fn new(owner: u32) -> Self {
        PsMachine {
            state: StateHolder::new("drcp-ps", owner, PsState::Initialize),
        }
    }

    pub fn state(&self) -> PsState {
        self.state.current()
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            PsState::Initialize => "INITIALIZE",
            PsState::PortalSystemUpdate => "PORTAL_SYSTEM_UPDATE",
            PsState::DifferPortal => "DIFFER_PORTAL",
        }
    }

    pub fn on_event(&mut self, vars: &mut PortalVars, event: PsEvent, actions: &mut PortalActions) {
        match event {
            PsEvent::Begin => {
                self.state.transition(PsState::Initialize);
                vars.ipp.differ_portal = false;
                vars.home_state.assign(DrcpState::GATEWAY_SYNC, false);
                self.enter_update(vars, actions);
            }
            PsEvent::Update => self.enter_update(vars, actions),
            PsEvent::DigestMatch => {
                vars.home_state.assign(DrcpState::GATEWAY_SYNC, true);
                self.enter_update(vars, actions);
            }
            PsEvent::DigestMismatch => self.enter_differ_portal(vars, actions),
        }
    }

    fn enter_update(&mut self, vars: &mut PortalVars, actions: &mut PortalActions) {
        self.state.transition(PsState::PortalSystemUpdate);
        vars.ipp.differ_portal = false;
        actions.push(PortalAction::Machine(PortalMachineInput::Gateway(
            GatewayEvent::Update,
        )));
        actions.push(PortalAction::Machine(PortalMachineInput::Agg(
            AggEvent::Update,
        )));
    }

    fn enter_differ_portal(&mut self, vars: &mut PortalVars, actions: &mut PortalActions) {
        if self.state.current() != PsState::DifferPortal {
            warn!(
                portal = %vars.name,
                "conversation digests differ from neighbor, collapsing gateway claims"
            );
        }
        self.state.transition(PsState::DifferPortal);
        vars.ipp.differ_portal = true;
        vars.home_state.assign(DrcpState::GATEWAY_SYNC, false);
        actions.push(PortalAction::Machine(PortalMachineInput::Gateway(
            GatewayEvent::Update,
        )));
        actions.push(PortalAction::Machine(PortalMachineInput::Agg(
            AggEvent::Update,
        )));
    }
}
