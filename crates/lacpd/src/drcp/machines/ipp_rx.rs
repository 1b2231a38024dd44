//! Per-IPP DRCPDU Receive machine (802.1AX-2014 9.4.14).

use crate::drcp::machines::net_ipl::NetIplEvent;
use crate::drcp::machines::ps::PsEvent;
use crate::drcp::portal::PortalVars;
use crate::drcp::{PortalAction, PortalActions, PortalMachineInput, PortalTimerKind};
use crate::fsm::StateHolder;
use crate::timers::{LONG_TIMEOUT, SHORT_TIMEOUT};
use sonic_lacp_pdu::{DrcpPdu, DrcpState};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IppRxState {
    Initialize,
    Expired,
    Defaulted,
    Current,
    Discard,
}

#[derive(Debug)]
pub enum IppRxEvent {
    Begin,
    PduReceived(Box<DrcpPdu>),
    CurrentWhileExpired,
}

/// Consumes DRCPDUs on the intra-portal link and keeps the neighbor
/// record current.
#[derive(Debug)]
pub struct IppRxMachine {
    state: StateHolder<IppRxState>,
}

impl IppRxMachine {
    pub fn new(owner: u32) -> Self {
        IppRxMachine {
            state: StateHolder::new("drcp-ipp-rx", owner, IppRxState::Initialize),
        }
    }

    pub fn state(&self) -> IppRxState {
        self.state.current()
    }

    pub fn state_name(&self) -> &'static str {
        match self.state.current() {
            IppRxState::Initialize => "INITIALIZE",
            IppRxState::Expired => "EXPIRED",
            IppRxState::Defaulted => "DEFAULTED",
            IppRxState::Current => "CURRENT",
            IppRxState::Discard => "DISCARD",
        }
    }

    pub fn on_event(
        &mut self,
        vars: &mut PortalVars,
        event: IppRxEvent,
        actions: &mut PortalActions,
    ) {
        match event {
            IppRxEvent::Begin => {
                self.state.transition(IppRxState::Initialize);
                vars.ipp.neighbor = Default::default();
                vars.ipp.differ_conf_portal = false;
                self.enter_expired(vars, actions);
            }
            IppRxEvent::PduReceived(pdu) => match self.state.current() {
                IppRxState::Expired
                | IppRxState::Defaulted
                | IppRxState::Current
                | IppRxState::Discard => self.receive(vars, *pdu, actions),
                IppRxState::Initialize => self.state.ignored(&"drcpdu"),
            },
            IppRxEvent::CurrentWhileExpired => match self.state.current() {
                IppRxState::Current => {
                    self.enter_expired(vars, actions);
                    // nudge the silent neighbor right away
                    actions.push(PortalAction::NttIpp);
                }
                IppRxState::Expired | IppRxState::Discard => self.enter_defaulted(vars, actions),
                _ => self.state.ignored(&event),
            },
        }
    }

    fn enter_expired(&mut self, vars: &mut PortalVars, actions: &mut PortalActions) {
        self.state.transition(IppRxState::Expired);
        vars.home_state.assign(DrcpState::EXPIRED, true);
        actions.push(PortalAction::StartTimer(
            PortalTimerKind::IppCurrentWhile,
            SHORT_TIMEOUT,
        ));
    }

    fn enter_defaulted(&mut self, vars: &mut PortalVars, actions: &mut PortalActions) {
        self.state.transition(IppRxState::Defaulted);
        vars.ipp.neighbor = Default::default();
        vars.ipp.differ_conf_portal = false;
        actions.push(PortalAction::StopTimer(PortalTimerKind::IppCurrentWhile));
        // alone in the portal: re-derive the home claims without a peer
        actions.push(PortalAction::Machine(PortalMachineInput::Ps(PsEvent::Update)));
        actions.push(PortalAction::Machine(PortalMachineInput::NetIpl(
            NetIplEvent::Evaluate,
        )));
    }

    fn receive(&mut self, vars: &mut PortalVars, pdu: DrcpPdu, actions: &mut PortalActions) {
        if !Self::portal_matches(vars, &pdu) {
            if self.state.current() != IppRxState::Discard {
                warn!(
                    portal = %vars.name,
                    neighbor_portal = %pdu.portal_info.portal_addr,
                    "DRCPDU from a different portal, discarding"
                );
            }
            self.state.transition(IppRxState::Discard);
            vars.ipp.differ_conf_portal = true;
            vars.counters.wrong_portal_drops += 1;
            return;
        }

        let first_contact = !vars.ipp.neighbor.valid;
        vars.ipp.differ_conf_portal = false;
        Self::record_neighbor(vars, &pdu);

        let digests_match = pdu.portal_config.gateway_digest == vars.home_gateway_digest
            && pdu.portal_config.port_digest == vars.home_port_digest;
        actions.push(PortalAction::Machine(PortalMachineInput::Ps(
            if digests_match {
                PsEvent::DigestMatch
            } else {
                PsEvent::DigestMismatch
            },
        )));
        actions.push(PortalAction::Machine(PortalMachineInput::NetIpl(
            NetIplEvent::Evaluate,
        )));

        self.state.transition(IppRxState::Current);
        vars.home_state.assign(DrcpState::EXPIRED, false);
        actions.push(PortalAction::StartTimer(
            PortalTimerKind::IppCurrentWhile,
            Self::current_while_interval(vars),
        ));
        if first_contact {
            actions.push(PortalAction::NttIpp);
        }
    }

    fn portal_matches(vars: &PortalVars, pdu: &DrcpPdu) -> bool {
        let topology = pdu.portal_config.topology_state;
        pdu.portal_info.portal_addr == vars.portal_addr
            && pdu.portal_info.portal_priority == vars.portal_priority
            && !topology.three_system()
            && (1..=2).contains(&topology.system_number())
            && topology.system_number() != vars.system_number
            && pdu.portal_config.gateway_algorithm == vars.gateway_algorithm
    }

    fn record_neighbor(vars: &mut PortalVars, pdu: &DrcpPdu) {
        let neighbor = &mut vars.ipp.neighbor;
        neighbor.valid = true;
        neighbor.system_number = pdu.portal_config.topology_state.system_number();
        neighbor.oper_aggregator_key = pdu.portal_config.oper_aggregator_key;
        neighbor.state = pdu.state;
        neighbor.gateway_digest = pdu.portal_config.gateway_digest;
        neighbor.port_digest = pdu.portal_config.port_digest;
        neighbor.active_ports = pdu.home_ports.active_ports.clone();
        neighbor.network_method = pdu.network_ipl_method.unwrap_or(0);
        if let Some(ref tlv) = pdu.home_gateway_vector {
            neighbor.gateway_vector = tlv.vector;
            neighbor.gateway_sequence = tlv.sequence;
            vars.gateway_vectors.insert(tlv.sequence, tlv.vector);
        }
    }

    fn current_while_interval(vars: &PortalVars) -> Duration {
        if vars.home_state.short_timeout() {
            SHORT_TIMEOUT
        } else {
            LONG_TIMEOUT
        }
    }
}
