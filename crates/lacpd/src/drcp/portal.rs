//! Portal variables and the portal actor task.

use crate::drcp::conversation::ConversationAdminMap;
use crate::drcp::gateway_vector::GatewayVectorDb;
use crate::drcp::machines::aggregator::{AggEvent, AggMachine};
use crate::drcp::machines::gateway::{GatewayEvent, GatewayMachine};
use crate::drcp::machines::ipp_periodic::{IppPeriodicEvent, IppPeriodicMachine};
use crate::drcp::machines::ipp_rx::{IppRxEvent, IppRxMachine};
use crate::drcp::machines::net_ipl::{NetIplEvent, NetIplMachine};
use crate::drcp::machines::ps::{PsEvent, PsMachine};
use crate::drcp::{
    DistributedRelayConfig, DrOperView, PortalAction, PortalActions, PortalEvent, PortalHandle,
    PortalMachineInput, PortalTimerKind,
};
use crate::system::LacpSystem;
use crate::timers::TimerSet;
use sonic_lacp_pdu::{
    DrcpPdu, DrcpState, GatewayVectorTlv, PortalConfigInfo, PortalInfo, PortsInfo, SlowPdu,
    SlowProtocolFrame, TopologyState, GATEWAY_ALGORITHM_VID, PORT_ALGORITHM_VID,
};
use sonic_lacp_types::{ConversationMask, MacAddress};
use std::collections::VecDeque;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// DRCP protocol counters of one portal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortalCounters {
    pub drcpdu_rx: u64,
    pub drcpdu_tx: u64,
    pub parse_errors: u64,
    /// DRCPDUs naming a different portal (misconfiguration).
    pub wrong_portal_drops: u64,
}

/// What we last heard from the neighbor portal system.
#[derive(Debug, Clone)]
pub struct NeighborInfo {
    pub valid: bool,
    pub system_number: u8,
    pub oper_aggregator_key: u16,
    pub state: DrcpState,
    pub gateway_digest: [u8; 16],
    pub port_digest: [u8; 16],
    pub gateway_vector: ConversationMask,
    pub gateway_sequence: u32,
    pub active_ports: Vec<u32>,
    /// Network/IPL sharing method the neighbor advertises.
    pub network_method: u32,
}

impl Default for NeighborInfo {
    fn default() -> Self {
        NeighborInfo {
            valid: false,
            system_number: 0,
            oper_aggregator_key: 0,
            state: DrcpState::default(),
            gateway_digest: [0; 16],
            port_digest: [0; 16],
            gateway_vector: ConversationMask::EMPTY,
            gateway_sequence: 0,
            active_ports: Vec::new(),
            network_method: 0,
        }
    }
}

/// Per-IPP variables (a two-system portal has exactly one IPP).
#[derive(Debug, Clone, Default)]
pub struct IppVars {
    pub ntt: bool,
    pub neighbor: NeighborInfo,
    /// Conversation digests disagree with the neighbor.
    pub differ_portal: bool,
    /// The neighbor names a different portal entirely.
    pub differ_conf_portal: bool,
}

/// The per-portal variables shared by its machines (802.1AX-2014 9.4.8).
#[derive(Debug, Clone)]
pub struct PortalVars {
    pub name: String,
    pub system_number: u8,
    pub portal_addr: MacAddress,
    pub portal_priority: u16,
    pub aggregator_id: u32,
    pub aggregator_mac: MacAddress,
    pub aggregator_priority: u16,
    pub admin_aggregator_key: u16,
    pub oper_aggregator_key: u16,
    pub oper_partner_aggregator_key: u16,
    /// Port numbers of the active local aggregation links.
    pub active_ports: Vec<u32>,
    pub ipp_port: u16,
    pub conv_admin_gateway: ConversationAdminMap,
    pub gateway_algorithm: u32,
    pub port_algorithm: u32,
    pub home_gateway_digest: [u8; 16],
    pub home_port_digest: [u8; 16],
    pub home_gateway_mask: ConversationMask,
    pub home_port_mask: ConversationMask,
    pub home_gateway_sequence: u32,
    pub gateway_vectors: GatewayVectorDb,
    pub home_state: DrcpState,
    pub ipp: IppVars,
    pub counters: PortalCounters,
}

impl PortalVars {
    fn new(config: DistributedRelayConfig) -> Self {
        let mut conv_admin_gateway = ConversationAdminMap::vid_time_sharing();
        for (vid, systems) in &config.gateway_assignments {
            if let Ok(id) = sonic_lacp_types::ConversationId::new(*vid) {
                conv_admin_gateway.assign(id, systems.clone());
            }
        }
        let digest = conv_admin_gateway.digest();
        let mut home_state = DrcpState::default();
        home_state.assign(DrcpState::IPP_ACTIVITY, true);
        home_state.assign(DrcpState::TIMEOUT, true);

        PortalVars {
            name: config.name,
            system_number: config.system_number,
            portal_addr: config.portal_addr,
            portal_priority: config.portal_priority,
            aggregator_id: config.aggregator_id,
            aggregator_mac: config.aggregator_mac,
            aggregator_priority: config.aggregator_priority,
            admin_aggregator_key: config.admin_aggregator_key,
            oper_aggregator_key: config.admin_aggregator_key,
            oper_partner_aggregator_key: 0,
            active_ports: Vec::new(),
            ipp_port: config.ipp_port,
            conv_admin_gateway,
            gateway_algorithm: GATEWAY_ALGORITHM_VID,
            port_algorithm: PORT_ALGORITHM_VID,
            home_gateway_digest: digest,
            home_port_digest: digest,
            home_gateway_mask: ConversationMask::EMPTY,
            home_port_mask: ConversationMask::EMPTY,
            home_gateway_sequence: 0,
            gateway_vectors: GatewayVectorDb::new(),
            home_state,
            ipp: IppVars::default(),
            counters: PortalCounters::default(),
        }
    }

    /// The DRCPDU advertising our current portal view.
    pub fn build_drcpdu(&self) -> DrcpPdu {
        DrcpPdu {
            portal_info: PortalInfo {
                aggregator_priority: self.aggregator_priority,
                aggregator_id: self.aggregator_mac,
                portal_priority: self.portal_priority,
                portal_addr: self.portal_addr,
            },
            portal_config: PortalConfigInfo {
                topology_state: TopologyState::new(self.system_number, false, true),
                oper_aggregator_key: self.oper_aggregator_key,
                port_algorithm: self.port_algorithm,
                gateway_algorithm: self.gateway_algorithm,
                port_digest: self.home_port_digest,
                gateway_digest: self.home_gateway_digest,
            },
            state: self.home_state,
            home_ports: PortsInfo {
                admin_aggregator_key: self.admin_aggregator_key,
                oper_partner_aggregator_key: self.oper_partner_aggregator_key,
                active_ports: self.active_ports.clone(),
            },
            neighbor_ports: self.ipp.neighbor.valid.then(|| PortsInfo {
                admin_aggregator_key: self.ipp.neighbor.oper_aggregator_key,
                oper_partner_aggregator_key: self.oper_aggregator_key,
                active_ports: self.ipp.neighbor.active_ports.clone(),
            }),
            network_ipl_method: Some(crate::drcp::machines::net_ipl::METHOD_TIME_SHARED),
            home_gateway_vector: Some(GatewayVectorTlv {
                sequence: self.home_gateway_sequence,
                vector: self.home_gateway_mask,
            }),
            gateway_conversation: Some(self.home_gateway_mask),
            port_conversation: Some(self.home_port_mask),
        }
    }
}

/// The portal: variables plus its six machines.
pub struct Portal {
    pub vars: PortalVars,
    pub ps: PsMachine,
    pub gateway: GatewayMachine,
    pub agg: AggMachine,
    pub ipp_rx: IppRxMachine,
    pub ipp_periodic: IppPeriodicMachine,
    pub net_ipl: NetIplMachine,
}

impl Portal {
    fn new(vars: PortalVars) -> Self {
        let owner = vars.aggregator_id;
        Portal {
            vars,
            ps: PsMachine::new(owner),
            gateway: GatewayMachine::new(owner),
            agg: AggMachine::new(owner),
            ipp_rx: IppRxMachine::new(owner),
            ipp_periodic: IppPeriodicMachine::new(owner),
            net_ipl: NetIplMachine::new(owner),
        }
    }

    fn snapshot(&self) -> DrOperView {
        DrOperView {
            name: self.vars.name.clone(),
            system_number: self.vars.system_number,
            ps_state: self.ps.state_name(),
            gateway_state: self.gateway.state_name(),
            aggregator_state: self.agg.state_name(),
            ipp_rx_state: self.ipp_rx.state_name(),
            ipp_periodic_state: self.ipp_periodic.state_name(),
            net_ipl_state: self.net_ipl.state_name(),
            gateway_conversations: self.vars.home_gateway_mask.iter().map(|id| id.value()).collect(),
            port_conversations: self.vars.home_port_mask.iter().map(|id| id.value()).collect(),
            gateway_digest: self.vars.home_gateway_digest,
            differ_portal: self.vars.ipp.differ_portal,
            drcpdu_rx: self.vars.counters.drcpdu_rx,
            drcpdu_tx: self.vars.counters.drcpdu_tx,
            parse_errors: self.vars.counters.parse_errors,
        }
    }

    fn dispatch(&mut self, input: PortalMachineInput, actions: &mut PortalActions) {
        match input {
            PortalMachineInput::Ps(ev) => self.ps.on_event(&mut self.vars, ev, actions),
            PortalMachineInput::Gateway(ev) => self.gateway.on_event(&mut self.vars, ev, actions),
            PortalMachineInput::Agg(ev) => self.agg.on_event(&mut self.vars, ev, actions),
            PortalMachineInput::IppRx(ev) => self.ipp_rx.on_event(&mut self.vars, ev, actions),
            PortalMachineInput::IppPeriodic(ev) => {
                self.ipp_periodic.on_event(&mut self.vars, ev, actions)
            }
            PortalMachineInput::NetIpl(ev) => self.net_ipl.on_event(&mut self.vars, ev, actions),
        }
    }
}

struct PortalCtx {
    system: LacpSystem,
    timers: TimerSet<PortalTimerKind, PortalEvent>,
    snapshot: watch::Sender<DrOperView>,
}

pub(crate) fn spawn_portal(config: DistributedRelayConfig, system: LacpSystem) -> PortalHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let portal = Portal::new(PortalVars::new(config));
    let (snapshot_tx, snapshot_rx) = watch::channel(portal.snapshot());

    let handle = PortalHandle {
        name: portal.vars.name.clone(),
        events: events_tx.clone(),
        snapshot: snapshot_rx,
    };

    let ctx = PortalCtx {
        system,
        timers: TimerSet::new(events_tx, PortalEvent::Timer),
        snapshot: snapshot_tx,
    };

    tokio::spawn(run_portal(portal, ctx, events_rx));
    handle
}

async fn run_portal(
    mut portal: Portal,
    mut ctx: PortalCtx,
    mut inbox: mpsc::UnboundedReceiver<PortalEvent>,
) {
    info!(portal = %portal.vars.name, "portal actor started");
    while let Some(event) = inbox.recv().await {
        match event {
            PortalEvent::Kill(ack) => {
                ctx.timers.stop_all();
                let _ = ack.send(());
                break;
            }
            event => {
                handle_event(&mut portal, &mut ctx, event).await;
                let _ = ctx.snapshot.send(portal.snapshot());
            }
        }
    }
    info!(portal = %portal.vars.name, "portal actor stopped");
}

async fn handle_event(portal: &mut Portal, ctx: &mut PortalCtx, event: PortalEvent) {
    let mut queue: VecDeque<PortalMachineInput> = VecDeque::new();

    match event {
        PortalEvent::Begin => {
            refresh_aggregator(portal, ctx).await;
            queue.push_back(PortalMachineInput::Ps(PsEvent::Begin));
            queue.push_back(PortalMachineInput::Gateway(GatewayEvent::Begin));
            queue.push_back(PortalMachineInput::Agg(AggEvent::Begin));
            queue.push_back(PortalMachineInput::IppRx(IppRxEvent::Begin));
            queue.push_back(PortalMachineInput::IppPeriodic(IppPeriodicEvent::Begin));
            queue.push_back(PortalMachineInput::NetIpl(NetIplEvent::Begin));
        }
        PortalEvent::IppFrame(bytes) => match SlowProtocolFrame::decode(&bytes) {
            Ok(frame) => match frame.pdu {
                SlowPdu::Drcp(pdu) => {
                    portal.vars.counters.drcpdu_rx += 1;
                    queue.push_back(PortalMachineInput::IppRx(IppRxEvent::PduReceived(Box::new(
                        pdu,
                    ))));
                }
                _ => {
                    debug!(portal = %portal.vars.name, "non-DRCP slow frame on IPL dropped");
                }
            },
            Err(err) => {
                portal.vars.counters.parse_errors += 1;
                debug!(portal = %portal.vars.name, %err, "undecodable IPL frame dropped");
            }
        },
        PortalEvent::Timer(PortalTimerKind::IppCurrentWhile) => {
            queue.push_back(PortalMachineInput::IppRx(IppRxEvent::CurrentWhileExpired));
        }
        PortalEvent::Timer(PortalTimerKind::IppPeriodic) => {
            queue.push_back(PortalMachineInput::IppPeriodic(
                IppPeriodicEvent::TimerExpired,
            ));
        }
        PortalEvent::AggregatorChanged => {
            refresh_aggregator(portal, ctx).await;
            queue.push_back(PortalMachineInput::Agg(AggEvent::Update));
        }
        PortalEvent::Kill(_) => unreachable!("kill handled by the actor loop"),
    }

    while let Some(input) = queue.pop_front() {
        let mut actions = Vec::new();
        portal.dispatch(input, &mut actions);
        for action in actions {
            match action {
                PortalAction::Machine(input) => queue.push_back(input),
                PortalAction::StartTimer(kind, after) => ctx.timers.start(kind, after),
                PortalAction::StopTimer(kind) => ctx.timers.stop(kind),
                PortalAction::NttIpp => transmit_drcpdu(portal, ctx).await,
            }
        }
    }
}

/// Pulls the fronted aggregator's operational keys and active membership
/// into the portal variables.
async fn refresh_aggregator(portal: &mut Portal, ctx: &PortalCtx) {
    let Some(agg) = ctx.system.registry().aggregator(portal.vars.aggregator_id) else {
        return;
    };
    let state = agg.state.lock().await;
    portal.vars.oper_aggregator_key = state.oper_key;
    portal.vars.oper_partner_aggregator_key = state.partner_oper_key;
    portal.vars.active_ports = state
        .members
        .iter()
        .filter(|(_, m)| m.attached)
        .map(|(&n, _)| n as u32)
        .collect();
}

async fn transmit_drcpdu(portal: &mut Portal, ctx: &PortalCtx) {
    refresh_aggregator(portal, ctx).await;
    let pdu = portal.vars.build_drcpdu();
    let frame = SlowProtocolFrame {
        dst: MacAddress::NEAREST_NON_TPMR_BRIDGE,
        src: ctx.system.system_id().mac,
        pdu: SlowPdu::Drcp(pdu),
    };
    ctx.system
        .io()
        .transmit(portal.vars.ipp_port, frame.encode().to_vec());
    portal.vars.counters.drcpdu_tx += 1;
    portal.vars.ipp.ntt = false;
}
