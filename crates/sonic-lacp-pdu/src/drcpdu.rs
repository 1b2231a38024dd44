//! DRCPDU encode/decode (802.1AX-2014 9.4.3).
//!
//! Unlike the fixed LACPDU, a DRCPDU is a chain of TLVs. Each TLV is
//! prefixed by a one-octet type and a two-octet big-endian value length
//! (conversation vector TLVs exceed 255 octets). A terminator TLV of type 0
//! and length 0 ends the chain; unknown non-mandatory TLV types are skipped.

use crate::error::{PduError, PduResult};
use crate::subtype;
use bytes::{Buf, BufMut, BytesMut};
use sonic_lacp_types::{ConversationMask, MacAddress, MAX_CONVERSATION_IDS};

const VERSION: u8 = 0x01;

const TLV_TERMINATOR: u8 = 0x00;
const TLV_PORTAL_INFO: u8 = 0x01;
const TLV_PORTAL_CONFIG: u8 = 0x02;
const TLV_DRCP_STATE: u8 = 0x03;
const TLV_HOME_PORTS: u8 = 0x04;
const TLV_NEIGHBOR_PORTS: u8 = 0x05;
const TLV_NETWORK_IPL_METHOD: u8 = 0x06;
const TLV_HOME_GATEWAY_VECTOR: u8 = 0x07;
const TLV_GATEWAY_CONVERSATION: u8 = 0x08;
const TLV_PORT_CONVERSATION: u8 = 0x09;

const PORTAL_INFO_LEN: usize = 16;
const PORTAL_CONFIG_LEN: usize = 43;
const VECTOR_LEN: usize = MAX_CONVERSATION_IDS / 8;

/// Gateway algorithm identifier for VID (C-VID) based conversation ids:
/// the IEEE 802.1 OUI followed by algorithm 1.
pub const GATEWAY_ALGORITHM_VID: u32 = 0x0080_c201;

/// Port algorithm identifier for VID based distribution.
pub const PORT_ALGORITHM_VID: u32 = 0x0080_c201;

/// The DRCP state byte exchanged between portal systems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrcpState(u8);

impl DrcpState {
    pub const HOME_GATEWAY: u8 = 0x01;
    pub const NEIGHBOR_GATEWAY: u8 = 0x02;
    pub const OTHER_GATEWAY: u8 = 0x04;
    pub const IPP_ACTIVITY: u8 = 0x08;
    pub const TIMEOUT: u8 = 0x10;
    pub const GATEWAY_SYNC: u8 = 0x20;
    pub const PORT_SYNC: u8 = 0x40;
    pub const EXPIRED: u8 = 0x80;

    pub const fn new(bits: u8) -> Self {
        DrcpState(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn is_set(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn assign(&mut self, bit: u8, value: bool) {
        if value {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    /// True means the sender runs the short (fast) DRCP timeout.
    pub const fn short_timeout(&self) -> bool {
        self.is_set(Self::TIMEOUT)
    }

    pub const fn gateway_sync(&self) -> bool {
        self.is_set(Self::GATEWAY_SYNC)
    }

    pub const fn port_sync(&self) -> bool {
        self.is_set(Self::PORT_SYNC)
    }

    pub const fn expired(&self) -> bool {
        self.is_set(Self::EXPIRED)
    }
}

/// Portal Information TLV: who the sending portal system believes the
/// portal to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortalInfo {
    pub aggregator_priority: u16,
    pub aggregator_id: MacAddress,
    pub portal_priority: u16,
    pub portal_addr: MacAddress,
}

/// Topology bits carried in the Portal Configuration TLV.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopologyState(u8);

impl TopologyState {
    const SYSTEM_NUMBER_MASK: u8 = 0x03;
    const THREE_SYSTEM: u8 = 0x04;
    const COMMON_METHODS: u8 = 0x08;

    pub fn new(system_number: u8, three_system: bool, common_methods: bool) -> Self {
        let mut bits = system_number & Self::SYSTEM_NUMBER_MASK;
        if three_system {
            bits |= Self::THREE_SYSTEM;
        }
        if common_methods {
            bits |= Self::COMMON_METHODS;
        }
        TopologyState(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Portal system number of the sender, 1..=3.
    pub const fn system_number(&self) -> u8 {
        self.0 & Self::SYSTEM_NUMBER_MASK
    }

    pub const fn three_system(&self) -> bool {
        self.0 & Self::THREE_SYSTEM != 0
    }

    pub const fn common_methods(&self) -> bool {
        self.0 & Self::COMMON_METHODS != 0
    }
}

/// Portal Configuration TLV: the sender's operational keys, algorithms and
/// conversation digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalConfigInfo {
    pub topology_state: TopologyState,
    pub oper_aggregator_key: u16,
    pub port_algorithm: u32,
    pub gateway_algorithm: u32,
    pub port_digest: [u8; 16],
    pub gateway_digest: [u8; 16],
}

impl Default for PortalConfigInfo {
    fn default() -> Self {
        PortalConfigInfo {
            topology_state: TopologyState::default(),
            oper_aggregator_key: 0,
            port_algorithm: PORT_ALGORITHM_VID,
            gateway_algorithm: GATEWAY_ALGORITHM_VID,
            port_digest: [0; 16],
            gateway_digest: [0; 16],
        }
    }
}

/// Home or Neighbor Ports Information TLV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortsInfo {
    pub admin_aggregator_key: u16,
    pub oper_partner_aggregator_key: u16,
    /// Port numbers of the sender's active aggregation links.
    pub active_ports: Vec<u32>,
}

/// Home Gateway Vector TLV: the sender's gateway claim plus its sequence
/// number in the gateway vector database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayVectorTlv {
    pub sequence: u32,
    pub vector: ConversationMask,
}

/// A decoded DRCPDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrcpPdu {
    pub portal_info: PortalInfo,
    pub portal_config: PortalConfigInfo,
    pub state: DrcpState,
    pub home_ports: PortsInfo,
    pub neighbor_ports: Option<PortsInfo>,
    pub network_ipl_method: Option<u32>,
    pub home_gateway_vector: Option<GatewayVectorTlv>,
    pub gateway_conversation: Option<ConversationMask>,
    pub port_conversation: Option<ConversationMask>,
}

impl Default for DrcpPdu {
    fn default() -> Self {
        DrcpPdu {
            portal_info: PortalInfo::default(),
            portal_config: PortalConfigInfo::default(),
            state: DrcpState::default(),
            home_ports: PortsInfo::default(),
            neighbor_ports: None,
            network_ipl_method: None,
            home_gateway_vector: None,
            gateway_conversation: None,
            port_conversation: None,
        }
    }
}

impl DrcpPdu {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(subtype::DRCP);
        buf.put_u8(VERSION);

        Self::tlv_header(buf, TLV_PORTAL_INFO, PORTAL_INFO_LEN);
        buf.put_u16(self.portal_info.aggregator_priority);
        buf.put_slice(&self.portal_info.aggregator_id.octets());
        buf.put_u16(self.portal_info.portal_priority);
        buf.put_slice(&self.portal_info.portal_addr.octets());

        Self::tlv_header(buf, TLV_PORTAL_CONFIG, PORTAL_CONFIG_LEN);
        buf.put_u8(self.portal_config.topology_state.bits());
        buf.put_u16(self.portal_config.oper_aggregator_key);
        buf.put_u32(self.portal_config.port_algorithm);
        buf.put_u32(self.portal_config.gateway_algorithm);
        buf.put_slice(&self.portal_config.port_digest);
        buf.put_slice(&self.portal_config.gateway_digest);

        Self::tlv_header(buf, TLV_DRCP_STATE, 1);
        buf.put_u8(self.state.bits());

        Self::put_ports(buf, TLV_HOME_PORTS, &self.home_ports);
        if let Some(ref neighbor) = self.neighbor_ports {
            Self::put_ports(buf, TLV_NEIGHBOR_PORTS, neighbor);
        }
        if let Some(method) = self.network_ipl_method {
            Self::tlv_header(buf, TLV_NETWORK_IPL_METHOD, 4);
            buf.put_u32(method);
        }
        if let Some(ref gv) = self.home_gateway_vector {
            Self::tlv_header(buf, TLV_HOME_GATEWAY_VECTOR, 4 + VECTOR_LEN);
            buf.put_u32(gv.sequence);
            buf.put_slice(gv.vector.octets());
        }
        if let Some(ref mask) = self.gateway_conversation {
            Self::tlv_header(buf, TLV_GATEWAY_CONVERSATION, VECTOR_LEN);
            buf.put_slice(mask.octets());
        }
        if let Some(ref mask) = self.port_conversation {
            Self::tlv_header(buf, TLV_PORT_CONVERSATION, VECTOR_LEN);
            buf.put_slice(mask.octets());
        }

        Self::tlv_header(buf, TLV_TERMINATOR, 0);
    }

    fn tlv_header(buf: &mut BytesMut, tlv_type: u8, len: usize) {
        buf.put_u8(tlv_type);
        buf.put_u16(len as u16);
    }

    fn put_ports(buf: &mut BytesMut, tlv_type: u8, ports: &PortsInfo) {
        Self::tlv_header(buf, tlv_type, 4 + 4 * ports.active_ports.len());
        buf.put_u16(ports.admin_aggregator_key);
        buf.put_u16(ports.oper_partner_aggregator_key);
        for port in &ports.active_ports {
            buf.put_u32(*port);
        }
    }

    pub fn decode(mut body: &[u8]) -> PduResult<DrcpPdu> {
        if body.len() < 2 {
            return Err(PduError::BadLength {
                expected: 2,
                actual: body.len(),
            });
        }
        let st = body.get_u8();
        if st != subtype::DRCP {
            return Err(PduError::BadSubtype(st));
        }
        let version = body.get_u8();
        if version != VERSION {
            return Err(PduError::BadVersion(version));
        }

        let mut portal_info = None;
        let mut portal_config = None;
        let mut state = None;
        let mut home_ports = None;
        let mut pdu = DrcpPdu::default();

        loop {
            if body.remaining() < 1 {
                return Err(PduError::MissingTlv(TLV_TERMINATOR));
            }
            let tlv_type = body.get_u8();
            if tlv_type == TLV_TERMINATOR {
                break;
            }
            if body.remaining() < 2 {
                return Err(PduError::TruncatedTlv { tlv_type, wanted: 2 });
            }
            let len = body.get_u16() as usize;
            if body.remaining() < len {
                return Err(PduError::TruncatedTlv {
                    tlv_type,
                    wanted: len - body.remaining(),
                });
            }
            let (mut value, rest) = body.split_at(len);
            body = rest;

            match tlv_type {
                TLV_PORTAL_INFO => {
                    Self::check_len(tlv_type, len, PORTAL_INFO_LEN)?;
                    portal_info = Some(PortalInfo {
                        aggregator_priority: value.get_u16(),
                        aggregator_id: Self::get_mac(&mut value),
                        portal_priority: value.get_u16(),
                        portal_addr: Self::get_mac(&mut value),
                    });
                }
                TLV_PORTAL_CONFIG => {
                    Self::check_len(tlv_type, len, PORTAL_CONFIG_LEN)?;
                    let topology_state = TopologyState(value.get_u8());
                    let oper_aggregator_key = value.get_u16();
                    let port_algorithm = value.get_u32();
                    let gateway_algorithm = value.get_u32();
                    let mut port_digest = [0u8; 16];
                    value.copy_to_slice(&mut port_digest);
                    let mut gateway_digest = [0u8; 16];
                    value.copy_to_slice(&mut gateway_digest);
                    portal_config = Some(PortalConfigInfo {
                        topology_state,
                        oper_aggregator_key,
                        port_algorithm,
                        gateway_algorithm,
                        port_digest,
                        gateway_digest,
                    });
                }
                TLV_DRCP_STATE => {
                    Self::check_len(tlv_type, len, 1)?;
                    state = Some(DrcpState::new(value.get_u8()));
                }
                TLV_HOME_PORTS => {
                    home_ports = Some(Self::get_ports(tlv_type, len, &mut value)?);
                }
                TLV_NEIGHBOR_PORTS => {
                    pdu.neighbor_ports = Some(Self::get_ports(tlv_type, len, &mut value)?);
                }
                TLV_NETWORK_IPL_METHOD => {
                    Self::check_len(tlv_type, len, 4)?;
                    pdu.network_ipl_method = Some(value.get_u32());
                }
                TLV_HOME_GATEWAY_VECTOR => {
                    Self::check_len(tlv_type, len, 4 + VECTOR_LEN)?;
                    let sequence = value.get_u32();
                    pdu.home_gateway_vector = Some(GatewayVectorTlv {
                        sequence,
                        vector: Self::get_mask(&mut value),
                    });
                }
                TLV_GATEWAY_CONVERSATION => {
                    Self::check_len(tlv_type, len, VECTOR_LEN)?;
                    pdu.gateway_conversation = Some(Self::get_mask(&mut value));
                }
                TLV_PORT_CONVERSATION => {
                    Self::check_len(tlv_type, len, VECTOR_LEN)?;
                    pdu.port_conversation = Some(Self::get_mask(&mut value));
                }
                // forward compatibility: skip TLVs we do not know
                _ => {}
            }
        }

        pdu.portal_info = portal_info.ok_or(PduError::MissingTlv(TLV_PORTAL_INFO))?;
        pdu.portal_config = portal_config.ok_or(PduError::MissingTlv(TLV_PORTAL_CONFIG))?;
        pdu.state = state.ok_or(PduError::MissingTlv(TLV_DRCP_STATE))?;
        pdu.home_ports = home_ports.ok_or(PduError::MissingTlv(TLV_HOME_PORTS))?;
        Ok(pdu)
    }

    fn check_len(tlv_type: u8, len: usize, expected: usize) -> PduResult<()> {
        if len != expected {
            return Err(PduError::BadTlvLength {
                tlv_type,
                length: len,
            });
        }
        Ok(())
    }

    fn get_mac(value: &mut &[u8]) -> MacAddress {
        let mut mac = [0u8; 6];
        value.copy_to_slice(&mut mac);
        MacAddress::new(mac)
    }

    fn get_mask(value: &mut &[u8]) -> ConversationMask {
        let mut octets = [0u8; VECTOR_LEN];
        value.copy_to_slice(&mut octets);
        ConversationMask::from_octets(octets)
    }

    fn get_ports(tlv_type: u8, len: usize, value: &mut &[u8]) -> PduResult<PortsInfo> {
        if len < 4 || (len - 4) % 4 != 0 {
            return Err(PduError::BadTlvLength {
                tlv_type,
                length: len,
            });
        }
        let admin_aggregator_key = value.get_u16();
        let oper_partner_aggregator_key = value.get_u16();
        let count = (len - 4) / 4;
        let mut active_ports = Vec::with_capacity(count);
        for _ in 0..count {
            active_ports.push(value.get_u32());
        }
        Ok(PortsInfo {
            admin_aggregator_key,
            oper_partner_aggregator_key,
            active_ports,
        })
    }
}
