//! LACPDU encode/decode (802.1AX-2014 6.4.2).

use crate::error::{PduError, PduResult};
use crate::subtype;
use bytes::{Buf, BufMut, BytesMut};
use sonic_lacp_types::{LacpState, MacAddress, PortIdentity, SystemId};

/// Length of an LACPDU body, from the subtype octet through the trailing
/// reserved field. The on-wire frame adds the Ethernet header around this.
pub const LACPDU_LEN: usize = 110;

const VERSION: u8 = 0x01;
const TLV_ACTOR: u8 = 0x01;
const TLV_PARTNER: u8 = 0x02;
const TLV_COLLECTOR: u8 = 0x03;
const TLV_TERMINATOR: u8 = 0x00;
const PARTY_TLV_LEN: u8 = 20;
const COLLECTOR_TLV_LEN: u8 = 16;

/// One party record (actor or partner) of an LACPDU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub system: SystemId,
    pub key: u16,
    pub port: PortIdentity,
    pub state: LacpState,
}

impl ParticipantInfo {
    /// True if the records name the same participant; the state byte is
    /// compared only on the Aggregation bit, per the selection rules.
    pub fn same_participant(&self, other: &ParticipantInfo) -> bool {
        self.system == other.system
            && self.key == other.key
            && self.port == other.port
            && self.state.aggregation() == other.state.aggregation()
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u16(self.system.priority);
        buf.put_slice(&self.system.mac.octets());
        buf.put_u16(self.key);
        buf.put_u16(self.port.priority);
        buf.put_u16(self.port.number);
        buf.put_u8(self.state.bits());
        buf.put_bytes(0, 3);
    }

    fn get(buf: &mut &[u8]) -> ParticipantInfo {
        let priority = buf.get_u16();
        let mut mac = [0u8; 6];
        buf.copy_to_slice(&mut mac);
        let key = buf.get_u16();
        let port_priority = buf.get_u16();
        let port_number = buf.get_u16();
        let state = LacpState::new(buf.get_u8());
        buf.advance(3);
        ParticipantInfo {
            system: SystemId::new(priority, MacAddress::new(mac)),
            key,
            port: PortIdentity::new(port_priority, port_number),
            state,
        }
    }
}

/// A decoded LACPDU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LacpPdu {
    pub actor: ParticipantInfo,
    pub partner: ParticipantInfo,
    pub collector_max_delay: u16,
}

impl LacpPdu {
    /// Serializes the PDU body into `buf`, always [`LACPDU_LEN`] octets.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(LACPDU_LEN);
        buf.put_u8(subtype::LACP);
        buf.put_u8(VERSION);

        buf.put_u8(TLV_ACTOR);
        buf.put_u8(PARTY_TLV_LEN);
        self.actor.put(buf);

        buf.put_u8(TLV_PARTNER);
        buf.put_u8(PARTY_TLV_LEN);
        self.partner.put(buf);

        buf.put_u8(TLV_COLLECTOR);
        buf.put_u8(COLLECTOR_TLV_LEN);
        buf.put_u16(self.collector_max_delay);
        buf.put_bytes(0, 12);

        buf.put_u8(TLV_TERMINATOR);
        buf.put_u8(0);
        buf.put_bytes(0, 50);
    }

    /// Parses an LACPDU body starting at the subtype octet.
    pub fn decode(mut body: &[u8]) -> PduResult<LacpPdu> {
        if body.len() < LACPDU_LEN {
            return Err(PduError::BadLength {
                expected: LACPDU_LEN,
                actual: body.len(),
            });
        }

        let subtype = body.get_u8();
        if subtype != subtype::LACP {
            return Err(PduError::BadSubtype(subtype));
        }
        let version = body.get_u8();
        if version != VERSION {
            return Err(PduError::BadVersion(version));
        }

        let actor = Self::expect_party(&mut body, TLV_ACTOR)?;
        let partner = Self::expect_party(&mut body, TLV_PARTNER)?;

        let tlv_type = body.get_u8();
        let tlv_len = body.get_u8();
        if tlv_type != TLV_COLLECTOR {
            return Err(PduError::MissingTlv(TLV_COLLECTOR));
        }
        if tlv_len != COLLECTOR_TLV_LEN {
            return Err(PduError::BadTlvLength {
                tlv_type,
                length: tlv_len as usize,
            });
        }
        let collector_max_delay = body.get_u16();
        body.advance(12);

        Ok(LacpPdu {
            actor,
            partner,
            collector_max_delay,
        })
    }

    fn expect_party(body: &mut &[u8], expected_type: u8) -> PduResult<ParticipantInfo> {
        let tlv_type = body.get_u8();
        let tlv_len = body.get_u8();
        if tlv_type != expected_type {
            return Err(PduError::MissingTlv(expected_type));
        }
        if tlv_len != PARTY_TLV_LEN {
            return Err(PduError::BadTlvLength {
                tlv_type,
                length: tlv_len as usize,
            });
        }
        Ok(ParticipantInfo::get(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> LacpPdu {
        LacpPdu {
            actor: ParticipantInfo {
                system: SystemId::new(128, "00:01:02:03:04:05".parse().unwrap()),
                key: 50,
                port: PortIdentity::new(128, 1),
                state: LacpState::new(
                    LacpState::ACTIVITY | LacpState::TIMEOUT | LacpState::AGGREGATION,
                ),
            },
            partner: ParticipantInfo {
                system: SystemId::new(128, "00:11:22:33:44:55".parse().unwrap()),
                key: 50,
                port: PortIdentity::new(128, 11),
                state: LacpState::new(LacpState::SYNC | LacpState::AGGREGATION),
            },
            collector_max_delay: 5,
        }
    }

    #[test]
    fn test_round_trip() {
        let pdu = sample();
        let mut buf = BytesMut::new();
        pdu.encode(&mut buf);
        assert_eq!(buf.len(), LACPDU_LEN);
        assert_eq!(LacpPdu::decode(&buf).unwrap(), pdu);
    }

    #[test]
    fn test_golden_layout() {
        let pdu = sample();
        let mut buf = BytesMut::new();
        pdu.encode(&mut buf);

        // subtype, version
        assert_eq!(buf[0], 0x01);
        assert_eq!(buf[1], 0x01);
        // actor TLV header and system priority
        assert_eq!(buf[2], 0x01);
        assert_eq!(buf[3], 20);
        assert_eq!(&buf[4..6], &[0x00, 0x80]);
        // actor MAC
        assert_eq!(&buf[6..12], &[0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
        // actor key, port priority, port number, state
        assert_eq!(&buf[12..14], &[0x00, 0x32]);
        assert_eq!(&buf[14..16], &[0x00, 0x80]);
        assert_eq!(&buf[16..18], &[0x00, 0x01]);
        assert_eq!(buf[18], 0x07);
        // partner TLV header
        assert_eq!(buf[22], 0x02);
        assert_eq!(buf[23], 20);
        // collector TLV
        assert_eq!(buf[42], 0x03);
        assert_eq!(buf[43], 16);
        assert_eq!(&buf[44..46], &[0x00, 0x05]);
        // terminator
        assert_eq!(buf[58], 0x00);
        assert_eq!(buf[59], 0x00);
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = LacpPdu::decode(&[0x01, 0x01, 0x00]).unwrap_err();
        assert_eq!(
            err,
            PduError::BadLength {
                expected: LACPDU_LEN,
                actual: 3
            }
        );
    }

    #[test]
    fn test_decode_wrong_subtype() {
        let mut buf = BytesMut::new();
        sample().encode(&mut buf);
        buf[0] = 0x09;
        assert_eq!(LacpPdu::decode(&buf).unwrap_err(), PduError::BadSubtype(0x09));
    }

    #[test]
    fn test_decode_bad_party_length() {
        let mut buf = BytesMut::new();
        sample().encode(&mut buf);
        buf[3] = 19;
        assert!(matches!(
            LacpPdu::decode(&buf).unwrap_err(),
            PduError::BadTlvLength { tlv_type: 0x01, .. }
        ));
    }

    #[test]
    fn test_same_participant_ignores_dynamic_state_bits() {
        let pdu = sample();
        let mut other = pdu.actor;
        other.state.set(LacpState::SYNC | LacpState::EXPIRED);
        assert!(pdu.actor.same_participant(&other));

        other.state.clear(LacpState::AGGREGATION);
        assert!(!pdu.actor.same_participant(&other));
    }
}
