//! Marker protocol PDUs (802.1AX-2014 6.5).
//!
//! A Marker is sent down a link being removed from service; the partner
//! echoes it back as a Marker Response once every in-flight frame on the
//! link has been delivered.

use crate::error::{PduError, PduResult};
use crate::subtype;
use bytes::{Buf, BufMut, BytesMut};
use sonic_lacp_types::MacAddress;

/// Length of a LAMPDU body, matching the LACPDU for frame symmetry.
pub const MARKER_LEN: usize = 110;

const VERSION: u8 = 0x01;
const TLV_MARKER_INFO: u8 = 0x01;
const TLV_MARKER_RESPONSE: u8 = 0x02;
const MARKER_TLV_LEN: u8 = 16;

/// Marker request or the echoed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Info,
    Response,
}

/// A decoded LAMPDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPdu {
    pub kind: MarkerKind,
    pub requester_port: u16,
    pub requester_system: MacAddress,
    pub transaction_id: u32,
}

impl MarkerPdu {
    /// Builds the response to a received marker, echoing the requester
    /// fields unchanged.
    pub fn response_to(&self) -> MarkerPdu {
        MarkerPdu {
            kind: MarkerKind::Response,
            ..*self
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(MARKER_LEN);
        buf.put_u8(subtype::MARKER);
        buf.put_u8(VERSION);
        buf.put_u8(match self.kind {
            MarkerKind::Info => TLV_MARKER_INFO,
            MarkerKind::Response => TLV_MARKER_RESPONSE,
        });
        buf.put_u8(MARKER_TLV_LEN);
        buf.put_u16(self.requester_port);
        buf.put_slice(&self.requester_system.octets());
        buf.put_u32(self.transaction_id);
        buf.put_bytes(0, 2);

        // terminator plus pad out to the fixed length
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_bytes(0, 90);
    }

    pub fn decode(mut body: &[u8]) -> PduResult<MarkerPdu> {
        if body.len() < MARKER_LEN {
            return Err(PduError::BadLength {
                expected: MARKER_LEN,
                actual: body.len(),
            });
        }

        let st = body.get_u8();
        if st != subtype::MARKER {
            return Err(PduError::BadSubtype(st));
        }
        let version = body.get_u8();
        if version != VERSION {
            return Err(PduError::BadVersion(version));
        }

        let tlv_type = body.get_u8();
        let kind = match tlv_type {
            TLV_MARKER_INFO => MarkerKind::Info,
            TLV_MARKER_RESPONSE => MarkerKind::Response,
            _ => return Err(PduError::MissingTlv(TLV_MARKER_INFO)),
        };
        let tlv_len = body.get_u8();
        if tlv_len != MARKER_TLV_LEN {
            return Err(PduError::BadTlvLength {
                tlv_type,
                length: tlv_len as usize,
            });
        }

        let requester_port = body.get_u16();
        let mut mac = [0u8; 6];
        body.copy_to_slice(&mut mac);
        let transaction_id = body.get_u32();

        Ok(MarkerPdu {
            kind,
            requester_port,
            requester_system: MacAddress::new(mac),
            transaction_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> MarkerPdu {
        MarkerPdu {
            kind: MarkerKind::Info,
            requester_port: 7,
            requester_system: "00:01:02:03:04:05".parse().unwrap(),
            transaction_id: 0xdead_beef,
        }
    }

    #[test]
    fn test_round_trip() {
        let pdu = sample();
        let mut buf = BytesMut::new();
        pdu.encode(&mut buf);
        assert_eq!(buf.len(), MARKER_LEN);
        assert_eq!(MarkerPdu::decode(&buf).unwrap(), pdu);
    }

    #[test]
    fn test_response_echoes_requester() {
        let pdu = sample();
        let resp = pdu.response_to();
        assert_eq!(resp.kind, MarkerKind::Response);
        assert_eq!(resp.requester_port, pdu.requester_port);
        assert_eq!(resp.transaction_id, pdu.transaction_id);

        let mut buf = BytesMut::new();
        resp.encode(&mut buf);
        let back = MarkerPdu::decode(&buf).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn test_decode_unknown_marker_tlv() {
        let mut buf = BytesMut::new();
        sample().encode(&mut buf);
        buf[2] = 0x05;
        assert!(MarkerPdu::decode(&buf).is_err());
    }
}
