//! Slow Protocols Ethernet framing.

use crate::error::{PduError, PduResult};
use crate::{subtype, DrcpPdu, LacpPdu, MarkerPdu};
use bytes::{Buf, BufMut, BytesMut};
use sonic_lacp_types::MacAddress;

/// The Slow Protocols EtherType.
pub const ETHER_TYPE_SLOW: u16 = 0x8809;

const ETH_HEADER_LEN: usize = 14;

/// The PDU payload of a Slow Protocols frame, dispatched on the subtype
/// octet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlowPdu {
    Lacp(LacpPdu),
    Marker(MarkerPdu),
    Drcp(DrcpPdu),
}

/// A full Slow Protocols frame: Ethernet header plus PDU body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowProtocolFrame {
    pub dst: MacAddress,
    pub src: MacAddress,
    pub pdu: SlowPdu,
}

impl SlowProtocolFrame {
    /// A LACP or Marker frame to the Slow Protocols group address.
    pub fn slow_protocols(src: MacAddress, pdu: SlowPdu) -> Self {
        SlowProtocolFrame {
            dst: MacAddress::SLOW_PROTOCOLS,
            src,
            pdu,
        }
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(128);
        buf.put_slice(&self.dst.octets());
        buf.put_slice(&self.src.octets());
        buf.put_u16(ETHER_TYPE_SLOW);
        match &self.pdu {
            SlowPdu::Lacp(pdu) => pdu.encode(&mut buf),
            SlowPdu::Marker(pdu) => pdu.encode(&mut buf),
            SlowPdu::Drcp(pdu) => pdu.encode(&mut buf),
        }
        buf
    }

    pub fn decode(mut frame: &[u8]) -> PduResult<SlowProtocolFrame> {
        if frame.len() < ETH_HEADER_LEN + 1 {
            return Err(PduError::BadLength {
                expected: ETH_HEADER_LEN + 1,
                actual: frame.len(),
            });
        }

        let mut dst = [0u8; 6];
        frame.copy_to_slice(&mut dst);
        let mut src = [0u8; 6];
        frame.copy_to_slice(&mut src);
        let ether_type = frame.get_u16();
        if ether_type != ETHER_TYPE_SLOW {
            return Err(PduError::BadEtherType(ether_type));
        }

        let pdu = match frame[0] {
            subtype::LACP => SlowPdu::Lacp(LacpPdu::decode(frame)?),
            subtype::MARKER => SlowPdu::Marker(MarkerPdu::decode(frame)?),
            subtype::DRCP => SlowPdu::Drcp(DrcpPdu::decode(frame)?),
            other => return Err(PduError::BadSubtype(other)),
        };

        Ok(SlowProtocolFrame {
            dst: MacAddress::new(dst),
            src: MacAddress::new(src),
            pdu,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_lacp_frame_round_trip() {
        let frame = SlowProtocolFrame::slow_protocols(
            "00:01:02:03:04:05".parse().unwrap(),
            SlowPdu::Lacp(LacpPdu::default()),
        );
        let bytes = frame.encode();
        assert_eq!(frame.dst, MacAddress::SLOW_PROTOCOLS);
        assert_eq!(SlowProtocolFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_drcp_frame_round_trip() {
        let frame = SlowProtocolFrame {
            dst: MacAddress::NEAREST_NON_TPMR_BRIDGE,
            src: "00:01:02:03:04:06".parse().unwrap(),
            pdu: SlowPdu::Drcp(DrcpPdu::default()),
        };
        let bytes = frame.encode();
        assert_eq!(SlowProtocolFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_wrong_ethertype() {
        let frame = SlowProtocolFrame::slow_protocols(
            "00:01:02:03:04:05".parse().unwrap(),
            SlowPdu::Lacp(LacpPdu::default()),
        );
        let mut bytes = frame.encode();
        bytes[12] = 0x08;
        bytes[13] = 0x00;
        assert_eq!(
            SlowProtocolFrame::decode(&bytes).unwrap_err(),
            PduError::BadEtherType(0x0800)
        );
    }

    #[test]
    fn test_unknown_subtype() {
        let frame = SlowProtocolFrame::slow_protocols(
            "00:01:02:03:04:05".parse().unwrap(),
            SlowPdu::Lacp(LacpPdu::default()),
        );
        let mut bytes = frame.encode();
        bytes[14] = 0x0a;
        assert_eq!(
            SlowProtocolFrame::decode(&bytes).unwrap_err(),
            PduError::BadSubtype(0x0a)
        );
    }
}
