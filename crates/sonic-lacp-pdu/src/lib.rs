//! Wire codec for the Slow Protocols PDUs used by link aggregation.
//!
//! Three PDU families share the 0x8809 EtherType and are told apart by the
//! subtype octet that follows the Ethernet header:
//!
//! - [`LacpPdu`] (subtype 0x01): the fixed 110-octet LACPDU
//! - [`MarkerPdu`] (subtype 0x02): Marker / Marker Response
//! - [`DrcpPdu`] (subtype 0x0B): the variable-length DRCPDU TLV chain
//!
//! `decode(encode(x)) == x` holds for every well-formed PDU; malformed input
//! yields a [`PduError`] and never panics.

mod drcpdu;
mod error;
mod frame;
mod lacpdu;
mod marker;

pub use drcpdu::{
    DrcpPdu, DrcpState, GatewayVectorTlv, PortalConfigInfo, PortalInfo, PortsInfo, TopologyState,
    GATEWAY_ALGORITHM_VID, PORT_ALGORITHM_VID,
};
pub use error::{PduError, PduResult};
pub use frame::{SlowPdu, SlowProtocolFrame, ETHER_TYPE_SLOW};
pub use lacpdu::{LacpPdu, ParticipantInfo, LACPDU_LEN};
pub use marker::{MarkerKind, MarkerPdu};

/// Subtype octet values.
pub mod subtype {
    pub const LACP: u8 = 0x01;
    pub const MARKER: u8 = 0x02;
    pub const DRCP: u8 = 0x0b;
}
