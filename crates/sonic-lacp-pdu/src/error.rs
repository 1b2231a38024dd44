//! Codec error types.

use thiserror::Error;

/// Result type alias for codec operations.
pub type PduResult<T> = Result<T, PduError>;

/// Reasons a byte buffer failed to parse as a PDU.
///
/// A parse failure drops the frame; it never affects protocol state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PduError {
    /// The buffer is shorter than the fixed layout requires.
    #[error("bad length: need {expected} octets, have {actual}")]
    BadLength { expected: usize, actual: usize },

    /// The subtype octet named a protocol we do not speak.
    #[error("bad subtype: {0:#04x}")]
    BadSubtype(u8),

    /// The version octet is not one we understand.
    #[error("bad version: {0}")]
    BadVersion(u8),

    /// A TLV header promised more octets than the buffer holds.
    #[error("truncated TLV: type {tlv_type:#04x} wants {wanted} more octets")]
    TruncatedTlv { tlv_type: u8, wanted: usize },

    /// A known TLV carried a length other than its fixed size.
    #[error("bad TLV length: type {tlv_type:#04x} length {length}")]
    BadTlvLength { tlv_type: u8, length: usize },

    /// A TLV the decoder requires was absent.
    #[error("missing mandatory TLV: type {0:#04x}")]
    MissingTlv(u8),

    /// The EtherType is not Slow Protocols.
    #[error("bad EtherType: {0:#06x}")]
    BadEtherType(u16),
}
