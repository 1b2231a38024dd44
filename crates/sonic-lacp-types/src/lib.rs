//! Common types for the SONiC link aggregation control plane.
//!
//! This crate provides type-safe representations of the primitives shared by
//! the LACP and DRCP state machinery:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`SystemId`]: LACP system identity (priority + MAC) with the standard
//!   total order used for system comparisons
//! - [`PortIdentity`]: per-port priority + port number
//! - [`LacpState`]: the actor/partner state byte and its eight bits
//! - [`ConversationId`]: 12-bit DRCP conversation identifiers

mod conversation;
mod mac;
mod port;
mod state;
mod system;

pub use conversation::{ConversationId, ConversationMask, MAX_CONVERSATION_IDS};
pub use mac::MacAddress;
pub use port::{LacpMode, LacpTimeout, PortIdentity, PortProperties};
pub use state::LacpState;
pub use system::SystemId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid conversation id: {0} (must be 0-4095)")]
    InvalidConversationId(u16),

    #[error("invalid LACP mode: {0}")]
    InvalidLacpMode(String),

    #[error("invalid LACP timeout: {0}")]
    InvalidLacpTimeout(String),
}
