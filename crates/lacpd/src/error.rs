//! Error types for lacpd configuration and runtime operations.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors rejected at the configuration boundary.
///
/// A configuration error never partially mutates state: every operation
/// validates completely before touching any registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("aggregator id {0} already exists")]
    DuplicateAggregatorId(u32),

    #[error("aggregator name '{0}' already exists")]
    DuplicateAggregatorName(String),

    #[error("aggregator admin key {0} already in use")]
    DuplicateAggregatorKey(u16),

    #[error("port {0} already exists")]
    DuplicatePort(u16),

    #[error("unknown aggregator id {0}")]
    UnknownAggregator(u32),

    #[error("unknown port {0}")]
    UnknownPort(u16),

    #[error("port {0} must be removed from its aggregator before deletion")]
    PortStillMember(u16),

    #[error("port {port} is already a member of aggregator {agg_id}")]
    AlreadyMember { port: u16, agg_id: u32 },

    #[error("port {port} is not a member of aggregator {agg_id}")]
    NotMember { port: u16, agg_id: u32 },

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("distributed relay '{0}' already exists")]
    DuplicatePortal(String),

    #[error("unknown distributed relay '{0}'")]
    UnknownPortal(String),

    #[error("portal system number {0} out of range (1-2)")]
    InvalidPortalSystemNumber(u8),

    #[error("three-system portals are not supported")]
    ThreeSystemPortal,
}
