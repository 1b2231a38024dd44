//! Table name constants for the lacpd configuration surface.
//!
//! These mirror the CONFIG_DB/APPL_DB vocabulary the configuration source
//! speaks; the daemon itself keeps no persistent state.

/// CONFIG_DB port channel table name
pub const CFG_PORTCHANNEL_TABLE_NAME: &str = "PORTCHANNEL";

/// CONFIG_DB port channel member table name
pub const CFG_PORTCHANNEL_MEMBER_TABLE_NAME: &str = "PORTCHANNEL_MEMBER";

/// APPL_DB LAG table name
pub const APP_LAG_TABLE_NAME: &str = "LAG_TABLE";

/// APPL_DB LAG member table name
pub const APP_LAG_MEMBER_TABLE_NAME: &str = "LAG_MEMBER_TABLE";

/// STATE_DB LAG table name
pub const STATE_LAG_TABLE_NAME: &str = "LAG_TABLE";

/// Field names
pub mod fields {
    /// Admin status field
    pub const ADMIN_STATUS: &str = "admin_status";

    /// MTU field
    pub const MTU: &str = "mtu";

    /// Minimum links field
    pub const MIN_LINKS: &str = "min_links";

    /// LACP fallback field
    pub const FALLBACK: &str = "fallback";

    /// LACP fast rate field
    pub const FAST_RATE: &str = "fast_rate";

    /// LACP mode field
    pub const LACP_MODE: &str = "lacp_mode";

    /// Member collecting/distributing status field
    pub const STATUS: &str = "status";
}
