//! LACP system identity.

use crate::MacAddress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The identity of an actor or partner system: a 16-bit priority and a
/// 48-bit MAC address.
///
/// Systems are totally ordered with the priority as the most significant
/// part, so `SystemId` comparisons give the standard "better system"
/// relation directly (lower sorts first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemId {
    pub priority: u16,
    pub mac: MacAddress,
}

impl SystemId {
    /// The all-zero system id, used for unlearned partner records.
    pub const ZERO: SystemId = SystemId {
        priority: 0,
        mac: MacAddress::ZERO,
    };

    pub const fn new(priority: u16, mac: MacAddress) -> Self {
        SystemId { priority, mac }
    }

    /// Returns true if this id carries no information (unlearned partner).
    pub fn is_zero(&self) -> bool {
        self.priority == 0 && self.mac.is_zero()
    }
}

impl PartialOrd for SystemId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SystemId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority, self.mac.as_u64()).cmp(&(other.priority, other.mac.as_u64()))
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.priority, self.mac)
    }
}
