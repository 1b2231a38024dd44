//! Port identity and administrative attributes.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A port's 16-bit priority and 16-bit number, as carried in the party
/// records of an LACPDU. Ordered priority-first like [`crate::SystemId`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortIdentity {
    pub priority: u16,
    pub number: u16,
}

impl PortIdentity {
    pub const fn new(priority: u16, number: u16) -> Self {
        PortIdentity { priority, number }
    }
}

impl fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.priority, self.number)
    }
}

/// Administrative LACP mode of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LacpMode {
    /// LACP disabled; the port aggregates statically.
    On,
    /// LACP enabled, actively transmitting.
    Active,
    /// LACP enabled, transmitting only when the partner is active.
    Passive,
}

impl LacpMode {
    pub fn lacp_enabled(&self) -> bool {
        !matches!(self, LacpMode::On)
    }
}

impl FromStr for LacpMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(LacpMode::On),
            "active" => Ok(LacpMode::Active),
            "passive" => Ok(LacpMode::Passive),
            _ => Err(ParseError::InvalidLacpMode(s.to_string())),
        }
    }
}

/// Administrative timeout preference: how fast we ask the partner to talk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LacpTimeout {
    /// 3 second timeout, 1 second partner transmit interval.
    Short,
    /// 90 second timeout, 30 second partner transmit interval.
    Long,
}

impl FromStr for LacpTimeout {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(LacpTimeout::Short),
            "long" => Ok(LacpTimeout::Long),
            _ => Err(ParseError::InvalidLacpTimeout(s.to_string())),
        }
    }
}

/// Link attributes that gate aggregation compatibility. Ports attached to
/// the same aggregator must agree on speed and duplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortProperties {
    /// Link speed in Mbps.
    pub speed_mbps: u32,
    /// Full duplex. Half-duplex links are never aggregatable.
    pub full_duplex: bool,
    pub mtu: u32,
}

impl Default for PortProperties {
    fn default() -> Self {
        PortProperties {
            speed_mbps: 10_000,
            full_duplex: true,
            mtu: 9100,
        }
    }
}

impl PortProperties {
    /// Two ports may share an aggregator only if this holds.
    pub fn compatible_with(&self, other: &PortProperties) -> bool {
        self.speed_mbps == other.speed_mbps && self.full_duplex && other.full_duplex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_port_identity_ordering() {
        let a = PortIdentity::new(1, 200);
        let b = PortIdentity::new(2, 1);
        assert!(a < b);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("active".parse::<LacpMode>().unwrap(), LacpMode::Active);
        assert_eq!("on".parse::<LacpMode>().unwrap(), LacpMode::On);
        assert!("bogus".parse::<LacpMode>().is_err());
        assert!(!LacpMode::On.lacp_enabled());
        assert!(LacpMode::Passive.lacp_enabled());
    }

    #[test]
    fn test_properties_compatibility() {
        let a = PortProperties::default();
        let mut b = PortProperties::default();
        assert!(a.compatible_with(&b));

        b.speed_mbps = 25_000;
        assert!(!a.compatible_with(&b));

        let half = PortProperties {
            full_duplex: false,
            ..PortProperties::default()
        };
        assert!(!half.compatible_with(&a));
    }
}
