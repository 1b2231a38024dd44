//! MAC address type with safe parsing and formatting.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// # Examples
///
/// ```
/// use sonic_lacp_types::MacAddress;
///
/// let mac: MacAddress = "00:01:02:03:04:05".parse().unwrap();
/// assert_eq!(mac.to_string(), "00:01:02:03:04:05");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The zero/null MAC address (00:00:00:00:00:00).
    pub const ZERO: MacAddress = MacAddress([0, 0, 0, 0, 0, 0]);

    /// The Slow Protocols destination address used by LACP and Marker PDUs
    /// (01:80:C2:00:00:02).
    pub const SLOW_PROTOCOLS: MacAddress = MacAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x02]);

    /// The default destination address for DRCPDUs on intra-portal links
    /// (01:80:C2:00:00:03).
    pub const NEAREST_NON_TPMR_BRIDGE: MacAddress = MacAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x03]);

    /// Creates a new MAC address from raw octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    /// Returns the raw octets of the MAC address.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Returns true if this is a multicast address.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Returns true if this is the zero address.
    pub const fn is_zero(&self) -> bool {
        self.0[0] == 0
            && self.0[1] == 0
            && self.0[2] == 0
            && self.0[3] == 0
            && self.0[4] == 0
            && self.0[5] == 0
    }

    /// Returns the address as a 48-bit integer, for ordering comparisons.
    pub const fn as_u64(&self) -> u64 {
        (self.0[0] as u64) << 40
            | (self.0[1] as u64) << 32
            | (self.0[2] as u64) << 24
            | (self.0[3] as u64) << 16
            | (self.0[4] as u64) << 8
            | (self.0[5] as u64)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') { ':' } else { '-' };

        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != 6 {
            return Err(ParseError::InvalidMacAddress(s.to_string()));
        }

        let mut octets = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(ParseError::InvalidMacAddress(s.to_string()));
            }
            octets[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidMacAddress(s.to_string()))?;
        }

        Ok(MacAddress(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_and_display() {
        let mac: MacAddress = "00:01:02:03:04:05".parse().unwrap();
        assert_eq!(mac.octets(), [0x00, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(mac.to_string(), "00:01:02:03:04:05");

        let hyphen: MacAddress = "00-01-02-03-04-05".parse().unwrap();
        assert_eq!(mac, hyphen);
    }

    #[test]
    fn test_slow_protocols_da_is_multicast() {
        assert!(MacAddress::SLOW_PROTOCOLS.is_multicast());
        assert!(MacAddress::NEAREST_NON_TPMR_BRIDGE.is_multicast());
        assert!(!MacAddress::ZERO.is_multicast());
    }

    #[test]
    fn test_ordering_matches_numeric_value() {
        let low: MacAddress = "00:00:00:00:00:01".parse().unwrap();
        let high: MacAddress = "00:00:00:00:01:00".parse().unwrap();
        assert!(low < high);
        assert!(low.as_u64() < high.as_u64());
    }

    #[test]
    fn test_invalid_formats() {
        assert!("".parse::<MacAddress>().is_err());
        assert!("00:01:02:03:04".parse::<MacAddress>().is_err());
        assert!("00:01:02:03:04:05:06".parse::<MacAddress>().is_err());
        assert!("zz:01:02:03:04:05".parse::<MacAddress>().is_err());
        assert!("0:1:2:3:4:5".parse::<MacAddress>().is_err());
    }
}
