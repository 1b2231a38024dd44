//! The LACP actor/partner state byte.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The eight-bit actor/partner state field carried in every LACPDU party
/// record (802.1AX-2014 6.4.2.3).
///
/// Bit 0 is LACP_Activity, bit 7 is Expired. The wrapper keeps the raw byte
/// so it can be copied straight into and out of the wire codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LacpState(u8);

impl LacpState {
    pub const ACTIVITY: u8 = 0x01;
    pub const TIMEOUT: u8 = 0x02;
    pub const AGGREGATION: u8 = 0x04;
    pub const SYNC: u8 = 0x08;
    pub const COLLECTING: u8 = 0x10;
    pub const DISTRIBUTING: u8 = 0x20;
    pub const DEFAULTED: u8 = 0x40;
    pub const EXPIRED: u8 = 0x80;

    pub const fn new(bits: u8) -> Self {
        LacpState(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn is_set(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn set(&mut self, bit: u8) {
        self.0 |= bit;
    }

    pub fn clear(&mut self, bit: u8) {
        self.0 &= !bit;
    }

    pub fn assign(&mut self, bit: u8, value: bool) {
        if value {
            self.set(bit);
        } else {
            self.clear(bit);
        }
    }

    pub const fn activity(&self) -> bool {
        self.is_set(Self::ACTIVITY)
    }

    /// True means short timeout (fast rate expected from the partner).
    pub const fn short_timeout(&self) -> bool {
        self.is_set(Self::TIMEOUT)
    }

    pub const fn aggregation(&self) -> bool {
        self.is_set(Self::AGGREGATION)
    }

    pub const fn sync(&self) -> bool {
        self.is_set(Self::SYNC)
    }

    pub const fn collecting(&self) -> bool {
        self.is_set(Self::COLLECTING)
    }

    pub const fn distributing(&self) -> bool {
        self.is_set(Self::DISTRIBUTING)
    }

    pub const fn defaulted(&self) -> bool {
        self.is_set(Self::DEFAULTED)
    }

    pub const fn expired(&self) -> bool {
        self.is_set(Self::EXPIRED)
    }
}

impl From<u8> for LacpState {
    fn from(bits: u8) -> Self {
        LacpState(bits)
    }
}

impl From<LacpState> for u8 {
    fn from(state: LacpState) -> u8 {
        state.0
    }
}

impl fmt::Display for LacpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (Self::ACTIVITY, "Act"),
            (Self::TIMEOUT, "Sht"),
            (Self::AGGREGATION, "Agg"),
            (Self::SYNC, "Syn"),
            (Self::COLLECTING, "Col"),
            (Self::DISTRIBUTING, "Dis"),
            (Self::DEFAULTED, "Def"),
            (Self::EXPIRED, "Exp"),
        ];
        let mut first = true;
        for (bit, name) in flags {
            if self.is_set(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        if first {
            write!(f, "-")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bit_accessors() {
        let mut state = LacpState::default();
        assert!(!state.sync());

        state.set(LacpState::SYNC | LacpState::COLLECTING);
        assert!(state.sync());
        assert!(state.collecting());
        assert!(!state.distributing());

        state.clear(LacpState::SYNC);
        assert!(!state.sync());
        assert!(state.collecting());
    }

    #[test]
    fn test_assign() {
        let mut state = LacpState::default();
        state.assign(LacpState::ACTIVITY, true);
        assert_eq!(state.bits(), 0x01);
        state.assign(LacpState::ACTIVITY, false);
        assert_eq!(state.bits(), 0x00);
    }

    #[test]
    fn test_display() {
        let state = LacpState::new(LacpState::ACTIVITY | LacpState::SYNC);
        assert_eq!(state.to_string(), "Act|Syn");
        assert_eq!(LacpState::default().to_string(), "-");
    }
}
