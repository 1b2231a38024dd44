//! Aggregator state shared by its member ports.

use serde::{Deserialize, Serialize};
use sonic_lacp_types::{MacAddress, PortProperties, SystemId};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Selection status of a port with respect to its aggregator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Selection {
    #[default]
    Unselected,
    Standby,
    Selected,
}

/// LACP-negotiated or statically configured aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorType {
    Lacp,
    Static,
}

/// One aggregator: immutable identity plus the mutable state its members
/// coordinate through.
///
/// The mutex guards exactly one selection or ready-evaluation pass at a
/// time; it is never held across an inbox send.
#[derive(Debug)]
pub struct Aggregator {
    pub id: u32,
    pub name: String,
    pub mac: MacAddress,
    pub actor_admin_key: u16,
    pub agg_type: AggregatorType,
    pub min_links: u16,
    pub state: Mutex<AggState>,
}

impl Aggregator {
    pub fn new(
        id: u32,
        name: String,
        mac: MacAddress,
        actor_admin_key: u16,
        agg_type: AggregatorType,
        min_links: u16,
    ) -> Self {
        Aggregator {
            id,
            name,
            mac,
            actor_admin_key,
            agg_type,
            min_links,
            state: Mutex::new(AggState::new(actor_admin_key)),
        }
    }
}

/// Mutable aggregator state.
#[derive(Debug, Clone)]
pub struct AggState {
    /// Operational key; follows the admin key.
    pub oper_key: u16,
    /// Partner system learned from the selected membership.
    pub partner_system: SystemId,
    pub partner_oper_key: u16,
    /// Link attributes of the reference member; joining ports must match.
    pub oper_properties: Option<PortProperties>,
    /// Member ports by port number.
    pub members: BTreeMap<u16, MemberState>,
    /// True once every selected member has finished its wait_while.
    pub ready: bool,
}

/// Per-member bookkeeping inside an aggregator.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberState {
    pub selection: Selection,
    pub ready_n: bool,
    pub attached: bool,
}

impl AggState {
    pub fn new(oper_key: u16) -> Self {
        AggState {
            oper_key,
            partner_system: SystemId::ZERO,
            partner_oper_key: 0,
            oper_properties: None,
            members: BTreeMap::new(),
            ready: false,
        }
    }

    /// The membership list, selected and standby alike.
    pub fn port_list(&self) -> Vec<u16> {
        self.members.keys().copied().collect()
    }

    pub fn selected_count(&self) -> usize {
        self.members
            .values()
            .filter(|m| m.selection == Selection::Selected)
            .count()
    }

    /// Ready means: there is a selected membership and every selected
    /// member's wait_while has run out.
    pub fn compute_ready(&self) -> bool {
        let mut any = false;
        for member in self.members.values() {
            if member.selection == Selection::Selected {
                any = true;
                if !member.ready_n {
                    return false;
                }
            }
        }
        any
    }

    /// Ready as seen by a port about to join: computed over the *other*
    /// selected members, which is what lets a late joiner skip its wait
    /// when everyone else has already converged. Takes the member map
    /// rather than `&self` because the selection pass evaluates the
    /// pre-pass membership while it is rebuilding `members` in place.
    pub fn ready_excluding(members: &BTreeMap<u16, MemberState>, port: u16) -> bool {
        let mut any = false;
        for (&number, member) in members {
            if number == port {
                continue;
            }
            if member.selection == Selection::Selected {
                any = true;
                if !member.ready_n {
                    return false;
                }
            }
        }
        any
    }

    /// Forgets the partner when the last member leaves.
    pub fn clear_if_empty(&mut self) {
        if self.members.is_empty() {
            self.partner_system = SystemId::ZERO;
            self.partner_oper_key = 0;
            self.oper_properties = None;
            self.ready = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(selection: Selection, ready_n: bool) -> MemberState {
        MemberState {
            selection,
            ready_n,
            attached: false,
        }
    }

    #[test]
    fn test_ready_requires_all_selected_members() {
        let mut state = AggState::new(50);
        assert!(!state.compute_ready());

        state.members.insert(1, member(Selection::Selected, true));
        state.members.insert(2, member(Selection::Selected, false));
        assert!(!state.compute_ready());

        state.members.get_mut(&2).unwrap().ready_n = true;
        assert!(state.compute_ready());
    }

    #[test]
    fn test_standby_members_do_not_gate_ready() {
        let mut state = AggState::new(50);
        state.members.insert(1, member(Selection::Selected, true));
        state.members.insert(2, member(Selection::Standby, false));
        assert!(state.compute_ready());
    }

    #[test]
    fn test_ready_excluding_joiner() {
        let mut state = AggState::new(50);
        state.members.insert(1, member(Selection::Selected, true));
        state.members.insert(2, member(Selection::Selected, true));
        state.members.insert(3, member(Selection::Selected, false));

        // port 3 is the joiner: everyone else is converged
        assert!(AggState::ready_excluding(&state.members, 3));
        assert!(!AggState::ready_excluding(&state.members, 1));
        // an empty remainder is not ready
        let mut lone = AggState::new(50);
        lone.members.insert(1, member(Selection::Selected, false));
        assert!(!AggState::ready_excluding(&lone.members, 1));
    }

    #[test]
    fn test_clear_if_empty() {
        let mut state = AggState::new(50);
        state.partner_system = SystemId::new(1, MacAddress::new([0, 0, 0, 0, 0, 9]));
        state.members.insert(1, member(Selection::Selected, true));
        state.clear_if_empty();
        assert!(!state.partner_system.is_zero());

        state.members.clear();
        state.clear_if_empty();
        assert!(state.partner_system.is_zero());
    }
}
