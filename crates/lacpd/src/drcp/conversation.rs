//! Conversation id administration: which portal system gateways which
//! conversation, and the digests both portal systems compare.

use md5::{Digest, Md5};
use sonic_lacp_types::{ConversationId, ConversationMask, MAX_CONVERSATION_IDS};

/// The administered conversation -> portal-system assignment.
///
/// Each conversation id carries an ordered preference list of portal
/// system numbers; the first entry is the active gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationAdminMap {
    assignments: Vec<Vec<u8>>,
}

impl ConversationAdminMap {
    pub fn empty() -> Self {
        ConversationAdminMap {
            assignments: vec![Vec::new(); MAX_CONVERSATION_IDS],
        }
    }

    /// The default VID time-sharing split for a two-system portal: odd
    /// VIDs gateway at portal system 1, even VIDs at portal system 2.
    /// Conversation 0 is not a VLAN and stays unassigned.
    pub fn vid_time_sharing() -> Self {
        let mut map = Self::empty();
        for vid in 1..MAX_CONVERSATION_IDS as u16 {
            let system = if vid % 2 == 1 { 1 } else { 2 };
            map.assignments[vid as usize] = vec![system];
        }
        map
    }

    pub fn assign(&mut self, id: ConversationId, systems: Vec<u8>) {
        self.assignments[id.index()] = systems;
    }

    pub fn assignment(&self, id: ConversationId) -> &[u8] {
        &self.assignments[id.index()]
    }

    /// Conversations whose active gateway is `system_number`.
    pub fn mask_for(&self, system_number: u8) -> ConversationMask {
        let mut mask = ConversationMask::default();
        for (index, systems) in self.assignments.iter().enumerate() {
            if systems.first() == Some(&system_number) {
                if let Ok(id) = ConversationId::new(index as u16) {
                    mask.insert(id);
                }
            }
        }
        mask
    }

    /// MD5 over the canonical encoding of the assignment: for every
    /// conversation id ascending, the id (big-endian), the list length,
    /// and the portal system numbers. Two portal systems agree on their
    /// conversation administration exactly when these digests match.
    pub fn digest(&self) -> [u8; 16] {
        let mut hasher = Md5::new();
        for (index, systems) in self.assignments.iter().enumerate() {
            hasher.update((index as u16).to_be_bytes());
            hasher.update([systems.len() as u8]);
            hasher.update(systems.as_slice());
        }
        hasher.finalize().into()
    }
}
