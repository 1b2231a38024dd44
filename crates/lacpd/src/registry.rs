//! System registries: aggregators by id/name/key, ports by number.
//!
//! One read-write lock guards all four indexes; no caller holds it across
//! an await or a channel send. Aggregator mutable state lives behind its
//! own per-aggregator mutex (see [`crate::aggregator`]).

use crate::aggregator::{Aggregator, Selection};
use crate::error::{ConfigError, ConfigResult};
use crate::event::PortEvent;
use crate::snapshot::PortSnapshot;
use sonic_lacp_types::{PortIdentity, PortProperties, SystemId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Selection-relevant facts about a port, mirrored out of the owning actor
/// so a selection pass can read every port without touching live state.
#[derive(Debug, Clone, Copy)]
pub struct PortRecord {
    pub number: u16,
    pub actor_port: PortIdentity,
    pub actor_admin_key: u16,
    pub actor_oper_key: u16,
    pub aggregatable: bool,
    pub partner_system: SystemId,
    pub partner_oper_key: u16,
    pub partner_port_number: u16,
    pub partner_aggregatable: bool,
    pub enabled: bool,
    pub lacp_enabled: bool,
    pub properties: PortProperties,
    pub selection: Selection,
    pub agg_id: u32,
}

/// Handle for delivering events to a port actor and reading its snapshot.
#[derive(Debug, Clone)]
pub struct PortHandle {
    pub number: u16,
    pub events: mpsc::UnboundedSender<PortEvent>,
    pub snapshot: watch::Receiver<PortSnapshot>,
}

impl PortHandle {
    /// Enqueues an event; a dead actor only logs, the caller never blocks.
    pub fn send(&self, event: PortEvent) {
        if self.events.send(event).is_err() {
            warn!(port = self.number, "event for stopped port actor dropped");
        }
    }
}

#[derive(Debug)]
struct PortEntry {
    handle: PortHandle,
    record: PortRecord,
}

#[derive(Default)]
struct Inner {
    aggs: HashMap<u32, Arc<Aggregator>>,
    agg_by_name: HashMap<String, u32>,
    agg_by_key: HashMap<u16, u32>,
    ports: HashMap<u16, PortEntry>,
}

/// The per-system registry.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Atomically checks the three aggregator indexes and inserts.
    pub fn insert_aggregator(&self, agg: Aggregator) -> ConfigResult<Arc<Aggregator>> {
        let mut inner = self.inner.write().unwrap();
        if inner.aggs.contains_key(&agg.id) {
            return Err(ConfigError::DuplicateAggregatorId(agg.id));
        }
        if inner.agg_by_name.contains_key(&agg.name) {
            return Err(ConfigError::DuplicateAggregatorName(agg.name.clone()));
        }
        if inner.agg_by_key.contains_key(&agg.actor_admin_key) {
            return Err(ConfigError::DuplicateAggregatorKey(agg.actor_admin_key));
        }
        let agg = Arc::new(agg);
        inner.agg_by_name.insert(agg.name.clone(), agg.id);
        inner.agg_by_key.insert(agg.actor_admin_key, agg.id);
        inner.aggs.insert(agg.id, agg.clone());
        Ok(agg)
    }

    pub fn remove_aggregator(&self, id: u32) -> ConfigResult<Arc<Aggregator>> {
        let mut inner = self.inner.write().unwrap();
        let agg = inner
            .aggs
            .remove(&id)
            .ok_or(ConfigError::UnknownAggregator(id))?;
        inner.agg_by_name.remove(&agg.name);
        inner.agg_by_key.remove(&agg.actor_admin_key);
        Ok(agg)
    }

    pub fn aggregator(&self, id: u32) -> Option<Arc<Aggregator>> {
        self.inner.read().unwrap().aggs.get(&id).cloned()
    }

    pub fn aggregator_by_name(&self, name: &str) -> Option<Arc<Aggregator>> {
        let inner = self.inner.read().unwrap();
        let id = inner.agg_by_name.get(name)?;
        inner.aggs.get(id).cloned()
    }

    /// The candidate aggregator for an actor key; ties broken by lowest id.
    pub fn aggregator_by_key(&self, key: u16) -> Option<Arc<Aggregator>> {
        let inner = self.inner.read().unwrap();
        inner
            .aggs
            .values()
            .filter(|a| a.actor_admin_key == key)
            .min_by_key(|a| a.id)
            .cloned()
    }

    pub fn aggregator_ids(&self) -> Vec<u32> {
        self.inner.read().unwrap().aggs.keys().copied().collect()
    }

    pub fn aggregator_count(&self) -> usize {
        self.inner.read().unwrap().aggs.len()
    }

    pub fn insert_port(&self, handle: PortHandle, record: PortRecord) -> ConfigResult<()> {
        let mut inner = self.inner.write().unwrap();
        if inner.ports.contains_key(&handle.number) {
            return Err(ConfigError::DuplicatePort(handle.number));
        }
        inner
            .ports
            .insert(handle.number, PortEntry { handle, record });
        Ok(())
    }

    pub fn remove_port(&self, number: u16) -> ConfigResult<PortHandle> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .ports
            .remove(&number)
            .ok_or(ConfigError::UnknownPort(number))?;
        Ok(entry.handle)
    }

    pub fn port_handle(&self, number: u16) -> Option<PortHandle> {
        self.inner
            .read()
            .unwrap()
            .ports
            .get(&number)
            .map(|e| e.handle.clone())
    }

    pub fn port_count(&self) -> usize {
        self.inner.read().unwrap().ports.len()
    }

    pub fn port_numbers(&self) -> Vec<u16> {
        self.inner.read().unwrap().ports.keys().copied().collect()
    }

    pub fn record(&self, number: u16) -> Option<PortRecord> {
        self.inner
            .read()
            .unwrap()
            .ports
            .get(&number)
            .map(|e| e.record)
    }

    pub fn records(&self) -> Vec<PortRecord> {
        self.inner
            .read()
            .unwrap()
            .ports
            .values()
            .map(|e| e.record)
            .collect()
    }

    /// Replaces a port's mirrored record; only the owning actor and the
    /// selection pass write here.
    pub fn update_record(&self, record: PortRecord) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.ports.get_mut(&record.number) {
            entry.record = record;
        }
    }

    /// Updates only the selection verdict fields of a record.
    pub fn update_selection(&self, number: u16, selection: Selection, agg_id: u32) {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.ports.get_mut(&number) {
            entry.record.selection = selection;
            entry.record.agg_id = agg_id;
        }
    }

    /// Sends an event to a port if it still exists.
    pub fn send_to_port(&self, number: u16, event: PortEvent) {
        let handle = self.port_handle(number);
        if let Some(handle) = handle {
            handle.send(event);
        }
    }

    /// Another port that has recorded the same partner port: the partner
    /// "moved" and the stale port must re-initialize.
    pub fn find_port_with_partner(
        &self,
        exclude: u16,
        partner_system: SystemId,
        partner_port: u16,
    ) -> Option<u16> {
        let inner = self.inner.read().unwrap();
        inner
            .ports
            .values()
            .filter(|e| e.record.number != exclude)
            .filter(|e| {
                e.record.partner_system == partner_system
                    && e.record.partner_port_number == partner_port
                    && e.record.selection != Selection::Unselected
            })
            .map(|e| e.record.number)
            .next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorType;
    use sonic_lacp_types::MacAddress;

    fn agg(id: u32, name: &str, key: u16) -> Aggregator {
        Aggregator::new(
            id,
            name.to_string(),
            MacAddress::ZERO,
            key,
            AggregatorType::Lacp,
            0,
        )
    }

    #[test]
    fn test_duplicate_aggregator_checks() {
        let registry = Registry::new();
        registry.insert_aggregator(agg(1, "PortChannel001", 50)).unwrap();

        assert_eq!(
            registry.insert_aggregator(agg(1, "PortChannel002", 51)).unwrap_err(),
            ConfigError::DuplicateAggregatorId(1)
        );
        assert_eq!(
            registry.insert_aggregator(agg(2, "PortChannel001", 51)).unwrap_err(),
            ConfigError::DuplicateAggregatorName("PortChannel001".to_string())
        );
        assert_eq!(
            registry.insert_aggregator(agg(2, "PortChannel002", 50)).unwrap_err(),
            ConfigError::DuplicateAggregatorKey(50)
        );
        assert_eq!(registry.aggregator_count(), 1);
    }

    #[test]
    fn test_key_lookup_prefers_lowest_id() {
        let registry = Registry::new();
        registry.insert_aggregator(agg(7, "PortChannel007", 50)).unwrap();
        // same admin key cannot be inserted twice, so key lookup is unique;
        // the tie-break matters for id ordering of the filter
        let found = registry.aggregator_by_key(50).unwrap();
        assert_eq!(found.id, 7);
        assert!(registry.aggregator_by_key(99).is_none());
    }

    #[test]
    fn test_remove_aggregator_clears_all_indexes() {
        let registry = Registry::new();
        registry.insert_aggregator(agg(1, "PortChannel001", 50)).unwrap();
        registry.remove_aggregator(1).unwrap();

        assert_eq!(registry.aggregator_count(), 0);
        assert!(registry.aggregator_by_name("PortChannel001").is_none());
        assert!(registry.aggregator_by_key(50).is_none());
        // a second insert with the same identity must now succeed
        registry.insert_aggregator(agg(1, "PortChannel001", 50)).unwrap();
    }
}
