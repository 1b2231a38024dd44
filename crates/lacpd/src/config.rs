//! Configuration operations on a [`LacpSystem`].
//!
//! These are the operations the RPC surface calls. Every operation
//! validates completely before mutating anything: a rejected call leaves
//! all registries exactly as they were.

use crate::aggregator::{Aggregator, AggregatorType, Selection};
use crate::error::{ConfigError, ConfigResult};
use crate::event::{PortEvent, SelectionVerdict};
use crate::port::{spawn_port, PortVars};
use crate::snapshot::{AggregatorOperView, PortSnapshot};
use crate::system::LacpSystem;
use serde::Deserialize;
use sonic_lacp_types::{LacpMode, LacpTimeout, MacAddress, PortProperties};
use tokio::sync::oneshot;
use tracing::info;

/// Parameters for creating an aggregator.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    pub name: String,
    pub id: u32,
    pub mac: MacAddress,
    pub actor_admin_key: u16,
    pub agg_type: AggregatorType,
    #[serde(default)]
    pub min_links: u16,
    /// Ports to pull in at creation; they must carry the same admin key.
    #[serde(default)]
    pub initial_members: Vec<u16>,
}

/// Parameters for creating an aggregation port.
#[derive(Debug, Clone, Deserialize)]
pub struct AggPortConfig {
    pub number: u16,
    #[serde(default = "default_port_priority")]
    pub priority: u16,
    pub actor_admin_key: u16,
    /// Optional sanity reference to an existing aggregator.
    #[serde(default)]
    pub agg_id: Option<u32>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub mode: LacpMode,
    pub timeout: LacpTimeout,
    #[serde(default)]
    pub properties: PortProperties,
}

fn default_port_priority() -> u16 {
    128
}

fn default_true() -> bool {
    true
}

impl LacpSystem {
    /// Creates an aggregator and pulls in any existing ports that carry
    /// its admin key.
    pub async fn create_aggregator(&self, config: AggregatorConfig) -> ConfigResult<()> {
        let agg = Aggregator::new(
            config.id,
            config.name.clone(),
            config.mac,
            config.actor_admin_key,
            config.agg_type,
            config.min_links,
        );
        self.registry().insert_aggregator(agg)?;
        info!(agg = config.id, name = %config.name, "aggregator created");

        // ports created before their aggregator now get a chance to bind
        for record in self.registry().records() {
            if record.actor_oper_key == config.actor_admin_key {
                self.registry()
                    .send_to_port(record.number, PortEvent::Reevaluate);
            }
        }
        for member in config.initial_members {
            self.registry().send_to_port(member, PortEvent::Reevaluate);
        }
        Ok(())
    }

    /// Deletes an aggregator, detaching every member first.
    pub async fn delete_aggregator(&self, id: u32) -> ConfigResult<()> {
        // removing the indexes first keeps a concurrent selection pass
        // from re-binding ports while members detach
        let agg = self.registry().remove_aggregator(id)?;
        let members = agg.state.lock().await.port_list();
        for member in members {
            self.registry()
                .update_selection(member, Selection::Unselected, 0);
            self.registry().send_to_port(
                member,
                PortEvent::Selection(SelectionVerdict {
                    selection: Selection::Unselected,
                    agg_id: 0,
                    agg_ready: false,
                }),
            );
        }
        info!(agg = id, "aggregator deleted");
        Ok(())
    }

    /// Creates a port, starts its machines, and (if enabled) lets it seek
    /// an aggregator.
    pub async fn create_port(&self, config: AggPortConfig) -> ConfigResult<()> {
        if let Some(agg_id) = config.agg_id {
            if self.registry().aggregator(agg_id).is_none() {
                return Err(ConfigError::UnknownAggregator(agg_id));
            }
        }

        let vars = PortVars::new(
            self.system_id(),
            config.number,
            config.priority,
            config.actor_admin_key,
            config.mode,
            config.timeout,
            config.properties,
        );
        let record = vars.to_record();
        let coupled = !self.sai().supports_independent_control();
        let handle = spawn_port(vars, coupled, self.clone());
        // insert before any event so duplicate creation cannot race
        if let Err(err) = self.registry().insert_port(handle.clone(), record) {
            let (ack, _) = oneshot::channel();
            handle.send(PortEvent::Kill(ack));
            return Err(err);
        }

        handle.send(PortEvent::Begin);
        if config.enabled {
            handle.send(PortEvent::PortUp);
        }
        info!(port = config.number, "port created");
        Ok(())
    }

    /// Deletes a port. The port must have been removed from its
    /// aggregator first; the actor is stopped with a barrier.
    pub async fn delete_port(&self, number: u16) -> ConfigResult<()> {
        let record = self
            .registry()
            .record(number)
            .ok_or(ConfigError::UnknownPort(number))?;
        if record.agg_id != 0 {
            return Err(ConfigError::PortStillMember(number));
        }

        let handle = self.registry().remove_port(number)?;
        let (ack_tx, ack_rx) = oneshot::channel();
        handle.send(PortEvent::Kill(ack_tx));
        // barrier: timers are stopped and the task exits before we return
        let _ = ack_rx.await;
        info!(port = number, "port deleted");
        Ok(())
    }

    pub fn enable_port(&self, number: u16) -> ConfigResult<()> {
        self.port_event(number, PortEvent::PortUp)
    }

    pub fn disable_port(&self, number: u16) -> ConfigResult<()> {
        self.port_event(number, PortEvent::PortDown)
    }

    pub fn set_port_lacp_mode(
        &self,
        number: u16,
        mode: LacpMode,
        timeout: Option<LacpTimeout>,
    ) -> ConfigResult<()> {
        self.port_event(number, PortEvent::SetLacpMode { mode, timeout })
    }

    /// Adds a port to an aggregator by aligning its admin key.
    pub async fn add_member(&self, agg_id: u32, number: u16) -> ConfigResult<()> {
        let agg = self
            .registry()
            .aggregator(agg_id)
            .ok_or(ConfigError::UnknownAggregator(agg_id))?;
        let record = self
            .registry()
            .record(number)
            .ok_or(ConfigError::UnknownPort(number))?;
        if record.agg_id == agg_id {
            return Err(ConfigError::AlreadyMember {
                port: number,
                agg_id,
            });
        }

        let handle = self
            .registry()
            .port_handle(number)
            .ok_or(ConfigError::UnknownPort(number))?;
        handle.send(PortEvent::SetAdminKey(agg.actor_admin_key));
        handle.send(PortEvent::SetAggregatable(true));
        Ok(())
    }

    /// Removes a port from an aggregator; the Mux detaches on the way out.
    pub async fn remove_member(&self, agg_id: u32, number: u16) -> ConfigResult<()> {
        self.registry()
            .aggregator(agg_id)
            .ok_or(ConfigError::UnknownAggregator(agg_id))?;
        let record = self
            .registry()
            .record(number)
            .ok_or(ConfigError::UnknownPort(number))?;
        if record.agg_id != agg_id {
            return Err(ConfigError::NotMember {
                port: number,
                agg_id,
            });
        }

        let handle = self
            .registry()
            .port_handle(number)
            .ok_or(ConfigError::UnknownPort(number))?;
        handle.send(PortEvent::SetAggregatable(false));
        handle.send(PortEvent::SetAdminKey(0));
        Ok(())
    }

    /// The current operational view of a port.
    pub fn port_view(&self, number: u16) -> Option<PortSnapshot> {
        self.registry()
            .port_handle(number)
            .map(|h| h.snapshot.borrow().clone())
    }

    /// The current operational view of an aggregator.
    pub async fn aggregator_view(&self, id: u32) -> Option<AggregatorOperView> {
        let agg = self.registry().aggregator(id)?;
        let state = agg.state.lock().await;
        Some(AggregatorOperView {
            id: agg.id,
            name: agg.name.clone(),
            oper_key: state.oper_key,
            partner_system: state.partner_system,
            partner_oper_key: state.partner_oper_key,
            members: state.port_list(),
            selected_members: state
                .members
                .iter()
                .filter(|(_, m)| m.selection == Selection::Selected)
                .map(|(&n, _)| n)
                .collect(),
            ready: state.ready,
            min_links: agg.min_links,
        })
    }

    fn port_event(&self, number: u16, event: PortEvent) -> ConfigResult<()> {
        let handle = self
            .registry()
            .port_handle(number)
            .ok_or(ConfigError::UnknownPort(number))?;
        handle.send(event);
        Ok(())
    }
}
