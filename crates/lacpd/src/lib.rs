//! lacpd - link aggregation control plane for SONiC.
//!
//! Implements IEEE 802.1AX-2014 LACP (per-port Receive, Periodic, Mux,
//! Churn and Transmit machines with shared selection logic) and the DRCP
//! distributed-portal extension, on top of:
//!
//! - `sonic-lacp-types`: domain primitives
//! - `sonic-lacp-pdu`: the Slow Protocols wire codec
//! - `sonic-lacp-sai`: the ASIC adaptor boundary
//!
//! Every port runs as one actor task owning its machines; aggregator-level
//! coordination (selection, the ready gate) goes through per-aggregator
//! mutexes; everything an outside reader sees is a copy-on-read snapshot.

pub mod aggregator;
pub mod config;
pub mod drcp;
pub mod error;
pub mod event;
pub mod fsm;
pub mod machines;
pub mod port;
pub mod registry;
pub mod selection;
pub mod sim;
pub mod snapshot;
pub mod system;
pub mod tables;
pub mod timers;

pub use aggregator::{Aggregator, AggregatorType, Selection};
pub use config::{AggPortConfig, AggregatorConfig};
pub use drcp::{DistributedRelayConfig, DrOperView};
pub use error::{ConfigError, ConfigResult};
pub use snapshot::{AggregatorOperView, PortCounters, PortSnapshot};
pub use system::{FrameIo, LacpSystem, NullFrameIo};
