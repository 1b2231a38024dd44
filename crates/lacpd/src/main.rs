//! lacpd daemon entry point.
//!
//! Initializes logging, applies the JSON bootstrap configuration through
//! the same operations the RPC surface uses, and runs until shutdown.
//! Configuration is authoritative: nothing is persisted here, a restart
//! re-applies the file.

use clap::Parser;
use serde::Deserialize;
use sonic_lacpd::{
    AggPortConfig, AggregatorConfig, DistributedRelayConfig, LacpSystem, NullFrameIo,
};
use sonic_lacp_sai::NullSai;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "lacpd", about = "Link aggregation control plane daemon")]
struct Args {
    /// System MAC address (actor identity).
    #[arg(long, default_value = "02:00:00:00:00:01")]
    mac: String,

    /// System priority (lower wins).
    #[arg(long, default_value_t = 32768)]
    priority: u16,

    /// JSON bootstrap configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log verbosity.
    #[arg(long, default_value = "info")]
    log_level: Level,
}

/// The bootstrap configuration file contents.
#[derive(Debug, Default, Deserialize)]
struct BootstrapConfig {
    #[serde(default)]
    aggregators: Vec<AggregatorConfig>,
    #[serde(default)]
    ports: Vec<AggPortConfig>,
    #[serde(default)]
    distributed_relays: Vec<DistributedRelayConfig>,
}

fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn apply_bootstrap(system: &LacpSystem, config: BootstrapConfig) -> Result<(), String> {
    for agg in config.aggregators {
        system
            .create_aggregator(agg.clone())
            .await
            .map_err(|e| format!("aggregator '{}': {e}", agg.name))?;
    }
    for port in config.ports {
        let number = port.number;
        system
            .create_port(port)
            .await
            .map_err(|e| format!("port {number}: {e}"))?;
    }
    for dr in config.distributed_relays {
        let name = dr.name.clone();
        system
            .create_dr(dr)
            .await
            .map_err(|e| format!("distributed relay '{name}': {e}"))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    let mac = match args.mac.parse() {
        Ok(mac) => mac,
        Err(err) => {
            error!("invalid system MAC '{}': {err}", args.mac);
            return ExitCode::FAILURE;
        }
    };

    let system = LacpSystem::new(
        args.priority,
        mac,
        Arc::new(NullSai),
        Arc::new(NullFrameIo),
    );
    info!(system = %system.system_id(), "lacpd starting");

    let bootstrap = match args.config {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(config) => config,
                Err(err) => {
                    error!("config file {}: {err}", path.display());
                    return ExitCode::FAILURE;
                }
            },
            Err(err) => {
                error!("config file {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => BootstrapConfig::default(),
    };

    if let Err(err) = apply_bootstrap(&system, bootstrap).await {
        error!("bootstrap failed: {err}");
        return ExitCode::FAILURE;
    }

    info!("lacpd running; waiting for shutdown signal");
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("signal wait failed: {err}");
        return ExitCode::FAILURE;
    }

    info!("lacpd shutting down");
    ExitCode::SUCCESS
}
