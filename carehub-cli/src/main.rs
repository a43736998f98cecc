use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use carehub_sync::connectivity::probe;
use carehub_sync::{CareHub, DeletePolicy, NetworkStatus, SyncConfig};

mod commands;
mod output;

use commands::Command;
use output::Printer;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// CareHub offline-first records and medication orders
#[derive(Parser, Debug)]
#[command(name = "carehub", version)]
#[command(about = "Manage CareHub records on this device and replay offline changes")]
struct Args {
    /// Writable data directory (overrides CAREHUB_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory with bundled seed templates (overrides CAREHUB_SEED_DIR)
    #[arg(long)]
    seed_dir: Option<PathBuf>,

    /// Remote authority base URL (overrides CAREHUB_API_BASE_URL)
    #[arg(long)]
    api: Option<String>,

    /// Delete handling: local_only, suppress_pending_create or queue_delete
    #[arg(long)]
    delete_policy: Option<DeletePolicy>,

    /// Operator name stamped into order audit fields
    #[arg(long)]
    operator: Option<String>,

    /// Skip the connectivity probe and work from local data only
    #[arg(long)]
    offline: bool,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn apply(&self, config: &mut SyncConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.seed_dir {
            config.seed_dir = Some(dir.clone());
        }
        if let Some(api) = &self.api {
            config.api_base_url = api.clone();
        }
        if let Some(policy) = self.delete_policy {
            config.delete_policy = policy;
        }
        if let Some(operator) = &self.operator {
            config.operator = operator.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(args.verbose)?;

    let mut config = SyncConfig::from_env().context("Invalid CAREHUB_* environment")?;
    args.apply(&mut config);

    let online = if args.offline {
        false
    } else {
        probe(&config.api_base_url, PROBE_TIMEOUT).await
    };
    info!(online, api_base_url = %config.api_base_url, "Connectivity checked");

    let hub = CareHub::open(config, Arc::new(NetworkStatus::new(online)))
        .context("Failed to open CareHub data")?;

    commands::run(&hub, args.command, &Printer::new(args.json)).await
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    // Check if we're in development or production
    let is_production = env::var("CAREHUB_ENV").map_or(false, |v| v == "production");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("carehub_sync={},carehub={},reqwest=warn", level, level).into());

    if is_production {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(io::stderr),
            )
            .try_init()?;
    }

    Ok(())
}
