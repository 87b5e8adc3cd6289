//! slotgridd — the SlotGrid daemon.
//!
//! Single binary that assembles the SlotGrid subsystems:
//! - Ledger store (redb)
//! - Autoscaler (desired agent count on every tick)
//! - REST API + Prometheus metrics
//!
//! # Usage
//!
//! ```text
//! slotgridd run --config /etc/slotgrid/slotgrid.toml
//! slotgridd compute --snapshot ledger.json --slots-per-agent 8
//! ```

mod compute;
mod config;
mod standalone;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::SlotgridConfig;

#[derive(Parser)]
#[command(name = "slotgridd", about = "SlotGrid capacity daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon (store, autoscaler loop, API in one process).
    Run {
        /// Path to slotgrid.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on. Overrides the config file.
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state. Overrides the config file.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Compute the desired agent count for a JSON ledger snapshot and exit.
    Compute {
        /// JSON file with `tasks` and `groups` arrays.
        #[arg(long)]
        snapshot: PathBuf,

        /// Path to slotgrid.toml for agent settings.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Slots per agent. Overrides the config file.
        #[arg(long, allow_negative_numbers = true)]
        slots_per_agent: Option<i32>,

        /// Cluster scale bound. Overrides the config file.
        #[arg(long, allow_negative_numbers = true)]
        scale_bound: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,slotgridd=debug,slotgrid=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            port,
            data_dir,
        } => {
            let mut config = SlotgridConfig::load(config.as_deref())?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            standalone::run_standalone(config).await
        }
        Command::Compute {
            snapshot,
            config,
            slots_per_agent,
            scale_bound,
        } => {
            let mut settings = SlotgridConfig::load(config.as_deref())?.autoscale.settings();
            if let Some(slots_per_agent) = slots_per_agent {
                settings.slots_per_agent = slots_per_agent;
            }
            if let Some(scale_bound) = scale_bound {
                settings.scale_bound = scale_bound;
            }
            compute::run_compute(&snapshot, settings)
        }
    }
}
