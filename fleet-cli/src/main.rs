//! # fleetctl
//!
//! Drive a fleet controller by hand.
//!
//! ## Commands
//!
//! - `check`: Configure the selected backend, list what it provides, shut down
//! - `simulate`: Run simulated fleets until Ctrl-C
//! - `bootstrap`: Install the management agent on every external target
//!
//! ## Example
//!
//! ```bash
//! # Verify the lab cluster is clean
//! fleetctl --config lab.toml check --servers 3
//!
//! # Two simulated clusters of four servers each
//! fleetctl simulate --servers 4 --clusters 2
//!
//! # Point every lab host at a salt master
//! fleetctl --config lab.toml bootstrap --master salt.example.com
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use fleet_control::{AgentAddress, ClusterShape, Config};

mod commands;

use commands::{bootstrap, check, simulate};

/// Drive a fleet controller by hand.
#[derive(Parser, Debug)]
#[command(name = "fleetctl")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults apply if it does not exist)
    #[arg(long, global = true, default_value = "fleet.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configure the selected backend, print its clusters, then shut down
    Check {
        /// Servers per cluster
        #[arg(long, default_value = "3")]
        servers: usize,

        /// Number of clusters
        #[arg(long, default_value = "1")]
        clusters: usize,
    },

    /// Run simulated fleets until interrupted
    Simulate {
        /// Servers per cluster
        #[arg(long)]
        servers: usize,

        /// Number of clusters
        #[arg(long, default_value = "1")]
        clusters: usize,
    },

    /// Install the management agent on every external target
    Bootstrap {
        /// Address of the management master
        #[arg(long)]
        master: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Check { servers, clusters } => {
            check::run(&config, ClusterShape::new(servers).clusters(clusters)).await?;
        }
        Commands::Simulate { servers, clusters } => {
            let shape = ClusterShape::new(servers).clusters(clusters);
            simulate::run(&config, shape, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                }
            })
            .await?;
        }
        Commands::Bootstrap { master } => {
            let master = AgentAddress::new(master).context("Invalid master address")?;
            bootstrap::run(&config, &master).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load `path`, falling back to defaults when the file is absent.
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("{} not found, using defaults", path.display());
        return Ok(Config::default());
    }
    Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}
