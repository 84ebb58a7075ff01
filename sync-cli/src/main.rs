//! # roomsync-cli
//!
//! CLI tool for exercising roomsync without a game.
//!
//! ## Commands
//!
//! - `simulate`: Run several peers on an in-process hub and check convergence
//! - `config`: Show the effective provider configuration
//!
//! ## Example
//!
//! ```bash
//! # Four peers, 500 placements, then a late joiner
//! roomsync simulate --peers 4 --placements 500 --late-joiner
//!
//! # Tuning from a file
//! roomsync simulate --config roomsync.toml
//! roomsync config --config roomsync.toml
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod grid;

use commands::{show_config, simulate};

/// CLI tool for exercising roomsync.
#[derive(Parser, Debug)]
#[command(name = "roomsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file with `[room]` and `[tuning]` tables
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run peers on an in-process hub and check that they converge
    Simulate {
        /// Peers present from the start
        #[arg(long, default_value = "3")]
        peers: usize,

        /// Placements made by the first peer
        #[arg(long, default_value = "200")]
        placements: usize,

        /// Add a peer after the edits and check it catches up
        #[arg(long)]
        late_joiner: bool,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            peers,
            placements,
            late_joiner,
        } => {
            let config = config::load(cli.config.as_deref())?;
            let options = simulate::SimulateOptions {
                peers,
                placements,
                late_joiner,
            };
            simulate::run(config, options).await?;
        }
        Commands::Config => {
            show_config::run(cli.config.as_deref())?;
        }
    }

    Ok(())
}
