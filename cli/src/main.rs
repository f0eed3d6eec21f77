// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Sentinel Authority CLI
//!
//! The `sentinel` binary runs the trust and authorization authority: the
//! certificate authority, the operator ACL store and the authorizing
//! administrative API.
//!
//! ## Commands
//!
//! - `sentinel serve` - Run the authority daemon
//! - `sentinel config show|validate|generate` - Configuration management
//! - `sentinel gc` - One-shot expired certificate sweep

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use sentinel::commands::{self, ConfigCommand, GcCommand};
use sentinel::daemon;
use sentinel::logging::init_logging;
use sentinel_core::domain::authority_config::AuthorityConfigManifest;

/// Sentinel - certificate authority and access control for operators
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SENTINEL_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(long, global = true, env = "SENTINEL_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the authority daemon
    #[command(name = "serve")]
    Serve,

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Delete certificate records past expiry plus grace period
    #[command(name = "gc")]
    Gc {
        #[command(flatten)]
        command: GcCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file must not prevent `config validate` from reporting it.
    let loaded = AuthorityConfigManifest::load_or_default(cli.config.clone());
    let logging = loaded
        .as_ref()
        .map(|c| c.spec.observability.logging.clone())
        .unwrap_or_default();
    let level = cli.log_level.clone().unwrap_or(logging.level);
    init_logging(&level, &logging.format)?;

    match cli.command {
        Commands::Serve => {
            info!("Starting Sentinel authority");
            daemon::start_daemon(loaded?).await
        }
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
        Commands::Gc { command } => commands::gc::execute(command, cli.config).await,
    }
}
