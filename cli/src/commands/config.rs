// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use sentinel_core::domain::authority_config::AuthorityConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./sentinel-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = AuthorityConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SENTINEL_CONFIG_PATH: {}",
            std::env::var("SENTINEL_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./sentinel-config.yaml");
        println!("  4. ~/.sentinel/config.yaml");
        println!("  5. /etc/sentinel/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();
    println!("  Node: {}", config.metadata.name);
    println!();

    println!("{}", "Certificate Authorities:".bold());
    for ca in &spec.certificate_authorities {
        println!("  {}", ca.category.bold());
        println!("    Certificate: {}", ca.cert_path.display());
        println!("    Key: {}", ca.key_path.display());
    }
    println!();

    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", spec.storage.backend);
    if spec.storage.connection_string.is_some() {
        println!("  Connection string: {}", "(set)".dimmed());
    }
    println!();

    let gc = &spec.certificates.garbage_collection;
    println!("{}", "Certificates:".bold());
    println!("  Serial number trials: {}", spec.certificates.serial_number_trials);
    println!(
        "  Garbage collection: {} (interval {}, grace {})",
        if gc.enabled { "enabled" } else { "disabled" },
        humantime_serde::re::humantime::format_duration(gc.interval),
        humantime_serde::re::humantime::format_duration(gc.grace_period)
    );
    println!();

    println!("{}", "Authorization:".bold());
    println!("  Serial header: {}", spec.authorization.client_cert_serial_header);
    println!(
        "  Static prefixes: {}",
        spec.authorization.static_path_prefixes.join(", ")
    );
    println!();

    println!("{}", "Network:".bold());
    println!("  Listen: {}:{}", spec.network.bind_address, spec.network.port);
    if spec.observability.metrics.enabled {
        println!("  Metrics: 0.0.0.0:{}", spec.observability.metrics.port);
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = AuthorityConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    if output.exists() {
        anyhow::bail!("Refusing to overwrite existing file {}", output.display());
    }

    AuthorityConfigManifest::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
