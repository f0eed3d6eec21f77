// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! One-shot certificate garbage collection against the configured store.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sentinel_core::application::repository_factory::{
    create_certificate_repository, create_key_value_store,
};
use sentinel_core::application::{CertifierService, StandardCertifierService};
use sentinel_core::domain::authority_config::AuthorityConfigManifest;
use sentinel_core::domain::clock::SystemClock;
use sentinel_core::infrastructure::EventBus;

#[derive(Args)]
pub struct GcCommand {
    /// Keep records this long past expiry (e.g. "12h"). Defaults to the configured grace period.
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    pub grace_period: Option<Duration>,
}

pub async fn execute(command: GcCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = AuthorityConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    let grace_period = command
        .grace_period
        .unwrap_or(config.spec.certificates.garbage_collection.grace_period);

    let store = create_key_value_store(&config.spec.storage.to_backend()?).await?;
    // Sweeping needs no CA key material.
    let certifier = StandardCertifierService::new(
        create_certificate_repository(store),
        Vec::new(),
        Arc::new(SystemClock),
        EventBus::with_default_capacity(),
        config.spec.certificates.serial_number_trials,
    );

    let collected = certifier
        .collect_garbage(grace_period)
        .await
        .context("Garbage collection failed")?;

    println!(
        "{}",
        format!(
            "✓ Collected {} expired certificate(s) (grace period {})",
            collected,
            humantime_serde::re::humantime::format_duration(grace_period)
        )
        .green()
    );

    Ok(())
}
