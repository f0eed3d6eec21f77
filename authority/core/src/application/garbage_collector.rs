// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Certificate Garbage Collector - periodic sweep of expired records
//!
//! Runs [`CertifierService::collect_garbage`] every `interval` with the
//! configured grace period until its cancellation token fires. A failed
//! sweep is logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::certifier::CertifierService;

#[derive(Debug, Clone)]
pub struct GarbageCollectorConfig {
    pub interval: Duration,
    pub grace_period: Duration,
    pub enabled: bool,
}

pub struct CertificateGarbageCollector {
    certifier: Arc<dyn CertifierService>,
    config: GarbageCollectorConfig,
    shutdown_token: CancellationToken,
}

impl CertificateGarbageCollector {
    pub fn new(certifier: Arc<dyn CertifierService>, config: GarbageCollectorConfig) -> Self {
        Self {
            certifier,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled || self.config.interval.is_zero() {
            info!("Certificate garbage collector is disabled");
            return;
        }

        info!(
            interval = ?self.config.interval,
            grace_period = ?self.config.grace_period,
            "Starting certificate garbage collector"
        );

        let mut tick = interval(self.config.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running certificate garbage collection");
                    match self.certifier.collect_garbage(self.config.grace_period).await {
                        Ok(collected) => debug!(collected, "Garbage collection tick complete"),
                        Err(e) => warn!("Certificate garbage collection failed: {}", e),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Certificate garbage collector shutting down");
                    break;
                }
            }
        }
    }
}
