// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon HTTP server implementation

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use sentinel_core::{
    application::{
        entity_resolver::EntityResolverRegistry,
        repository_factory::{
            create_access_control_repository, create_certificate_repository,
            create_key_value_store,
        },
        CertificateGarbageCollector, GarbageCollectorConfig, StandardAccessControlService,
        StandardAuthorizationService, StandardCertifierService,
    },
    domain::{
        authority_config::AuthorityConfigManifest, certificate::CaCategory, clock::SystemClock,
    },
    infrastructure::{event_bus::EventBusError, pki::CertificateAuthority, EventBus},
    presentation::{app, AppState, AuthorizationLayerState},
};

use super::shutdown_signal;

/// Loads every configured CA root. Any unreadable or mismatched key material
/// aborts start-up.
pub fn load_authorities(config: &AuthorityConfigManifest) -> Result<Vec<CertificateAuthority>> {
    config
        .spec
        .certificate_authorities
        .iter()
        .map(|ca| {
            let category = CaCategory::new(ca.category.as_str())
                .with_context(|| format!("Invalid CA category '{}'", ca.category))?;
            let authority = CertificateAuthority::load(category, &ca.cert_path, &ca.key_path)?;
            info!(
                category = %authority.category(),
                not_after = %authority.not_after(),
                "Loaded certificate authority"
            );
            Ok(authority)
        })
        .collect()
}

pub async fn start_daemon(config: AuthorityConfigManifest) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;

    info!("Sentinel authority starting: node={}", config.metadata.name);

    let metrics_config = &config.spec.observability.metrics;
    if metrics_config.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], metrics_config.port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    // Initialize services
    let backend = config.spec.storage.to_backend()?;
    let store = create_key_value_store(&backend).await?;
    let authorities = load_authorities(&config)?;
    let clock = Arc::new(SystemClock);
    let event_bus = EventBus::with_default_capacity();

    let certifier = Arc::new(StandardCertifierService::new(
        create_certificate_repository(store.clone()),
        authorities,
        clock.clone(),
        event_bus.clone(),
        config.spec.certificates.serial_number_trials,
    ));
    let access_control = Arc::new(StandardAccessControlService::new(
        create_access_control_repository(store),
        clock.clone(),
        event_bus.clone(),
    ));
    let authorization = Arc::new(StandardAuthorizationService::new(
        certifier.clone(),
        access_control.clone(),
        EntityResolverRegistry::with_defaults(&config.spec.authorization.static_path_prefixes),
        clock,
        event_bus.clone(),
    ));

    spawn_audit_log(&event_bus);

    let gc_config = &config.spec.certificates.garbage_collection;
    let collector = Arc::new(CertificateGarbageCollector::new(
        certifier.clone(),
        GarbageCollectorConfig {
            interval: gc_config.interval,
            grace_period: gc_config.grace_period,
            enabled: gc_config.enabled,
        },
    ));
    let collector_token = collector.shutdown_token();
    let collector_handle = collector.start();

    let layer = AuthorizationLayerState::new(
        authorization,
        &config.spec.authorization.client_cert_serial_header,
    )
    .context("Invalid client certificate serial header name")?;
    let state = AppState {
        certifier,
        access_control,
        gc_grace_period: gc_config.grace_period,
        start_time: Instant::now(),
    };
    let router = app(state, layer).layer(TraceLayer::new_for_http());

    // Start HTTP server
    let addr = format!(
        "{}:{}",
        config.spec.network.bind_address, config.spec.network.port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Authority listening on {}", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed");

    collector_token.cancel();
    if let Err(e) = collector_handle.await {
        warn!("Garbage collector task ended abnormally: {}", e);
    }

    info!("Authority shutting down");

    served
}

/// Mirrors authority events into the log until the bus closes.
fn spawn_audit_log(event_bus: &EventBus) {
    let mut receiver = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => debug!(kind = event.kind(), event = ?event, "Authority event"),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });
}
