// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};
use std::sync::Arc;

use sentinel_core::application::entity_resolver::EntityResolverRegistry;
use sentinel_core::application::{
    AuthorizationService, CertifierService, SignCsrRequest, StandardAccessControlService,
    StandardAuthorizationService, StandardCertifierService,
};
use sentinel_core::domain::certificate::CaCategory;
use sentinel_core::domain::clock::ManualClock;
use sentinel_core::domain::identity::Identity;
use sentinel_core::domain::repository::KeyValueStore;
use sentinel_core::infrastructure::pki::CertificateAuthority;
use sentinel_core::infrastructure::repositories::{
    InMemoryKeyValueStore, StoredAccessControlRepository, StoredCertificateRepository,
};
use sentinel_core::infrastructure::EventBus;

pub const SERIAL_HEADER: &str = "x-client-cert-serial";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

pub fn generate_ca(category: &str) -> CertificateAuthority {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
        .distinguished_name
        .push(DnType::CommonName, format!("Sentinel {} CA", category));
    params.not_before = time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
    params.not_after = time::OffsetDateTime::from_unix_timestamp(2_100_000_000).unwrap();
    let cert = params.self_signed(&key).unwrap();
    CertificateAuthority::from_material(
        CaCategory::new(category).unwrap(),
        cert.pem().as_bytes(),
        &key.serialize_pem(),
    )
    .unwrap()
}

pub fn generate_csr() -> Vec<u8> {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name = DistinguishedName::new();
    params.serialize_request(&key).unwrap().der().to_vec()
}

/// Fully wired services over one store.
pub struct Authority {
    pub clock: Arc<ManualClock>,
    pub event_bus: EventBus,
    pub certifier: Arc<StandardCertifierService>,
    pub access_control: Arc<StandardAccessControlService>,
    pub authorization: Arc<StandardAuthorizationService>,
}

impl Authority {
    pub fn in_memory() -> Self {
        Self::over(Arc::new(InMemoryKeyValueStore::new()))
    }

    pub fn over(store: Arc<dyn KeyValueStore>) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let event_bus = EventBus::with_default_capacity();
        let certifier = Arc::new(StandardCertifierService::new(
            Arc::new(StoredCertificateRepository::new(store.clone())),
            vec![generate_ca("default")],
            clock.clone(),
            event_bus.clone(),
            3,
        ));
        let access_control = Arc::new(StandardAccessControlService::new(
            Arc::new(StoredAccessControlRepository::new(store)),
            clock.clone(),
            event_bus.clone(),
        ));
        let authorization = Arc::new(StandardAuthorizationService::new(
            certifier.clone(),
            access_control.clone(),
            EntityResolverRegistry::with_defaults(&["v1/ca".to_string()]),
            clock.clone(),
            event_bus.clone(),
        ));
        Self {
            clock,
            event_bus,
            certifier,
            access_control,
            authorization,
        }
    }

    /// Issues a one-day certificate and returns its serial.
    pub async fn issue(&self, identity: Identity) -> String {
        self.certifier
            .sign_csr(SignCsrRequest {
                identity,
                valid_for: std::time::Duration::from_secs(24 * 3600),
                csr_der: generate_csr(),
                category: CaCategory::default_category(),
            })
            .await
            .unwrap()
            .serial_number
            .to_string()
    }

    pub fn authorization_service(&self) -> Arc<dyn AuthorizationService> {
        self.authorization.clone()
    }
}
