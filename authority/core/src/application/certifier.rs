// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Certifier Service
//!
//! Sole issuer of identity certificates and sole authority on the binding
//! between a certificate serial number and an [`Identity`].
//!
//! ## Issuance (`sign_csr`)
//!
//! 1. The CSR must parse and carry a valid self-signature.
//! 2. Its subject CN must be empty or equal the identity's common name. An
//!    empty CN is filled in. For the `vpn` CA and a gateway identity the
//!    issued CN is the gateway's logical id.
//! 3. A random 128-bit serial is drawn, retrying on collision with an
//!    existing record.
//! 4. `not_before = now`, `not_after = now + valid_for`, clamped to the
//!    signing CA's own `not_after`.
//! 5. The record is persisted before the certificate is returned.
//!
//! ## Lookups
//!
//! Serial numbers are canonicalised on every entry point, so lowercase hex
//! and leading zeros resolve to the same record. Every authenticated caller
//! goes through [`CertifierService::get_verified_certificate_identity`],
//! which adds the validity window check to the plain lookup.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::certificate::{CaCategory, CertificateRecord, SerialNumber};
use crate::domain::clock::Clock;
use crate::domain::errors::AuthorityError;
use crate::domain::events::AuthorityEvent;
use crate::domain::identity::Identity;
use crate::domain::repository::CertificateRepository;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::pki::{self, CertificateAuthority, IssueParams};

/// Random serial length in bytes.
const SERIAL_BYTES: usize = 16;

/// Input to [`CertifierService::sign_csr`].
#[derive(Debug, Clone)]
pub struct SignCsrRequest {
    pub identity: Identity,
    pub valid_for: std::time::Duration,
    pub csr_der: Vec<u8>,
    pub category: CaCategory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub serial_number: SerialNumber,
    pub certificate_der: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

#[async_trait]
pub trait CertifierService: Send + Sync {
    /// DER certificate of the CA configured for `category`.
    async fn get_ca(&self, category: &CaCategory) -> Result<Vec<u8>, AuthorityError>;

    async fn sign_csr(&self, request: SignCsrRequest) -> Result<IssuedCertificate, AuthorityError>;

    /// Binds an externally issued certificate to `identity`. When `category`
    /// is given the certificate must verify against that CA.
    async fn add_certificate(
        &self,
        identity: Identity,
        certificate_der: Vec<u8>,
        category: Option<CaCategory>,
    ) -> Result<SerialNumber, AuthorityError>;

    async fn get_identity(&self, serial_number: &str) -> Result<CertificateRecord, AuthorityError>;

    /// `get_identity` followed by the validity window check.
    async fn get_verified_certificate_identity(
        &self,
        serial_number: &str,
    ) -> Result<Identity, AuthorityError>;

    fn verify_date_range(&self, record: &CertificateRecord) -> Result<(), AuthorityError>;

    /// Serials bound to `identity`, sorted.
    async fn find_certificates(&self, identity: &Identity) -> Result<Vec<SerialNumber>, AuthorityError>;

    async fn list_certificates(&self) -> Result<Vec<SerialNumber>, AuthorityError>;

    async fn get_all(&self) -> Result<BTreeMap<SerialNumber, CertificateRecord>, AuthorityError>;

    /// Idempotent.
    async fn revoke_certificate(&self, serial_number: &str) -> Result<(), AuthorityError>;

    /// Deletes every record with `not_after + grace_period < now`. Returns the
    /// number of deleted records.
    async fn collect_garbage(&self, grace_period: std::time::Duration) -> Result<usize, AuthorityError>;
}

pub struct StandardCertifierService {
    repository: Arc<dyn CertificateRepository>,
    authorities: HashMap<CaCategory, CertificateAuthority>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    serial_number_trials: u32,
}

impl StandardCertifierService {
    pub fn new(
        repository: Arc<dyn CertificateRepository>,
        authorities: Vec<CertificateAuthority>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        serial_number_trials: u32,
    ) -> Self {
        let authorities = authorities
            .into_iter()
            .map(|ca| (ca.category().clone(), ca))
            .collect();
        Self {
            repository,
            authorities,
            clock,
            event_bus,
            serial_number_trials: serial_number_trials.max(1),
        }
    }

    /// Whole seconds: X.509 validity has no finer resolution.
    fn now(&self) -> Result<DateTime<Utc>, AuthorityError> {
        let now = self.clock.now();
        DateTime::<Utc>::from_timestamp(now.timestamp(), 0)
            .ok_or_else(|| AuthorityError::Internal("clock out of range".to_string()))
    }

    async fn generate_serial_number(&self) -> Result<Vec<u8>, AuthorityError> {
        for trial in 1..=self.serial_number_trials {
            let mut bytes = [0u8; SERIAL_BYTES];
            OsRng.fill_bytes(&mut bytes);
            // Positive DER INTEGER.
            bytes[0] &= 0x7f;
            let serial = SerialNumber::from_bytes(&bytes);
            if serial.is_zero() {
                continue;
            }
            if !self.repository.exists(&serial).await? {
                return Ok(bytes.to_vec());
            }
            warn!(serial = %serial, trial, "Generated serial number already in use");
        }
        Err(AuthorityError::Internal(format!(
            "failed to generate a unique serial number after {} trials",
            self.serial_number_trials
        )))
    }

    /// Common name for the issued certificate, after checking the CSR's own.
    fn bind_common_name(
        identity: &Identity,
        category: &CaCategory,
        csr_common_name: Option<String>,
    ) -> Result<String, AuthorityError> {
        let identity_cn = identity.to_common_name().ok_or_else(|| {
            AuthorityError::InvalidArgument(format!(
                "cannot issue a certificate for wildcard {}",
                identity
            ))
        })?;

        if let Some(cn) = csr_common_name {
            if cn != identity_cn {
                return Err(AuthorityError::InvalidArgument(format!(
                    "CN from CSR ({}) and CN in identity ({}) do not match",
                    cn, identity_cn
                )));
            }
        }

        if let Identity::Gateway(gateway) = identity {
            if category.is_vpn() && !gateway.logical_id.is_empty() {
                return Ok(gateway.logical_id.clone());
            }
        }
        Ok(identity_cn)
    }

    fn parse_serial(serial_number: &str) -> Result<SerialNumber, AuthorityError> {
        SerialNumber::parse(serial_number)
    }
}

#[async_trait]
impl CertifierService for StandardCertifierService {
    async fn get_ca(&self, category: &CaCategory) -> Result<Vec<u8>, AuthorityError> {
        self.authorities
            .get(category)
            .map(|ca| ca.cert_der().to_vec())
            .ok_or_else(|| AuthorityError::NotFound(format!("no CA configured for '{}'", category)))
    }

    async fn sign_csr(&self, request: SignCsrRequest) -> Result<IssuedCertificate, AuthorityError> {
        request.identity.validate()?;
        let ca = self.authorities.get(&request.category).ok_or_else(|| {
            AuthorityError::InvalidArgument(format!("unknown CA category '{}'", request.category))
        })?;

        let valid_for = Duration::from_std(request.valid_for)
            .ok()
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| {
                AuthorityError::InvalidArgument(format!(
                    "invalid certificate validity {:?}",
                    request.valid_for
                ))
            })?;

        let csr_common_name = pki::inspect_csr(&request.csr_der)?;
        let common_name =
            Self::bind_common_name(&request.identity, &request.category, csr_common_name)?;

        let serial = self.generate_serial_number().await?;
        let not_before = self.now()?;
        let mut not_after = not_before
            .checked_add_signed(valid_for)
            .unwrap_or(ca.not_after());
        if not_after > ca.not_after() {
            warn!(
                category = %request.category,
                requested = %not_after,
                ca_not_after = %ca.not_after(),
                "Requested validity exceeds CA validity, clamping"
            );
            not_after = ca.not_after();
        }
        if not_after < not_before {
            return Err(AuthorityError::InvalidArgument(format!(
                "CA '{}' expired at {}",
                request.category,
                ca.not_after()
            )));
        }

        let certificate_der = ca.issue(IssueParams {
            csr_der: &request.csr_der,
            common_name: &common_name,
            serial: &serial,
            not_before,
            not_after,
        })?;

        let record = CertificateRecord {
            serial_number: SerialNumber::from_bytes(&serial),
            identity: request.identity.clone(),
            not_before,
            not_after,
            certificate_der: certificate_der.clone(),
        };
        self.repository.save(&record).await?;

        info!(
            serial = %record.serial_number,
            identity = %record.identity,
            category = %request.category,
            not_after = %not_after,
            "Issued certificate"
        );
        metrics::counter!(
            "sentinel_certificates_issued_total",
            "category" => request.category.to_string()
        )
        .increment(1);
        self.event_bus.publish(AuthorityEvent::CertificateIssued {
            serial_number: record.serial_number.clone(),
            identity: record.identity.clone(),
            category: request.category.clone(),
            not_after,
            issued_at: not_before,
        });

        Ok(IssuedCertificate {
            serial_number: record.serial_number,
            certificate_der,
            not_before,
            not_after,
        })
    }

    async fn add_certificate(
        &self,
        identity: Identity,
        certificate_der: Vec<u8>,
        category: Option<CaCategory>,
    ) -> Result<SerialNumber, AuthorityError> {
        identity.validate()?;
        if identity.is_wildcard() {
            return Err(AuthorityError::InvalidArgument(format!(
                "cannot bind a certificate to wildcard {}",
                identity
            )));
        }

        let summary = pki::summarize_certificate(&certificate_der)?;
        if let Some(category) = &category {
            let ca = self.authorities.get(category).ok_or_else(|| {
                AuthorityError::InvalidArgument(format!("unknown CA category '{}'", category))
            })?;
            ca.verify_issued(&certificate_der).map_err(|e| {
                AuthorityError::InvalidArgument(format!(
                    "{} for certificate {}",
                    e, summary.serial_number
                ))
            })?;
        }

        if self.repository.exists(&summary.serial_number).await? {
            return Err(AuthorityError::AlreadyExists(format!(
                "certificate with serial number '{}'",
                summary.serial_number
            )));
        }

        let record = CertificateRecord {
            serial_number: summary.serial_number.clone(),
            identity,
            not_before: summary.not_before,
            not_after: summary.not_after,
            certificate_der,
        };
        self.repository.save(&record).await?;

        info!(
            serial = %record.serial_number,
            identity = %record.identity,
            "Added externally issued certificate"
        );
        self.event_bus.publish(AuthorityEvent::CertificateAdded {
            serial_number: record.serial_number.clone(),
            identity: record.identity,
            added_at: self.clock.now(),
        });

        Ok(record.serial_number)
    }

    async fn get_identity(&self, serial_number: &str) -> Result<CertificateRecord, AuthorityError> {
        let serial = Self::parse_serial(serial_number)?;
        self.repository.find_by_serial(&serial).await?.ok_or_else(|| {
            AuthorityError::NotFound(format!("certificate with serial number '{}'", serial))
        })
    }

    async fn get_verified_certificate_identity(
        &self,
        serial_number: &str,
    ) -> Result<Identity, AuthorityError> {
        let record = self.get_identity(serial_number).await?;
        self.verify_date_range(&record)?;
        Ok(record.identity)
    }

    fn verify_date_range(&self, record: &CertificateRecord) -> Result<(), AuthorityError> {
        record.verify_date_range(self.clock.now())
    }

    async fn find_certificates(&self, identity: &Identity) -> Result<Vec<SerialNumber>, AuthorityError> {
        identity.validate()?;
        let hash = identity.hash_string();
        let mut serials: Vec<SerialNumber> = self
            .repository
            .find_all()
            .await?
            .into_iter()
            .filter(|record| record.identity.hash_string() == hash)
            .map(|record| record.serial_number)
            .collect();
        serials.sort();
        Ok(serials)
    }

    async fn list_certificates(&self) -> Result<Vec<SerialNumber>, AuthorityError> {
        Ok(self.repository.list_serials().await?)
    }

    async fn get_all(&self) -> Result<BTreeMap<SerialNumber, CertificateRecord>, AuthorityError> {
        Ok(self
            .repository
            .find_all()
            .await?
            .into_iter()
            .map(|record| (record.serial_number.clone(), record))
            .collect())
    }

    async fn revoke_certificate(&self, serial_number: &str) -> Result<(), AuthorityError> {
        let serial = Self::parse_serial(serial_number)?;
        self.repository.delete(&serial).await?;
        info!(serial = %serial, "Revoked certificate");
        self.event_bus.publish(AuthorityEvent::CertificateRevoked {
            serial_number: serial,
            revoked_at: self.clock.now(),
        });
        Ok(())
    }

    async fn collect_garbage(&self, grace_period: std::time::Duration) -> Result<usize, AuthorityError> {
        let grace = Duration::from_std(grace_period).map_err(|_| {
            AuthorityError::InvalidArgument(format!("grace period {:?} out of range", grace_period))
        })?;
        let now = self.clock.now();
        let serials = self.repository.list_serials().await?;

        let mut collected = 0usize;
        let mut failures = Vec::new();
        for serial in serials {
            let record = match self.repository.find_by_serial(&serial).await {
                Ok(Some(record)) => record,
                // Revoked concurrently.
                Ok(None) => continue,
                Err(e) => {
                    failures.push(format!("{}: {}", serial, e));
                    continue;
                }
            };
            if !record.is_collectable(now, grace) {
                continue;
            }
            match self.repository.delete(&serial).await {
                Ok(()) => {
                    debug!(serial = %serial, not_after = %record.not_after, "Collected expired certificate");
                    collected += 1;
                }
                Err(e) => failures.push(format!("{}: {}", serial, e)),
            }
        }

        metrics::counter!("sentinel_certificates_collected_total").increment(collected as u64);
        self.event_bus.publish(AuthorityEvent::CertificatesCollected {
            count: collected,
            failures: failures.len(),
            collected_at: now,
        });

        if failures.is_empty() {
            info!(collected, "Certificate garbage collection complete");
            Ok(collected)
        } else {
            warn!(collected, failed = failures.len(), "Certificate garbage collection incomplete");
            Err(AuthorityError::Internal(format!(
                "collected {} certificates, {} failed: {}",
                collected,
                failures.len(),
                failures.join("; ")
            )))
        }
    }
}
