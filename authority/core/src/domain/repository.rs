// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the two aggregates the authority owns. Both are
//! layered over a single [`KeyValueStore`] with two logical tables:
//!
//! | Table | Key | Value | Typed repository |
//! |-------|-----|-------|------------------|
//! | [`StoreTable::AccessControl`] | operator canonical hash | serialized `AccessControlList` | [`AccessControlRepository`] |
//! | [`StoreTable::Certificates`] | canonical serial number | serialized `CertificateRecord` | [`CertificateRepository`] |
//!
//! ## Atomicity
//!
//! The store guarantees atomicity per key for `get`, `put` and `delete` and
//! nothing more. Two concurrent read-modify-write sequences on the same key
//! resolve as last write wins.
//!
//! Implementations live in `crate::infrastructure::repositories`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

use crate::domain::access_control::AccessControlList;
use crate::domain::certificate::{CertificateRecord, SerialNumber};
use crate::domain::identity::Identity;

/// Storage backend selected at start-up.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

/// Logical tables of the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTable {
    AccessControl,
    Certificates,
}

impl StoreTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreTable::AccessControl => "access_control",
            StoreTable::Certificates => "certificates",
        }
    }
}

impl fmt::Display for StoreTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blob store with per-key atomic operations.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, table: StoreTable, key: &str) -> Result<Option<Vec<u8>>, RepositoryError>;

    /// Missing keys are absent from the result.
    async fn get_many(
        &self,
        table: StoreTable,
        keys: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, RepositoryError>;

    async fn put(&self, table: StoreTable, key: &str, value: Vec<u8>) -> Result<(), RepositoryError>;

    /// Deleting a missing key succeeds.
    async fn delete(&self, table: StoreTable, key: &str) -> Result<(), RepositoryError>;

    /// All keys of `table`, sorted.
    async fn list_keys(&self, table: StoreTable) -> Result<Vec<String>, RepositoryError>;
}

/// Repository for operator ACLs, keyed by the operator's canonical hash.
///
/// Every read verifies the stored owner and entry keys and fails with
/// [`RepositoryError::Corrupted`] on mismatch.
#[async_trait]
pub trait AccessControlRepository: Send + Sync {
    /// Create or replace the ACL of `acl.operator`.
    async fn save(&self, acl: &AccessControlList) -> Result<(), RepositoryError>;

    async fn find_by_operator(
        &self,
        operator: &Identity,
    ) -> Result<Option<AccessControlList>, RepositoryError>;

    /// ACLs for `operators`, in request order, skipping operators without one.
    async fn find_by_operators(
        &self,
        operators: &[Identity],
    ) -> Result<Vec<AccessControlList>, RepositoryError>;

    /// Idempotent.
    async fn delete(&self, operator: &Identity) -> Result<(), RepositoryError>;

    /// Owners of every stored ACL.
    async fn list_operators(&self) -> Result<Vec<Identity>, RepositoryError>;
}

/// Repository for issued and imported certificates, keyed by serial number.
#[async_trait]
pub trait CertificateRepository: Send + Sync {
    async fn save(&self, record: &CertificateRecord) -> Result<(), RepositoryError>;

    async fn find_by_serial(
        &self,
        serial: &SerialNumber,
    ) -> Result<Option<CertificateRecord>, RepositoryError>;

    async fn exists(&self, serial: &SerialNumber) -> Result<bool, RepositoryError> {
        Ok(self.find_by_serial(serial).await?.is_some())
    }

    /// Sorted.
    async fn list_serials(&self) -> Result<Vec<SerialNumber>, RepositoryError>;

    async fn find_all(&self) -> Result<Vec<CertificateRecord>, RepositoryError>;

    /// Idempotent.
    async fn delete(&self, serial: &SerialNumber) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepositoryError::Unavailable(err.to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
