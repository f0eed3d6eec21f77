// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stored Certificate Repository
//!
//! Certificate records are JSON documents in [`StoreTable::Certificates`],
//! keyed by canonical serial number.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::certificate::{CertificateRecord, SerialNumber};
use crate::domain::repository::{
    CertificateRepository, KeyValueStore, RepositoryError, StoreTable,
};

const TABLE: StoreTable = StoreTable::Certificates;

pub struct StoredCertificateRepository {
    store: Arc<dyn KeyValueStore>,
}

impl StoredCertificateRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<CertificateRecord, RepositoryError> {
    let record: CertificateRecord = serde_json::from_slice(bytes)
        .map_err(|e| RepositoryError::Serialization(format!("certificate '{}': {}", key, e)))?;
    if record.serial_number.as_str() != key {
        return Err(RepositoryError::Corrupted(format!(
            "certificate stored under '{}' has serial '{}'",
            key, record.serial_number
        )));
    }
    Ok(record)
}

fn parse_key(key: &str) -> Result<SerialNumber, RepositoryError> {
    let serial = SerialNumber::parse(key)
        .map_err(|e| RepositoryError::Corrupted(format!("certificate key '{}': {}", key, e)))?;
    if serial.as_str() != key {
        return Err(RepositoryError::Corrupted(format!(
            "certificate key '{}' is not canonical",
            key
        )));
    }
    Ok(serial)
}

#[async_trait]
impl CertificateRepository for StoredCertificateRepository {
    async fn save(&self, record: &CertificateRecord) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(record)?;
        self.store
            .put(TABLE, record.serial_number.as_str(), bytes)
            .await
    }

    async fn find_by_serial(
        &self,
        serial: &SerialNumber,
    ) -> Result<Option<CertificateRecord>, RepositoryError> {
        match self.store.get(TABLE, serial.as_str()).await? {
            Some(bytes) => decode(serial.as_str(), &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn exists(&self, serial: &SerialNumber) -> Result<bool, RepositoryError> {
        Ok(self.store.get(TABLE, serial.as_str()).await?.is_some())
    }

    async fn list_serials(&self) -> Result<Vec<SerialNumber>, RepositoryError> {
        let keys = self.store.list_keys(TABLE).await?;
        let mut serials = keys
            .iter()
            .map(|k| parse_key(k))
            .collect::<Result<Vec<_>, _>>()?;
        serials.sort();
        Ok(serials)
    }

    async fn find_all(&self) -> Result<Vec<CertificateRecord>, RepositoryError> {
        let keys = self.store.list_keys(TABLE).await?;
        let mut rows = self.store.get_many(TABLE, &keys).await?;
        let mut records = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(bytes) = rows.remove(key) {
                records.push(decode(key, &bytes)?);
            }
        }
        Ok(records)
    }

    async fn delete(&self, serial: &SerialNumber) -> Result<(), RepositoryError> {
        self.store.delete(TABLE, serial.as_str()).await
    }
}
