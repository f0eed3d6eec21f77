// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates the key/value store for the configured backend and the typed
//! repositories layered over it. The domain layer only sees the traits.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::domain::repository::{
    AccessControlRepository, CertificateRepository, KeyValueStore, StorageBackend,
};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryKeyValueStore, PostgresKeyValueStore, StoredAccessControlRepository,
    StoredCertificateRepository,
};

/// Connects to the configured backend. PostgreSQL schemas are migrated before
/// the store is handed out.
pub async fn create_key_value_store(backend: &StorageBackend) -> Result<Arc<dyn KeyValueStore>> {
    match backend {
        StorageBackend::InMemory => {
            info!("Using in-memory store; state is lost on exit");
            Ok(Arc::new(InMemoryKeyValueStore::new()))
        }
        StorageBackend::PostgreSQL(config) => {
            let db = Database::new(&config.connection_string).await?;
            let store = PostgresKeyValueStore::new(db.get_pool().clone());
            store
                .migrate()
                .await
                .context("Failed to run authority store migrations")?;
            info!("Connected to PostgreSQL store");
            Ok(Arc::new(store))
        }
    }
}

pub fn create_access_control_repository(
    store: Arc<dyn KeyValueStore>,
) -> Arc<dyn AccessControlRepository> {
    Arc::new(StoredAccessControlRepository::new(store))
}

pub fn create_certificate_repository(
    store: Arc<dyn KeyValueStore>,
) -> Arc<dyn CertificateRepository> {
    Arc::new(StoredCertificateRepository::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::StoreTable;

    #[tokio::test]
    async fn test_in_memory_backend() {
        let store = create_key_value_store(&StorageBackend::InMemory).await.unwrap();
        store
            .put(StoreTable::Certificates, "AB", b"{}".to_vec())
            .await
            .unwrap();
        let certificates = create_certificate_repository(store.clone());
        assert!(matches!(certificates.list_serials().await, Ok(ref s) if s.len() == 1));
        let acls = create_access_control_repository(store);
        assert!(acls.list_operators().await.unwrap().is_empty());
    }
}
