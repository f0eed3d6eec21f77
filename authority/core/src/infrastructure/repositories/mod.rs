// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the storage contracts defined in
//! `crate::domain::repository`.
//!
//! # Layout
//!
//! - **Key/value stores** hold opaque blobs per `(table, key)`:
//!   - [`InMemoryKeyValueStore`] for development and tests
//!   - [`postgres::PostgresKeyValueStore`] for production
//! - **Typed repositories** encode aggregates as JSON over any store:
//!   - [`access_control::StoredAccessControlRepository`]
//!   - [`certificate::StoredCertificateRepository`]
//!
//! # Error Mapping
//!
//! Store errors surface as `RepositoryError`. An unreachable store is always
//! `Unavailable`; undecodable or inconsistent records are `Corrupted`.

pub mod access_control;
pub mod certificate;
pub mod postgres;

pub use access_control::StoredAccessControlRepository;
pub use certificate::StoredCertificateRepository;
pub use postgres::PostgresKeyValueStore;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::domain::repository::{KeyValueStore, RepositoryError, StoreTable};

/// Thread-safe in-memory store. Keys are kept sorted per table.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    tables: RwLock<HashMap<StoreTable, BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, table: StoreTable, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables.get(&table).and_then(|t| t.get(key)).cloned())
    }

    async fn get_many(
        &self,
        table: StoreTable,
        keys: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, RepositoryError> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(&table) else {
            return Ok(HashMap::new());
        };
        Ok(keys
            .iter()
            .filter_map(|k| rows.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn put(&self, table: StoreTable, key: &str, value: Vec<u8>) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.entry(table).or_default().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, table: StoreTable, key: &str) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        if let Some(rows) = tables.get_mut(&table) {
            rows.remove(key);
        }
        Ok(())
    }

    async fn list_keys(&self, table: StoreTable) -> Result<Vec<String>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables
            .get(&table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let store = InMemoryKeyValueStore::new();
        store.put(StoreTable::AccessControl, "k", b"acl".to_vec()).await.unwrap();
        store.put(StoreTable::Certificates, "k", b"cert".to_vec()).await.unwrap();

        assert_eq!(
            store.get(StoreTable::AccessControl, "k").await.unwrap(),
            Some(b"acl".to_vec())
        );
        assert_eq!(
            store.get(StoreTable::Certificates, "k").await.unwrap(),
            Some(b"cert".to_vec())
        );

        store.delete(StoreTable::AccessControl, "k").await.unwrap();
        assert!(store.get(StoreTable::AccessControl, "k").await.unwrap().is_none());
        assert!(store.get(StoreTable::Certificates, "k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_many_skips_missing_and_list_is_sorted() {
        let store = InMemoryKeyValueStore::new();
        for key in ["b", "a", "c"] {
            store
                .put(StoreTable::Certificates, key, key.as_bytes().to_vec())
                .await
                .unwrap();
        }

        let found = store
            .get_many(StoreTable::Certificates, &["a".into(), "z".into(), "c".into()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"], b"a".to_vec());

        assert_eq!(
            store.list_keys(StoreTable::Certificates).await.unwrap(),
            vec!["a", "b", "c"]
        );
        assert!(store.list_keys(StoreTable::AccessControl).await.unwrap().is_empty());

        // Deleting a missing key is not an error.
        store.delete(StoreTable::AccessControl, "nope").await.unwrap();
    }
}
