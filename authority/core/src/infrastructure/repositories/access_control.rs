// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stored Access Control Repository
//!
//! ACLs are JSON documents in [`StoreTable::AccessControl`], keyed by the
//! owner's canonical hash. Every decode re-checks the owner and entry keys
//! against the row key; a mismatch is reported as `Corrupted` and never
//! repaired.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::access_control::AccessControlList;
use crate::domain::identity::Identity;
use crate::domain::repository::{
    AccessControlRepository, KeyValueStore, RepositoryError, StoreTable,
};

const TABLE: StoreTable = StoreTable::AccessControl;

pub struct StoredAccessControlRepository {
    store: Arc<dyn KeyValueStore>,
}

impl StoredAccessControlRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

fn operator_key(operator: &Identity) -> Result<String, RepositoryError> {
    if !operator.is_operator() {
        return Err(RepositoryError::InvalidArgument(format!(
            "ACL owner must be an operator identity, got {}",
            operator
        )));
    }
    Ok(operator.hash_string())
}

fn decode(key: &str, bytes: &[u8]) -> Result<AccessControlList, RepositoryError> {
    let acl: AccessControlList = serde_json::from_slice(bytes)
        .map_err(|e| RepositoryError::Serialization(format!("ACL '{}': {}", key, e)))?;
    if !acl.operator.is_operator() {
        return Err(RepositoryError::Corrupted(format!(
            "ACL '{}' is owned by non-operator {}",
            key, acl.operator
        )));
    }
    acl.verify_integrity(key).map_err(RepositoryError::Corrupted)?;
    Ok(acl)
}

#[async_trait]
impl AccessControlRepository for StoredAccessControlRepository {
    async fn save(&self, acl: &AccessControlList) -> Result<(), RepositoryError> {
        let key = operator_key(&acl.operator)?;
        acl.verify_integrity(&key)
            .map_err(RepositoryError::InvalidArgument)?;
        let bytes = serde_json::to_vec(acl)?;
        self.store.put(TABLE, &key, bytes).await
    }

    async fn find_by_operator(
        &self,
        operator: &Identity,
    ) -> Result<Option<AccessControlList>, RepositoryError> {
        let key = operator_key(operator)?;
        match self.store.get(TABLE, &key).await? {
            Some(bytes) => decode(&key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn find_by_operators(
        &self,
        operators: &[Identity],
    ) -> Result<Vec<AccessControlList>, RepositoryError> {
        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(operators.len());
        for operator in operators {
            let key = operator_key(operator)?;
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }

        let mut rows = self.store.get_many(TABLE, &keys).await?;
        let mut acls = Vec::with_capacity(rows.len());
        for key in &keys {
            if let Some(bytes) = rows.remove(key) {
                acls.push(decode(key, &bytes)?);
            }
        }
        Ok(acls)
    }

    async fn delete(&self, operator: &Identity) -> Result<(), RepositoryError> {
        let key = operator_key(operator)?;
        self.store.delete(TABLE, &key).await
    }

    async fn list_operators(&self) -> Result<Vec<Identity>, RepositoryError> {
        let keys = self.store.list_keys(TABLE).await?;
        let mut rows = self.store.get_many(TABLE, &keys).await?;
        let mut operators = Vec::with_capacity(keys.len());
        for key in &keys {
            // Deleted between the two reads.
            if let Some(bytes) = rows.remove(key) {
                operators.push(decode(key, &bytes)?.operator);
            }
        }
        Ok(operators)
    }
}
