// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Key/Value Store
//!
//! One `kv_store` table holds every logical table, keyed by `(tbl, key)`.
//! Each statement touches a single row or reads a consistent snapshot, which
//! gives the per-key atomicity the typed repositories rely on.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `KeyValueStore` over PostgreSQL

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::collections::HashMap;

use crate::domain::repository::{KeyValueStore, RepositoryError, StoreTable};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct PostgresKeyValueStore {
    pool: PgPool,
}

impl PostgresKeyValueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies pending schema migrations.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to apply migrations: {}", e)))
    }
}

/// Classifies a driver error and prefixes the failing operation.
fn store_error(op: &str, table: StoreTable, err: sqlx::Error) -> RepositoryError {
    match RepositoryError::from(err) {
        RepositoryError::Unavailable(msg) => {
            RepositoryError::Unavailable(format!("{} on {}: {}", op, table, msg))
        }
        RepositoryError::Database(msg) => {
            RepositoryError::Database(format!("{} on {}: {}", op, table, msg))
        }
        other => other,
    }
}

#[async_trait]
impl KeyValueStore for PostgresKeyValueStore {
    async fn get(&self, table: StoreTable, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE tbl = $1 AND key = $2")
            .bind(table.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("get", table, e))?;

        row.map(|r| r.try_get::<Vec<u8>, _>("value"))
            .transpose()
            .map_err(|e| store_error("get", table, e))
    }

    async fn get_many(
        &self,
        table: StoreTable,
        keys: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, RepositoryError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query("SELECT key, value FROM kv_store WHERE tbl = $1 AND key = ANY($2)")
            .bind(table.as_str())
            .bind(keys)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("get_many", table, e))?;

        rows.into_iter()
            .map(|row| {
                let key: String = row.try_get("key")?;
                let value: Vec<u8> = row.try_get("value")?;
                Ok((key, value))
            })
            .collect::<Result<HashMap<_, _>, sqlx::Error>>()
            .map_err(|e| store_error("get_many", table, e))
    }

    async fn put(&self, table: StoreTable, key: &str, value: Vec<u8>) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (tbl, key, value, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (tbl, key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = NOW()
            "#,
        )
        .bind(table.as_str())
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("put", table, e))?;

        Ok(())
    }

    async fn delete(&self, table: StoreTable, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM kv_store WHERE tbl = $1 AND key = $2")
            .bind(table.as_str())
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("delete", table, e))?;

        Ok(())
    }

    async fn list_keys(&self, table: StoreTable) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT key FROM kv_store WHERE tbl = $1 ORDER BY key")
            .bind(table.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("list_keys", table, e))?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>("key"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| store_error("list_keys", table, e))
    }
}
