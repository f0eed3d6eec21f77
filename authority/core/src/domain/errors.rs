// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Authority Error Taxonomy
//!
//! Every certifier and access-control operation fails with one
//! [`AuthorityError`] kind. The transport layer maps kinds to statuses; see
//! [`crate::application::authorization::AuthorizationError`] for the per-request
//! decision errors.
//!
//! Storage failures arrive as [`RepositoryError`] and are converted here. An
//! unreachable store becomes `ServiceUnavailable`, a corrupted record becomes
//! `Corrupted`. Neither is ever reported as `NotFound`.

use std::fmt;

use crate::domain::access_control::Permission;
use crate::domain::identity::Identity;
use crate::domain::repository::RepositoryError;

/// One (entity, required, granted) triple that failed a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedEntity {
    pub entity: Identity,
    pub required: Permission,
    pub granted: Permission,
}

impl fmt::Display for DeniedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (required {}, granted {})",
            self.entity, self.required, self.granted
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Certificate with serial number '{serial}' has expired")]
    Expired { serial: String },

    #[error("Certificate with serial number '{serial}' is not yet valid")]
    NotYetValid { serial: String },

    #[error("Permission denied for {operator} on {}", join_denied(.denied))]
    PermissionDenied {
        operator: Identity,
        denied: Vec<DeniedEntity>,
    },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthorityError {
    /// Store-level failures that say nothing about the request itself.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AuthorityError::ServiceUnavailable(_))
    }
}

fn join_denied(denied: &[DeniedEntity]) -> String {
    denied
        .iter()
        .map(DeniedEntity::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<RepositoryError> for AuthorityError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AuthorityError::NotFound(msg),
            RepositoryError::InvalidArgument(msg) => AuthorityError::InvalidArgument(msg),
            RepositoryError::Unavailable(msg) => AuthorityError::ServiceUnavailable(msg),
            RepositoryError::Corrupted(msg) => AuthorityError::Corrupted(msg),
            RepositoryError::Serialization(msg) => {
                AuthorityError::Corrupted(format!("undecodable record: {}", msg))
            }
            RepositoryError::Database(msg) | RepositoryError::Unknown(msg) => {
                AuthorityError::Internal(msg)
            }
        }
    }
}
