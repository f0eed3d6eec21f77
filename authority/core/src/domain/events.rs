// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::certificate::{CaCategory, SerialNumber};
use crate::domain::identity::Identity;

/// Audit trail of the authority. Published on the event bus after the
/// corresponding store write has landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthorityEvent {
    CertificateIssued {
        serial_number: SerialNumber,
        identity: Identity,
        category: CaCategory,
        not_after: DateTime<Utc>,
        issued_at: DateTime<Utc>,
    },
    CertificateAdded {
        serial_number: SerialNumber,
        identity: Identity,
        added_at: DateTime<Utc>,
    },
    CertificateRevoked {
        serial_number: SerialNumber,
        revoked_at: DateTime<Utc>,
    },
    CertificatesCollected {
        count: usize,
        failures: usize,
        collected_at: DateTime<Utc>,
    },
    AccessControlChanged {
        operator: Identity,
        entry_count: usize,
        replaced: bool,
        changed_at: DateTime<Utc>,
    },
    AccessControlDeleted {
        operator: Identity,
        deleted_at: DateTime<Utc>,
    },
    AuthorizationDenied {
        operator: Option<Identity>,
        method: String,
        path: String,
        reason: String,
        denied_at: DateTime<Utc>,
    },
}

impl AuthorityEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthorityEvent::CertificateIssued { .. } => "certificate_issued",
            AuthorityEvent::CertificateAdded { .. } => "certificate_added",
            AuthorityEvent::CertificateRevoked { .. } => "certificate_revoked",
            AuthorityEvent::CertificatesCollected { .. } => "certificates_collected",
            AuthorityEvent::AccessControlChanged { .. } => "access_control_changed",
            AuthorityEvent::AccessControlDeleted { .. } => "access_control_deleted",
            AuthorityEvent::AuthorizationDenied { .. } => "authorization_denied",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_denied_serialization() {
        let event = AuthorityEvent::AuthorizationDenied {
            operator: Some(Identity::new_operator("bob").unwrap()),
            method: "PUT".to_string(),
            path: "/v1/networks/n1".to_string(),
            reason: "forbidden".to_string(),
            denied_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: AuthorityEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.kind(), "authorization_denied");
        if let AuthorityEvent::AuthorizationDenied { operator, path, .. } = deserialized {
            assert_eq!(operator, Some(Identity::new_operator("bob").unwrap()));
            assert_eq!(path, "/v1/networks/n1");
        } else {
            panic!("wrong variant");
        }
    }
}
