// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Control Aggregate
//!
//! An [`AccessControlList`] is owned by exactly one operator [`Identity`] and
//! maps each target's canonical hash to an [`AccessControlEntity`].
//!
//! ## Permission Aggregation
//!
//! ```text
//! granted(entity) = entries[hash(entity)]
//!                 | entries[hash(entity.wildcard_for_identity())]   (if any)
//! ```
//!
//! Aggregation is a monotonic union. There is no deny entry, so a wildcard
//! grant and an exact grant can only add to one another. Missing entries
//! contribute [`Permission::NONE`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::domain::errors::AuthorityError;
use crate::domain::identity::Identity;

/// Permission bit set. Only `READ` and `WRITE` are defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Permission(u8);

impl Permission {
    pub const NONE: Permission = Permission(0);
    pub const READ: Permission = Permission(0b01);
    pub const WRITE: Permission = Permission(0b10);
    pub const READ_WRITE: Permission = Permission(0b11);

    const MASK: u8 = 0b11;

    /// Rejects any bit outside `READ | WRITE`.
    pub fn from_bits(bits: u8) -> Result<Self, AuthorityError> {
        if bits & !Self::MASK != 0 {
            return Err(AuthorityError::InvalidArgument(format!(
                "invalid permission bitmask {:#04b}",
                bits
            )));
        }
        Ok(Permission(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `required` is present in `self`.
    pub fn contains(&self, required: Permission) -> bool {
        self.0 & required.0 == required.0
    }
}

impl BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Permission) -> Permission {
        Permission(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permission {
    fn bitor_assign(&mut self, rhs: Permission) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permission {
    type Output = Permission;

    fn bitand(self, rhs: Permission) -> Permission {
        Permission(self.0 & rhs.0)
    }
}

impl TryFrom<u8> for Permission {
    type Error = AuthorityError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Permission::from_bits(bits)
    }
}

impl From<Permission> for u8 {
    fn from(permission: Permission) -> u8 {
        permission.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Permission::NONE => f.write_str("NONE"),
            Permission::READ => f.write_str("READ"),
            Permission::WRITE => f.write_str("WRITE"),
            _ => f.write_str("READ|WRITE"),
        }
    }
}

/// A single grant: `permissions` on `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntity {
    pub target: Identity,
    pub permissions: Permission,
}

impl AccessControlEntity {
    pub fn new(target: Identity, permissions: Permission) -> Self {
        Self { target, permissions }
    }
}

/// One operator's complete set of grants.
///
/// # Invariants
///
/// - `operator` is an `Operator` identity.
/// - Every key of `entities` equals the canonical hash of its entry's target.
///   [`AccessControlList::verify_integrity`] enforces this on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlList {
    pub operator: Identity,
    #[serde(default)]
    pub entities: HashMap<String, AccessControlEntity>,
}

impl AccessControlList {
    pub fn new(operator: Identity) -> Result<Self, AuthorityError> {
        ensure_operator(&operator)?;
        Ok(Self {
            operator,
            entities: HashMap::new(),
        })
    }

    /// Builds an ACL holding exactly `entries`. A target listed twice keeps
    /// its last entry.
    pub fn with_entries(
        operator: Identity,
        entries: Vec<AccessControlEntity>,
    ) -> Result<Self, AuthorityError> {
        let mut acl = Self::new(operator)?;
        acl.merge(entries)?;
        Ok(acl)
    }

    /// Inserts `entries`, replacing any existing entry for the same target and
    /// leaving every other entry untouched.
    pub fn merge(&mut self, entries: Vec<AccessControlEntity>) -> Result<(), AuthorityError> {
        for entry in entries {
            entry.target.validate()?;
            self.entities.insert(entry.target.hash_string(), entry);
        }
        Ok(())
    }

    pub fn entries(&self) -> Vec<AccessControlEntity> {
        let mut entries: Vec<AccessControlEntity> = self.entities.values().cloned().collect();
        entries.sort_by_key(|e| e.target.hash_string());
        entries
    }

    /// Aggregated permission on `entity`: exact grant OR its category wildcard grant.
    pub fn permissions_for(&self, entity: &Identity) -> Permission {
        let exact = self.granted(&entity.hash_string());
        let wildcard = entity
            .wildcard_for_identity()
            .map(|wc| self.granted(&wc.hash_string()))
            .unwrap_or(Permission::NONE);
        exact | wildcard
    }

    fn granted(&self, hash: &str) -> Permission {
        self.entities
            .get(hash)
            .map(|e| e.permissions)
            .unwrap_or(Permission::NONE)
    }

    /// Checks the stored ACL against the key it was loaded from. Returns a
    /// description of the first inconsistency found.
    pub fn verify_integrity(&self, stored_key: &str) -> Result<(), String> {
        let owner_hash = self.operator.hash_string();
        if owner_hash != stored_key {
            return Err(format!(
                "ACL stored under '{}' is owned by '{}'",
                stored_key, owner_hash
            ));
        }
        for (key, entry) in &self.entities {
            let target_hash = entry.target.hash_string();
            if *key != target_hash {
                return Err(format!(
                    "ACL '{}' has entry keyed '{}' for target '{}'",
                    stored_key, key, target_hash
                ));
            }
        }
        Ok(())
    }
}

pub(crate) fn ensure_operator(identity: &Identity) -> Result<(), AuthorityError> {
    identity.validate()?;
    if !identity.is_operator() {
        return Err(AuthorityError::InvalidArgument(format!(
            "ACL owner must be an operator identity, got {}",
            identity
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator() -> Identity {
        Identity::new_operator("bob").unwrap()
    }

    #[test]
    fn test_permission_bits() {
        assert!(Permission::READ_WRITE.contains(Permission::READ));
        assert!(Permission::READ_WRITE.contains(Permission::WRITE));
        assert!(!Permission::READ.contains(Permission::WRITE));
        assert!(Permission::READ.contains(Permission::NONE));
        assert_eq!(Permission::READ | Permission::WRITE, Permission::READ_WRITE);
        assert_eq!(Permission::READ_WRITE & Permission::WRITE, Permission::WRITE);
        assert!(Permission::from_bits(0b100).is_err());
        assert_eq!(Permission::from_bits(3).unwrap(), Permission::READ_WRITE);
        assert!(serde_json::from_str::<Permission>("4").is_err());
    }

    #[test]
    fn test_aggregation_is_monotonic_union() {
        let n1 = Identity::new_network("n1").unwrap();
        let n2 = Identity::new_network("n2").unwrap();
        let acl = AccessControlList::with_entries(
            operator(),
            vec![
                AccessControlEntity::new(n1.clone(), Permission::READ),
                AccessControlEntity::new(Identity::new_network_wildcard(), Permission::WRITE),
            ],
        )
        .unwrap();

        assert_eq!(acl.permissions_for(&n1), Permission::READ_WRITE);
        assert_eq!(acl.permissions_for(&n2), Permission::WRITE);
        assert_eq!(
            acl.permissions_for(&Identity::new_operator("alice").unwrap()),
            Permission::NONE
        );
        // A wildcard target only sees its own exact grant.
        assert_eq!(
            acl.permissions_for(&Identity::new_network_wildcard()),
            Permission::WRITE
        );
        assert_eq!(
            acl.permissions_for(&Identity::new_gateway_wildcard()),
            Permission::NONE
        );
    }

    #[test]
    fn test_merge_replaces_only_named_targets() {
        let n1 = Identity::new_network("n1").unwrap();
        let n2 = Identity::new_network("n2").unwrap();
        let mut acl = AccessControlList::with_entries(
            operator(),
            vec![
                AccessControlEntity::new(n1.clone(), Permission::READ_WRITE),
                AccessControlEntity::new(n2.clone(), Permission::READ),
            ],
        )
        .unwrap();

        acl.merge(vec![AccessControlEntity::new(n1.clone(), Permission::READ)])
            .unwrap();

        assert_eq!(acl.entities.len(), 2);
        assert_eq!(acl.permissions_for(&n1), Permission::READ);
        assert_eq!(acl.permissions_for(&n2), Permission::READ);
    }

    #[test]
    fn test_owner_must_be_operator() {
        let err = AccessControlList::new(Identity::new_network("n1").unwrap()).unwrap_err();
        assert!(matches!(err, AuthorityError::InvalidArgument(_)));
        assert!(AccessControlList::new(Identity::new_operator_wildcard()).is_err());
    }

    #[test]
    fn test_verify_integrity() {
        let n1 = Identity::new_network("n1").unwrap();
        let mut acl = AccessControlList::with_entries(
            operator(),
            vec![AccessControlEntity::new(n1.clone(), Permission::READ)],
        )
        .unwrap();
        assert!(acl.verify_integrity("Id_Operator_bob").is_ok());
        assert!(acl.verify_integrity("Id_Operator_alice").is_err());

        let entry = acl.entities.remove(&n1.hash_string()).unwrap();
        acl.entities.insert("Id_Network_other".to_string(), entry);
        assert!(acl.verify_integrity("Id_Operator_bob").is_err());
    }
}
