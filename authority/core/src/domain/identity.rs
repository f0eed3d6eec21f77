// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Identity Value Object
//!
//! An [`Identity`] answers "who or what" for every other component of the
//! authority: the caller bound to a client certificate, the owner of an ACL,
//! and every target an ACL entry grants access to.
//!
//! ## Canonical Hash
//!
//! [`Identity::hash_string`] is the only key used to look identities up in the
//! backing store. It is stable across restarts and collision-free:
//!
//! | Variant | Hash |
//! |---------|------|
//! | `Network` | `Id_Network_<network_id>` |
//! | `Operator` | `Id_Operator_<operator_id>` |
//! | `Gateway` | `Id_Gateway_<hardware_id>:<network_id>:<logical_id>` |
//! | `Wildcard` | `Id_Wildcard_<Category>` |
//!
//! Identity fields may not contain `:` or control characters, which keeps the
//! gateway encoding unambiguous.
//!
//! ## Wildcards
//!
//! A wildcard stands for every identity of one [`IdentityCategory`]. Wildcards
//! never carry a certificate common name and have no wildcard of their own.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::AuthorityError;

/// The three categories of concrete identity. Each one has exactly one wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityCategory {
    Network,
    Operator,
    Gateway,
}

impl IdentityCategory {
    pub const ALL: [IdentityCategory; 3] = [
        IdentityCategory::Network,
        IdentityCategory::Operator,
        IdentityCategory::Gateway,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityCategory::Network => "Network",
            IdentityCategory::Operator => "Operator",
            IdentityCategory::Gateway => "Gateway",
        }
    }
}

impl fmt::Display for IdentityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway identity fields. `network_id` and `logical_id` are empty for a
/// gateway that has not been registered to a network yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatewayIdentity {
    pub hardware_id: String,
    #[serde(default)]
    pub network_id: String,
    #[serde(default)]
    pub logical_id: String,
}

/// Canonical representation of a network, operator, gateway or category wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Identity {
    Network { network_id: String },
    Operator { operator_id: String },
    Gateway(GatewayIdentity),
    Wildcard { category: IdentityCategory },
}

impl Identity {
    pub fn new_network(network_id: impl Into<String>) -> Result<Self, AuthorityError> {
        let network_id = network_id.into();
        validate_field("network_id", &network_id, true)?;
        Ok(Identity::Network { network_id })
    }

    pub fn new_operator(operator_id: impl Into<String>) -> Result<Self, AuthorityError> {
        let operator_id = operator_id.into();
        validate_field("operator_id", &operator_id, true)?;
        Ok(Identity::Operator { operator_id })
    }

    pub fn new_gateway(
        hardware_id: impl Into<String>,
        network_id: impl Into<String>,
        logical_id: impl Into<String>,
    ) -> Result<Self, AuthorityError> {
        let gateway = GatewayIdentity {
            hardware_id: hardware_id.into(),
            network_id: network_id.into(),
            logical_id: logical_id.into(),
        };
        validate_field("hardware_id", &gateway.hardware_id, true)?;
        validate_field("network_id", &gateway.network_id, false)?;
        validate_field("logical_id", &gateway.logical_id, false)?;
        Ok(Identity::Gateway(gateway))
    }

    pub fn new_network_wildcard() -> Self {
        Identity::Wildcard { category: IdentityCategory::Network }
    }

    pub fn new_operator_wildcard() -> Self {
        Identity::Wildcard { category: IdentityCategory::Operator }
    }

    pub fn new_gateway_wildcard() -> Self {
        Identity::Wildcard { category: IdentityCategory::Gateway }
    }

    pub fn wildcard(category: IdentityCategory) -> Self {
        Identity::Wildcard { category }
    }

    /// The blanket target set required by requests whose resource cannot be
    /// resolved to specific entities.
    pub fn supervisor_wildcards() -> Vec<Identity> {
        IdentityCategory::ALL.iter().copied().map(Identity::wildcard).collect()
    }

    /// Re-checks field constraints for identities that did not go through a
    /// constructor (deserialized from requests or storage).
    pub fn validate(&self) -> Result<(), AuthorityError> {
        match self {
            Identity::Network { network_id } => validate_field("network_id", network_id, true),
            Identity::Operator { operator_id } => validate_field("operator_id", operator_id, true),
            Identity::Gateway(gw) => {
                validate_field("hardware_id", &gw.hardware_id, true)?;
                validate_field("network_id", &gw.network_id, false)?;
                validate_field("logical_id", &gw.logical_id, false)
            }
            Identity::Wildcard { .. } => Ok(()),
        }
    }

    /// Canonical store key for this identity.
    pub fn hash_string(&self) -> String {
        match self {
            Identity::Network { network_id } => format!("Id_Network_{}", network_id),
            Identity::Operator { operator_id } => format!("Id_Operator_{}", operator_id),
            Identity::Gateway(gw) => format!(
                "Id_Gateway_{}:{}:{}",
                gw.hardware_id, gw.network_id, gw.logical_id
            ),
            Identity::Wildcard { category } => format!("Id_Wildcard_{}", category),
        }
    }

    /// Common name embedded into certificates issued for this identity.
    /// `None` for wildcards.
    pub fn to_common_name(&self) -> Option<String> {
        match self {
            Identity::Network { network_id } => Some(network_id.clone()),
            Identity::Operator { operator_id } => Some(operator_id.clone()),
            Identity::Gateway(gw) => Some(gw.hardware_id.clone()),
            Identity::Wildcard { .. } => None,
        }
    }

    /// Category of a concrete identity, or the category a wildcard stands for.
    pub fn category(&self) -> IdentityCategory {
        match self {
            Identity::Network { .. } => IdentityCategory::Network,
            Identity::Operator { .. } => IdentityCategory::Operator,
            Identity::Gateway(_) => IdentityCategory::Gateway,
            Identity::Wildcard { category } => *category,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Identity::Wildcard { .. })
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Identity::Operator { .. })
    }

    /// True if `self` is the wildcard of `other`'s category, or both have the
    /// same canonical hash.
    pub fn matches(&self, other: &Identity) -> bool {
        if let Identity::Wildcard { category } = self {
            if !other.is_wildcard() && *category == other.category() {
                return true;
            }
        }
        self.hash_string() == other.hash_string()
    }

    /// The category wildcard a concrete identity belongs to. A wildcard has none.
    pub fn wildcard_for_identity(&self) -> Option<Identity> {
        match self {
            Identity::Wildcard { .. } => None,
            concrete => Some(Identity::wildcard(concrete.category())),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash_string())
    }
}

fn validate_field(name: &str, value: &str, required: bool) -> Result<(), AuthorityError> {
    if required && value.is_empty() {
        return Err(AuthorityError::InvalidArgument(format!("{} must not be empty", name)));
    }
    if value.chars().any(|c| c == ':' || c.is_control()) {
        return Err(AuthorityError::InvalidArgument(format!(
            "{} '{}' contains a reserved character",
            name,
            value.escape_debug()
        )));
    }
    Ok(())
}
