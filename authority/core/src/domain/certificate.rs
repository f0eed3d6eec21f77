// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Certificate Records
//!
//! A [`CertificateRecord`] binds a certificate serial number to the
//! [`Identity`] it authenticates, together with its validity window. Records
//! are independent of ACLs: revoking or collecting a certificate never touches
//! the owner's access-control list.
//!
//! ## Serial Numbers
//!
//! [`SerialNumber`] is canonical uppercase hexadecimal with no base prefix and
//! no leading zeros. Parsing accepts lowercase digits, a `0x` prefix and
//! leading zeros so that lookups succeed however a client printed the serial.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::AuthorityError;
use crate::domain::identity::Identity;

/// Canonical certificate serial number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber(String);

impl SerialNumber {
    pub fn parse(raw: &str) -> Result<Self, AuthorityError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(AuthorityError::InvalidArgument(
                "serial number must not be empty".to_string(),
            ));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AuthorityError::InvalidArgument(format!(
                "serial number '{}' is not hexadecimal",
                raw.escape_debug()
            )));
        }

        Ok(Self::canonical(digits))
    }

    /// Serial from the big-endian bytes carried in a certificate.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::canonical(&hex::encode_upper(bytes))
    }

    fn canonical(digits: &str) -> Self {
        let stripped = digits.trim_start_matches('0');
        if stripped.is_empty() {
            SerialNumber("0".to_string())
        } else {
            SerialNumber(stripped.to_ascii_uppercase())
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SerialNumber {
    type Err = AuthorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SerialNumber::parse(s)
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = AuthorityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SerialNumber::parse(&value)
    }
}

impl From<SerialNumber> for String {
    fn from(serial: SerialNumber) -> String {
        serial.0
    }
}

/// Name of a configured certificate authority root, e.g. `default` or `vpn`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaCategory(String);

impl CaCategory {
    pub const DEFAULT: &'static str = "default";
    pub const VPN: &'static str = "vpn";

    pub fn new(name: impl Into<String>) -> Result<Self, AuthorityError> {
        let name = name.into();
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AuthorityError::InvalidArgument(format!(
                "invalid CA category '{}'",
                name.escape_debug()
            )));
        }
        Ok(CaCategory(name))
    }

    pub fn default_category() -> Self {
        CaCategory(Self::DEFAULT.to_string())
    }

    pub fn is_vpn(&self) -> bool {
        self.0 == Self::VPN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CaCategory {
    type Error = AuthorityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CaCategory::new(value)
    }
}

impl From<CaCategory> for String {
    fn from(category: CaCategory) -> String {
        category.0
    }
}

/// Stored binding of a serial number to an identity and validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub serial_number: SerialNumber,
    pub identity: Identity,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    #[serde(with = "der_base64")]
    pub certificate_der: Vec<u8>,
}

impl CertificateRecord {
    /// Fails `Expired` after `not_after` and `NotYetValid` before
    /// `not_before`. Both bounds are inclusive.
    pub fn verify_date_range(&self, now: DateTime<Utc>) -> Result<(), AuthorityError> {
        if now > self.not_after {
            return Err(AuthorityError::Expired {
                serial: self.serial_number.to_string(),
            });
        }
        if now < self.not_before {
            return Err(AuthorityError::NotYetValid {
                serial: self.serial_number.to_string(),
            });
        }
        Ok(())
    }

    /// True once `not_after + grace_period` lies strictly in the past. A
    /// grace period running past the representable range never elapses.
    pub fn is_collectable(&self, now: DateTime<Utc>, grace_period: Duration) -> bool {
        self.not_after
            .checked_add_signed(grace_period)
            .is_some_and(|deadline| deadline < now)
    }
}

mod der_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> CertificateRecord {
        CertificateRecord {
            serial_number: SerialNumber::parse("1A2B").unwrap(),
            identity: Identity::new_operator("bob").unwrap(),
            not_before,
            not_after,
            certificate_der: vec![0x30, 0x03, 0x02, 0x01, 0x01],
        }
    }

    #[test]
    fn test_serial_canonicalisation() {
        assert_eq!(SerialNumber::parse("00ab12").unwrap().as_str(), "AB12");
        assert_eq!(SerialNumber::parse("0xAB12").unwrap().as_str(), "AB12");
        assert_eq!(SerialNumber::parse(" ab12 ").unwrap().as_str(), "AB12");
        assert_eq!(SerialNumber::parse("000").unwrap().as_str(), "0");
        assert!(SerialNumber::parse("000").unwrap().is_zero());
        assert!(SerialNumber::parse("").is_err());
        assert!(SerialNumber::parse("0x").is_err());
        assert!(SerialNumber::parse("12-34").is_err());
        assert_eq!(SerialNumber::from_bytes(&[0x00, 0x0a, 0xff]).as_str(), "AFF");
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let not_before = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let not_after = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let rec = record(not_before, not_after);

        assert!(rec.verify_date_range(not_before).is_ok());
        assert!(rec.verify_date_range(not_after).is_ok());
        assert!(matches!(
            rec.verify_date_range(not_after + Duration::seconds(1)),
            Err(AuthorityError::Expired { .. })
        ));
        assert!(matches!(
            rec.verify_date_range(not_before - Duration::seconds(1)),
            Err(AuthorityError::NotYetValid { .. })
        ));
    }

    #[test]
    fn test_is_collectable() {
        let not_after = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let rec = record(not_after - Duration::days(1), not_after);

        assert!(!rec.is_collectable(not_after, Duration::zero()));
        assert!(rec.is_collectable(not_after + Duration::seconds(1), Duration::zero()));
        assert!(!rec.is_collectable(not_after + Duration::seconds(1), Duration::hours(1)));
    }

    #[test]
    fn test_unrepresentable_grace_period_never_elapses() {
        let not_after = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let rec = record(not_after - Duration::days(1), not_after);
        let grace = Duration::seconds(9_000_000_000_000);

        assert!(not_after.checked_add_signed(grace).is_none());
        assert!(!rec.is_collectable(not_after + Duration::days(365), grace));
    }

    #[test]
    fn test_record_serializes_der_as_base64() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let rec = record(now, now);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["certificate_der"], "MAMCAQE=");
        assert_eq!(json["serial_number"], "1A2B");
        let back: CertificateRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_ca_category() {
        assert!(CaCategory::new("vpn").unwrap().is_vpn());
        assert!(!CaCategory::default_category().is_vpn());
        assert!(CaCategory::new("").is_err());
        assert!(CaCategory::new("a b").is_err());
    }
}
