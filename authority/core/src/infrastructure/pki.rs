// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # X.509 Certificate Authority Material
//!
//! Wraps one CA root (certificate + private key) loaded at start-up and the
//! parsing helpers the certifier needs:
//!
//! - CSR inspection and signature check (`x509-parser`)
//! - client certificate issuance (`rcgen`)
//! - validity and serial extraction from DER certificates
//! - signature verification of externally issued certificates
//!
//! Key material is never logged or serialized.

use anyhow::Context;
use chrono::{DateTime, Utc};
use rcgen::{
    CertificateParams, CertificateSigningRequestParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use rustls_pki_types::{CertificateDer, CertificateSigningRequestDer};
use std::fmt;
use std::path::Path;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::domain::certificate::{CaCategory, SerialNumber};
use crate::domain::errors::AuthorityError;

/// Serial and validity window read from a DER certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub serial_number: SerialNumber,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Everything needed to issue one client certificate from a verified CSR.
#[derive(Debug, Clone)]
pub struct IssueParams<'a> {
    pub csr_der: &'a [u8],
    pub common_name: &'a str,
    pub serial: &'a [u8],
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// One CA root. Immutable after loading.
pub struct CertificateAuthority {
    category: CaCategory,
    cert_der: Vec<u8>,
    not_after: DateTime<Utc>,
    issuer: rcgen::Certificate,
    key: KeyPair,
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("category", &self.category)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

impl CertificateAuthority {
    /// Reads the CA certificate (DER or PEM) and its PEM private key from disk.
    pub fn load(
        category: CaCategory,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();
        let cert_bytes = std::fs::read(cert_path)
            .with_context(|| format!("Failed to read CA certificate {:?}", cert_path))?;
        let key_pem = std::fs::read_to_string(key_path)
            .with_context(|| format!("Failed to read CA key {:?}", key_path))?;

        Self::from_material(category.clone(), &cert_bytes, &key_pem)
            .with_context(|| format!("Invalid key material for CA '{}'", category))
    }

    pub fn from_material(
        category: CaCategory,
        cert_bytes: &[u8],
        key_pem: &str,
    ) -> Result<Self, AuthorityError> {
        let cert_der = decode_certificate_bytes(cert_bytes)?;
        let (_, parsed) = X509Certificate::from_der(&cert_der).map_err(|e| {
            AuthorityError::InvalidArgument(format!("unparsable CA certificate: {}", e))
        })?;
        let not_after = to_chrono(parsed.validity().not_after.timestamp())?;

        let key = KeyPair::from_pem(key_pem)
            .map_err(|e| AuthorityError::InvalidArgument(format!("unparsable CA key: {}", e)))?;
        if key.public_key_raw() != parsed.public_key().subject_public_key.data.as_ref() {
            return Err(AuthorityError::InvalidArgument(format!(
                "CA '{}' private key does not match its certificate",
                category
            )));
        }

        let params = CertificateParams::from_ca_cert_der(&CertificateDer::from(cert_der.clone()))
            .map_err(|e| AuthorityError::InvalidArgument(format!("unusable CA certificate: {}", e)))?;
        let issuer = params
            .self_signed(&key)
            .map_err(|e| AuthorityError::Internal(format!("failed to rebuild CA issuer: {}", e)))?;

        Ok(Self {
            category,
            cert_der,
            not_after,
            issuer,
            key,
        })
    }

    pub fn category(&self) -> &CaCategory {
        &self.category
    }

    /// The CA certificate exactly as loaded, DER encoded.
    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Signs a client certificate for the subject key of `params.csr_der`.
    ///
    /// The CSR subject common name is replaced by `params.common_name`. The
    /// issued certificate is never a CA and is limited to client auth.
    pub fn issue(&self, params: IssueParams<'_>) -> Result<Vec<u8>, AuthorityError> {
        let csr = CertificateSigningRequestDer::from(params.csr_der.to_vec());
        let mut request = CertificateSigningRequestParams::from_der(&csr)
            .map_err(|e| AuthorityError::InvalidArgument(format!("unsupported CSR: {}", e)))?;

        let cert_params = &mut request.params;
        cert_params
            .distinguished_name
            .push(DnType::CommonName, params.common_name.to_string());
        cert_params.serial_number = Some(rcgen::SerialNumber::from_slice(params.serial));
        cert_params.not_before = to_offset(params.not_before)?;
        cert_params.not_after = to_offset(params.not_after)?;
        cert_params.is_ca = IsCa::ExplicitNoCa;
        cert_params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        cert_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        cert_params.use_authority_key_identifier_extension = true;

        let cert = request
            .signed_by(&self.issuer, &self.key)
            .map_err(|e| AuthorityError::Internal(format!("failed to sign certificate: {}", e)))?;
        Ok(cert.der().to_vec())
    }

    /// Fails `InvalidArgument` unless `cert_der` carries a valid signature
    /// from this CA.
    pub fn verify_issued(&self, cert_der: &[u8]) -> Result<(), AuthorityError> {
        let (_, ca) = X509Certificate::from_der(&self.cert_der)
            .map_err(|e| AuthorityError::Internal(format!("CA certificate unreadable: {}", e)))?;
        let (_, cert) = X509Certificate::from_der(cert_der)
            .map_err(|e| AuthorityError::InvalidArgument(format!("DER parse error: {}", e)))?;
        if cert.issuer() != ca.subject() {
            return Err(AuthorityError::InvalidArgument(format!(
                "certificate is not issued by CA '{}'",
                self.category
            )));
        }
        cert.verify_signature(Some(ca.public_key())).map_err(|_| {
            AuthorityError::InvalidArgument(format!(
                "certificate signature does not verify against CA '{}'",
                self.category
            ))
        })
    }
}

/// Parses a CSR, checks its self-signature and returns the subject CN (if any).
pub fn inspect_csr(csr_der: &[u8]) -> Result<Option<String>, AuthorityError> {
    let (_, csr) = X509CertificationRequest::from_der(csr_der)
        .map_err(|e| AuthorityError::InvalidArgument(format!("malformed CSR: {}", e)))?;
    csr.verify_signature()
        .map_err(|_| AuthorityError::InvalidArgument("CSR signature is invalid".to_string()))?;

    let common_name = csr
        .certification_request_info
        .subject
        .iter_common_name()
        .next()
        .map(|cn| {
            cn.as_str().map(str::to_string).map_err(|_| {
                AuthorityError::InvalidArgument("CSR common name is not a string".to_string())
            })
        })
        .transpose()?;

    Ok(common_name.filter(|cn| !cn.is_empty()))
}

/// Reads serial and validity from a DER certificate.
pub fn summarize_certificate(cert_der: &[u8]) -> Result<CertificateSummary, AuthorityError> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| AuthorityError::InvalidArgument(format!("DER parse error: {}", e)))?;
    let serial_number = SerialNumber::from_bytes(cert.tbs_certificate.raw_serial());
    if serial_number.is_zero() {
        return Err(AuthorityError::InvalidArgument(
            "certificate has a zero serial number".to_string(),
        ));
    }
    Ok(CertificateSummary {
        serial_number,
        not_before: to_chrono(cert.validity().not_before.timestamp())?,
        not_after: to_chrono(cert.validity().not_after.timestamp())?,
    })
}

/// Accepts DER as-is or unwraps a PEM `CERTIFICATE` block.
fn decode_certificate_bytes(bytes: &[u8]) -> Result<Vec<u8>, AuthorityError> {
    if bytes.starts_with(b"-----BEGIN") {
        let (_, pem) = x509_parser::pem::parse_x509_pem(bytes).map_err(|e| {
            AuthorityError::InvalidArgument(format!("malformed PEM certificate: {}", e))
        })?;
        if pem.label != "CERTIFICATE" {
            return Err(AuthorityError::InvalidArgument(format!(
                "expected a CERTIFICATE PEM block, found '{}'",
                pem.label
            )));
        }
        return Ok(pem.contents);
    }
    Ok(bytes.to_vec())
}

fn to_chrono(timestamp: i64) -> Result<DateTime<Utc>, AuthorityError> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| {
        AuthorityError::InvalidArgument(format!("timestamp {} out of range", timestamp))
    })
}

fn to_offset(at: DateTime<Utc>) -> Result<time::OffsetDateTime, AuthorityError> {
    time::OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| AuthorityError::InvalidArgument(format!("timestamp out of range: {}", e)))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Throwaway CA roots and CSRs.

    use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair};

    pub struct TestCa {
        pub cert_pem: String,
        pub cert_der: Vec<u8>,
        pub key_pem: String,
    }

    pub fn generate_ca(name: &str) -> TestCa {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name.push(DnType::CommonName, name);
        params.not_before = time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        params.not_after = time::OffsetDateTime::from_unix_timestamp(2_100_000_000).unwrap();
        let cert = params.self_signed(&key).unwrap();
        TestCa {
            cert_pem: cert.pem(),
            cert_der: cert.der().to_vec(),
            key_pem: key.serialize_pem(),
        }
    }

    pub fn generate_csr(common_name: Option<&str>) -> Vec<u8> {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name = DistinguishedName::new();
        if let Some(cn) = common_name {
            params.distinguished_name.push(DnType::CommonName, cn);
        }
        params.serialize_request(&key).unwrap().der().to_vec()
    }
}
