// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Authority Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing one
// authority node:
// - Certificate authority roots (one per category)
// - Backing store selection
// - Certificate issuance and garbage collection
// - Authorization middleware settings
// - Network and observability settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "sentinel.io/v1";
pub const KIND: &str = "AuthorityConfig";

/// Top-level authority configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfigManifest {
    /// API version (must be "sentinel.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "AuthorityConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: AuthorityConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfigSpec {
    /// CA roots, one per category
    pub certificate_authorities: Vec<CertificateAuthorityConfig>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub certificates: CertificatesConfig,

    #[serde(default)]
    pub authorization: AuthorizationConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateAuthorityConfig {
    /// Category name, e.g. "default" or "vpn"
    pub category: String,

    /// CA certificate, DER or PEM
    pub cert_path: PathBuf,

    /// CA private key, PEM (PKCS#8)
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// PostgreSQL connection string (required for the postgres backend)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
}

impl StorageConfig {
    pub fn to_backend(&self) -> anyhow::Result<StorageBackend> {
        match self.backend {
            StorageBackendKind::InMemory => Ok(StorageBackend::InMemory),
            StorageBackendKind::Postgres => {
                let connection_string = self
                    .connection_string
                    .clone()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        anyhow::anyhow!("spec.storage.connection_string is required for postgres")
                    })?;
                Ok(StorageBackend::PostgreSQL(PostgresConfig { connection_string }))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificatesConfig {
    /// Attempts at drawing an unused random serial number
    #[serde(default = "default_serial_number_trials")]
    pub serial_number_trials: u32,

    #[serde(default)]
    pub garbage_collection: GarbageCollectionConfig,
}

impl Default for CertificatesConfig {
    fn default() -> Self {
        Self {
            serial_number_trials: default_serial_number_trials(),
            garbage_collection: GarbageCollectionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarbageCollectionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time between sweeps
    #[serde(default = "default_gc_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// How long past `not_after` a record is kept
    #[serde(default = "default_gc_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,
}

impl Default for GarbageCollectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_gc_interval(),
            grace_period: default_gc_grace_period(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    /// Header carrying the client certificate serial, set by the TLS terminator
    #[serde(default = "default_serial_header")]
    pub client_cert_serial_header: String,

    /// Path prefixes whose read-only requests skip target resolution
    #[serde(default = "default_static_path_prefixes")]
    pub static_path_prefixes: Vec<String>,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            client_cert_serial_header: default_serial_header(),
            static_path_prefixes: default_static_path_prefixes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus exposition
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_serial_number_trials() -> u32 {
    3
}

fn default_gc_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_gc_grace_period() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_serial_header() -> String {
    "x-client-cert-serial".to_string()
}

fn default_static_path_prefixes() -> Vec<String> {
    vec!["v1/ca".to_string()]
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    9443
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for AuthorityConfigSpec {
    fn default() -> Self {
        Self {
            certificate_authorities: vec![CertificateAuthorityConfig {
                category: "default".to_string(),
                cert_path: PathBuf::from("/etc/sentinel/pki/default.crt"),
                key_path: PathBuf::from("/etc/sentinel/pki/default.key.pem"),
            }],
            storage: StorageConfig::default(),
            certificates: CertificatesConfig::default(),
            authorization: AuthorizationConfig::default(),
            network: NetworkConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for AuthorityConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "sentinel".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: AuthorityConfigSpec::default(),
        }
    }
}

impl AuthorityConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SENTINEL_CONFIG_PATH environment variable
    /// 2. ./sentinel-config.yaml (working directory)
    /// 3. ~/.sentinel/config.yaml (user home)
    /// 4. /etc/sentinel/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SENTINEL_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./sentinel-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".sentinel").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/sentinel/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SENTINEL_DATABASE_URL") {
            if !url.is_empty() {
                tracing::info!("Environment override: SENTINEL_DATABASE_URL (postgres backend)");
                self.spec.storage.backend = StorageBackendKind::Postgres;
                self.spec.storage.connection_string = Some(url);
            }
        }

        if let Ok(val) = std::env::var("SENTINEL_GC_GRACE_PERIOD") {
            match humantime_serde::re::humantime::parse_duration(&val) {
                Ok(grace) => {
                    tracing::info!("Environment override: SENTINEL_GC_GRACE_PERIOD={}", val);
                    self.spec.certificates.garbage_collection.grace_period = grace;
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid value for SENTINEL_GC_GRACE_PERIOD: '{}' ({}). Ignoring.",
                        val,
                        e
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.certificate_authorities.is_empty() {
            anyhow::bail!("spec.certificate_authorities must list at least one CA");
        }

        let mut seen = HashSet::new();
        for ca in &self.spec.certificate_authorities {
            if ca.category.is_empty() {
                anyhow::bail!("CA category cannot be empty");
            }
            if !seen.insert(ca.category.as_str()) {
                anyhow::bail!("Duplicate CA category: '{}'", ca.category);
            }
        }

        self.spec.storage.to_backend()?;

        if self.spec.certificates.serial_number_trials == 0 {
            anyhow::bail!("spec.certificates.serial_number_trials must be greater than zero");
        }

        let gc = &self.spec.certificates.garbage_collection;
        if gc.enabled && gc.interval.is_zero() {
            anyhow::bail!("spec.certificates.garbage_collection.interval must be non-zero");
        }

        if self.spec.authorization.client_cert_serial_header.trim().is_empty() {
            anyhow::bail!("spec.authorization.client_cert_serial_header cannot be empty");
        }

        match self.spec.observability.logging.format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("Invalid log format: '{}'. Must be 'text' or 'json'", other),
        }

        Ok(())
    }
}
