// ============================================
// File: crates/argus-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the Argus fleet server,
//! supporting TOML files with per-section defaults and validation.
//!
//! ## Configuration Sections
//! - `network`: HTTP listen address
//! - `identity`: CA and server key/certificate locations
//! - `limits`: envelope size, cache bounds, freshness tolerance
//! - `enrollment`: issuance policy
//! - `envelope`: response compression
//! - `logging`: log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "0.0.0.0:8080"
//!
//! [identity]
//! ca_key_file = "/etc/argus/ca.key"
//! server_key_file = "/etc/argus/server.key"
//! server_certificate_file = "/etc/argus/server.crt"
//!
//! [limits]
//! freshness_tolerance_secs = 3600
//! identity_cache_capacity = 1024
//!
//! [enrollment]
//! certificate_validity_days = 365
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `freshness_tolerance_secs` is security policy, not tuning; tests pin
//!   the default and changes need a deliberate decision
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use argus_core::protocol::CompressionMode;
use argus_core::SealOptions;

use crate::error::{Result, ServerError};

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Identity material locations.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Resource and policy limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Enrollment policy.
    #[serde(default)]
    pub enrollment: EnrollmentConfig,

    /// Envelope parameters.
    #[serde(default)]
    pub envelope: EnvelopeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigLoad` if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading server configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns `ConfigLoad`/`ConfigInvalid` on parse or validation failure.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        self.enrollment.validate()?;
        Ok(())
    }

    /// Returns the sealing options derived from this configuration.
    #[must_use]
    pub fn seal_options(&self) -> SealOptions {
        SealOptions {
            compression: self.envelope.compression,
            max_payload: self.limits.max_envelope_size,
        }
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// HTTP listen address for the control endpoint.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default listen addr")
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

// ============================================
// IdentityConfig
// ============================================

/// Identity material locations section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// CA private key (PKCS#8 PEM); signs client certificates.
    #[serde(default = "default_ca_key_file")]
    pub ca_key_file: String,

    /// Server private key (PKCS#8 PEM).
    #[serde(default = "default_server_key_file")]
    pub server_key_file: String,

    /// Server certificate, distributed to agents.
    #[serde(default = "default_server_certificate_file")]
    pub server_certificate_file: String,
}

fn default_ca_key_file() -> String {
    "/etc/argus/ca.key".to_string()
}

fn default_server_key_file() -> String {
    "/etc/argus/server.key".to_string()
}

fn default_server_certificate_file() -> String {
    "/etc/argus/server.crt".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            ca_key_file: default_ca_key_file(),
            server_key_file: default_server_key_file(),
            server_certificate_file: default_server_certificate_file(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource and policy limits section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted envelope payload size in bytes.
    #[serde(default = "default_max_envelope_size")]
    pub max_envelope_size: usize,

    /// Maximum serialized response payload per poll, in bytes.
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,

    /// Nonce regression tolerated before messages are marked
    /// DESYNCHRONIZED, in seconds.
    #[serde(default = "default_freshness_tolerance_secs")]
    pub freshness_tolerance_secs: u64,

    /// Identity→public-key cache capacity (entries).
    #[serde(default = "default_identity_cache_capacity")]
    pub identity_cache_capacity: usize,

    /// Identity cache entry TTL in seconds.
    #[serde(default = "default_identity_cache_ttl_secs")]
    pub identity_cache_ttl_secs: u64,

    /// Freshness-state cache capacity (entries).
    #[serde(default = "default_sequencer_capacity")]
    pub sequencer_capacity: usize,

    /// Freshness-state entry TTL in seconds.
    #[serde(default = "default_sequencer_ttl_secs")]
    pub sequencer_ttl_secs: u64,

    /// Per-client outbound queue bound (messages).
    #[serde(default = "default_max_client_outbox")]
    pub max_client_outbox: usize,
}

fn default_max_envelope_size() -> usize {
    2 * 1024 * 1024
}

fn default_max_response_size() -> usize {
    2 * 1024 * 1024
}

fn default_freshness_tolerance_secs() -> u64 {
    3600
}

fn default_identity_cache_capacity() -> usize {
    1024
}

fn default_identity_cache_ttl_secs() -> u64 {
    3600
}

fn default_sequencer_capacity() -> usize {
    4096
}

fn default_sequencer_ttl_secs() -> u64 {
    24 * 3600
}

fn default_max_client_outbox() -> usize {
    1024
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_envelope_size == 0 {
            return Err(ServerError::config_invalid(
                "limits.max_envelope_size",
                "must be positive",
            ));
        }
        if self.identity_cache_capacity == 0 || self.sequencer_capacity == 0 {
            return Err(ServerError::config_invalid(
                "limits.*_capacity",
                "cache capacities must be positive",
            ));
        }
        Ok(())
    }

    /// Returns the freshness tolerance as a `Duration`.
    #[must_use]
    pub fn freshness_tolerance(&self) -> Duration {
        Duration::from_secs(self.freshness_tolerance_secs)
    }

    /// Returns the identity cache TTL as a `Duration`.
    #[must_use]
    pub fn identity_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.identity_cache_ttl_secs)
    }

    /// Returns the sequencer TTL as a `Duration`.
    #[must_use]
    pub fn sequencer_ttl(&self) -> Duration {
        Duration::from_secs(self.sequencer_ttl_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_envelope_size: default_max_envelope_size(),
            max_response_size: default_max_response_size(),
            freshness_tolerance_secs: default_freshness_tolerance_secs(),
            identity_cache_capacity: default_identity_cache_capacity(),
            identity_cache_ttl_secs: default_identity_cache_ttl_secs(),
            sequencer_capacity: default_sequencer_capacity(),
            sequencer_ttl_secs: default_sequencer_ttl_secs(),
            max_client_outbox: default_max_client_outbox(),
        }
    }
}

// ============================================
// EnrollmentConfig
// ============================================

/// Enrollment policy section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentConfig {
    /// Validity of issued client certificates in days.
    #[serde(default = "default_certificate_validity_days")]
    pub certificate_validity_days: u64,

    /// Optional allowlist of client names permitted to enroll.
    /// Absent means any structurally valid request is accepted.
    #[serde(default)]
    pub allowlist: Option<Vec<String>>,
}

fn default_certificate_validity_days() -> u64 {
    365
}

impl EnrollmentConfig {
    fn validate(&self) -> Result<()> {
        if self.certificate_validity_days == 0 {
            return Err(ServerError::config_invalid(
                "enrollment.certificate_validity_days",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Returns the certificate validity as a `Duration`.
    #[must_use]
    pub fn certificate_validity(&self) -> Duration {
        Duration::from_secs(self.certificate_validity_days * 24 * 3600)
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            certificate_validity_days: default_certificate_validity_days(),
            allowlist: None,
        }
    }
}

// ============================================
// EnvelopeConfig
// ============================================

/// Envelope parameters section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Response payload compression mode.
    #[serde(default)]
    pub compression: CompressionMode,
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "argus_server=debug").
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================
