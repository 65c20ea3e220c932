// ============================================
// File: crates/argus-client/src/config.rs
// ============================================
//! # Agent Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the Argus agent, supporting
//! TOML files with per-section defaults and validation.
//!
//! ## Configuration Sections
//! - `transport`: control URLs (tried in order), request timeout
//! - `poll`: polling interval bounds, slew, error backoff, failure limit
//! - `queue`: outbound queue and post-size bounds
//! - `envelope`: payload compression mode
//! - `identity`: key and certificate file locations
//! - `logging`: log level
//!
//! ## Example Configuration
//! ```toml
//! [transport]
//! control_urls = ["https://fleet.example.com/control"]
//! request_timeout_secs = 60
//!
//! [poll]
//! poll_min_secs = 0.2
//! poll_max_secs = 600.0
//! poll_slew = 1.15
//! error_poll_min_secs = 15.0
//! connection_error_limit = 30
//!
//! [queue]
//! max_post_size = 2097152
//! max_out_queue = 1024
//!
//! [identity]
//! key_file = "/var/lib/argus/agent.key"
//! certificate_file = "/var/lib/argus/agent.crt"
//! server_certificate_file = "/var/lib/argus/server.crt"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require an agent restart
//! - `control_urls` order is the proxy fallback order; first reachable wins
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use argus_core::protocol::CompressionMode;
use argus_core::SealOptions;

use crate::error::{ClientError, Result};

// ============================================
// ClientConfig
// ============================================

/// Main agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Polling behaviour.
    #[serde(default)]
    pub poll: PollConfig,

    /// Outbound queue bounds.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Envelope parameters.
    #[serde(default)]
    pub envelope: EnvelopeConfig,

    /// Identity material locations.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigLoad` if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading agent configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ClientError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::config_load(&path_str, e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns `ConfigLoad`/`ConfigInvalid` on parse or validation failure.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.transport.validate()?;
        self.poll.validate()?;
        self.queue.validate()?;
        Ok(())
    }

    /// Returns the sealing options derived from this configuration.
    #[must_use]
    pub fn seal_options(&self) -> SealOptions {
        SealOptions {
            compression: self.envelope.compression,
            max_payload: self.queue.max_post_size,
        }
    }
}

// ============================================
// TransportConfig
// ============================================

/// Transport configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Control URLs, tried in order until one is reachable.
    #[serde(default = "default_control_urls")]
    pub control_urls: Vec<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_control_urls() -> Vec<String> {
    vec!["http://127.0.0.1:8080/control".to_string()]
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl TransportConfig {
    fn validate(&self) -> Result<()> {
        if self.control_urls.is_empty() {
            return Err(ClientError::config_invalid(
                "transport.control_urls",
                "at least one control URL is required",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::config_invalid(
                "transport.request_timeout_secs",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Returns the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            control_urls: default_control_urls(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// ============================================
// PollConfig
// ============================================

/// Polling behaviour section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Minimum polling interval in seconds (fast-poll floor).
    #[serde(default = "default_poll_min_secs")]
    pub poll_min_secs: f64,

    /// Maximum polling interval in seconds (idle ceiling).
    #[serde(default = "default_poll_max_secs")]
    pub poll_max_secs: f64,

    /// Multiplicative growth factor applied while idle.
    #[serde(default = "default_poll_slew")]
    pub poll_slew: f64,

    /// Fixed retry interval after a transient failure, in seconds.
    ///
    /// Deliberately NOT exponential: reconnection should stay snappy.
    #[serde(default = "default_error_poll_min_secs")]
    pub error_poll_min_secs: f64,

    /// Consecutive connection failures tolerated before giving up.
    #[serde(default = "default_connection_error_limit")]
    pub connection_error_limit: u32,
}

fn default_poll_min_secs() -> f64 {
    0.2
}

fn default_poll_max_secs() -> f64 {
    600.0
}

fn default_poll_slew() -> f64 {
    1.15
}

fn default_error_poll_min_secs() -> f64 {
    15.0
}

fn default_connection_error_limit() -> u32 {
    30
}

impl PollConfig {
    fn validate(&self) -> Result<()> {
        if self.poll_min_secs <= 0.0 {
            return Err(ClientError::config_invalid(
                "poll.poll_min_secs",
                "must be positive",
            ));
        }
        if self.poll_max_secs < self.poll_min_secs {
            return Err(ClientError::config_invalid(
                "poll.poll_max_secs",
                "must be at least poll_min_secs",
            ));
        }
        if self.poll_slew <= 1.0 {
            return Err(ClientError::config_invalid(
                "poll.poll_slew",
                "must be greater than 1.0",
            ));
        }
        if self.connection_error_limit == 0 {
            return Err(ClientError::config_invalid(
                "poll.connection_error_limit",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Returns the minimum polling interval.
    #[must_use]
    pub fn poll_min(&self) -> Duration {
        Duration::from_secs_f64(self.poll_min_secs)
    }

    /// Returns the maximum polling interval.
    #[must_use]
    pub fn poll_max(&self) -> Duration {
        Duration::from_secs_f64(self.poll_max_secs)
    }

    /// Returns the fixed error retry interval.
    #[must_use]
    pub fn error_poll_min(&self) -> Duration {
        Duration::from_secs_f64(self.error_poll_min_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_min_secs: default_poll_min_secs(),
            poll_max_secs: default_poll_max_secs(),
            poll_slew: default_poll_slew(),
            error_poll_min_secs: default_error_poll_min_secs(),
            connection_error_limit: default_connection_error_limit(),
        }
    }
}

// ============================================
// QueueConfig
// ============================================

/// Outbound queue bounds section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum serialized payload per POST, in bytes.
    #[serde(default = "default_max_post_size")]
    pub max_post_size: usize,

    /// Maximum number of queued outbound messages.
    #[serde(default = "default_max_out_queue")]
    pub max_out_queue: usize,
}

fn default_max_post_size() -> usize {
    2 * 1024 * 1024
}

fn default_max_out_queue() -> usize {
    1024
}

impl QueueConfig {
    fn validate(&self) -> Result<()> {
        if self.max_post_size == 0 {
            return Err(ClientError::config_invalid(
                "queue.max_post_size",
                "must be positive",
            ));
        }
        if self.max_out_queue == 0 {
            return Err(ClientError::config_invalid(
                "queue.max_out_queue",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_post_size: default_max_post_size(),
            max_out_queue: default_max_out_queue(),
        }
    }
}

// ============================================
// EnvelopeConfig
// ============================================

/// Envelope parameters section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    /// Payload compression mode.
    #[serde(default)]
    pub compression: CompressionMode,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            compression: CompressionMode::default(),
        }
    }
}

// ============================================
// IdentityConfig
// ============================================

/// Identity material locations section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// PKCS#8 PEM private key; generated on first run if absent.
    #[serde(default = "default_key_file")]
    pub key_file: String,

    /// Certificate issued at enrollment, stored beside the key.
    #[serde(default = "default_certificate_file")]
    pub certificate_file: String,

    /// The server's certificate, shipped with the agent.
    #[serde(default = "default_server_certificate_file")]
    pub server_certificate_file: String,
}

fn default_key_file() -> String {
    "/var/lib/argus/agent.key".to_string()
}

fn default_certificate_file() -> String {
    "/var/lib/argus/agent.crt".to_string()
}

fn default_server_certificate_file() -> String {
    "/var/lib/argus/server.crt".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
            certificate_file: default_certificate_file(),
            server_certificate_file: default_server_certificate_file(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "argus_client=debug").
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
