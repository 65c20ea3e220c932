// ============================================
// File: crates/argus-client/src/error.rs
// ============================================
//! # Agent Error Types
//!
//! ## Creation Reason
//! Defines the agent-side error taxonomy. The polling loop itself only
//! ever observes a small closed set of outcomes (success / retry /
//! enroll / fatal); these errors are what the fatal arm carries.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Cryptographic errors from `argus-core` never leak to the loop as-is;
//!   the communicator converts them into retry decisions first
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use argus_common::error::CommonError;
use argus_core::error::CoreError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================
// ClientError
// ============================================

/// Agent-side error types.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Protocol or cryptographic failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Shared primitive failure.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Connection-level transport failure (refused, timeout, DNS).
    #[error("Connection failed: {reason}")]
    Connection {
        /// What went wrong at the transport level
        reason: String,
    },

    /// The server's response claimed an unexpected source identity.
    #[error("Response from unexpected source '{claimed}'")]
    ServerIdentity {
        /// The identity name the response claimed
        claimed: String,
    },

    /// Too many consecutive connection failures; the loop gives up.
    ///
    /// Recovery is a process-level restart by the supervisor, not an
    /// internal retry.
    #[error("Giving up after {count} consecutive connection failures")]
    TooManyFailures {
        /// Number of consecutive failures observed
        count: u32,
    },

    /// Configuration could not be loaded.
    #[error("Failed to load config from '{path}': {reason}")]
    ConfigLoad {
        /// Path that was being read
        path: String,
        /// Why loading failed
        reason: String,
    },

    /// Configuration is structurally valid but semantically wrong.
    #[error("Invalid config field '{field}': {reason}")]
    ConfigInvalid {
        /// Offending field
        field: String,
        /// Why it is invalid
        reason: String,
    },
}

impl ClientError {
    /// Creates a `Connection` error.
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_wraps() {
        let err: ClientError = CoreError::NoServerCertificate.into();
        assert!(err.to_string().contains("server certificate"));
    }

    #[test]
    fn test_fatal_display() {
        let err = ClientError::TooManyFailures { count: 30 };
        assert!(err.to_string().contains("30"));
    }
}
