// ============================================
// File: crates/argus-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Creation Reason
//! Defines server-side error types. The HTTP handler maps these onto the
//! small status-code surface (200/400/406/500); nothing else leaks out.
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use argus_common::error::CommonError;
use argus_core::error::CoreError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

// ============================================
// ServerError
// ============================================

/// Server-side error types.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Protocol or cryptographic failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Shared primitive failure.
    #[error(transparent)]
    Common(#[from] CommonError),

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

    /// Identity material could not be loaded at startup.
    #[error("Failed to load identity material from '{path}': {reason}")]
    IdentityLoad {
        /// Path that was being read
        path: String,
        /// Why loading failed
        reason: String,
    },

    /// No public key is known for a client a response was addressed to.
    #[error("No key known for client '{client_id}'")]
    UnknownClient {
        /// The client the response was meant for
        client_id: String,
    },
}

impl ServerError {
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

    /// Creates an `IdentityLoad` error.
    pub fn identity_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IdentityLoad {
            path: path.into(),
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
        let err: ServerError = CoreError::Integrity.into();
        assert!(err.to_string().contains("Integrity"));
    }
}
