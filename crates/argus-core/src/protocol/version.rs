// ============================================
// File: crates/argus-core/src/protocol/version.rs
// ============================================
//! # Protocol Version
//!
//! ## Creation Reason
//! Centralizes the wire protocol version and its supported range so
//! compatibility checks live in one place.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Bump `CURRENT_PROTOCOL_VERSION` whenever the envelope layout changes
//! - Widen the supported range only with explicit migration tests
//!
//! ## Last Modified
//! v0.1.0 - Initial version definitions

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Current protocol version.
///
/// # Version 0x01 (Initial)
/// - RSA-2048 identities, AES-128-CBC bulk cipher, HMAC-SHA256
/// - Microsecond freshness nonces
/// - Optional zlib payload compression
pub const CURRENT_PROTOCOL_VERSION: u8 = 0x01;

/// Minimum supported protocol version.
pub const MIN_SUPPORTED_VERSION: u8 = 0x01;

/// Maximum supported protocol version.
pub const MAX_SUPPORTED_VERSION: u8 = 0x01;

// ============================================
// ProtocolVersion
// ============================================

/// Protocol version identifier.
///
/// # Example
/// ```
/// use argus_core::protocol::ProtocolVersion;
///
/// let version = ProtocolVersion::current();
/// assert!(version.is_supported());
/// assert!(!ProtocolVersion::new(0).is_supported());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(u8);

impl ProtocolVersion {
    /// Creates a new protocol version.
    #[must_use]
    pub const fn new(version: u8) -> Self {
        Self(version)
    }

    /// Returns the current protocol version.
    #[must_use]
    pub const fn current() -> Self {
        Self(CURRENT_PROTOCOL_VERSION)
    }

    /// Returns the raw version number.
    #[must_use]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Checks whether this version is within the supported range.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.0 >= MIN_SUPPORTED_VERSION && self.0 <= MAX_SUPPORTED_VERSION
    }

    /// Validates the version, returning an error when unsupported.
    ///
    /// # Errors
    /// Returns `UnsupportedVersion` outside the supported range.
    pub const fn validate(&self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(CoreError::UnsupportedVersion {
                got: self.0,
                min: MIN_SUPPORTED_VERSION,
                max: MAX_SUPPORTED_VERSION,
            })
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_supported() {
        assert!(ProtocolVersion::current().is_supported());
        assert!(ProtocolVersion::current().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(ProtocolVersion::new(0).validate().is_err());
        assert!(ProtocolVersion::new(0xFF).validate().is_err());
    }
}
