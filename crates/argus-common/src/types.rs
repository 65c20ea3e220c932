// ============================================
// File: crates/argus-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes fundamental identifier and enum definitions used throughout
//! the Argus fleet-communication protocol, ensuring type safety and
//! consistent representations.
//!
//! ## Main Functionality
//! - `ClientId`: Unique client identity name derived from its public key
//! - `SessionId`: Opaque name of a message stream (flow/queue)
//! - `AuthState`: Authentication classification for decoded messages
//! - `Priority`: Delivery priority for queued messages
//!
//! ## Main Logical Flow
//! 1. Identifiers are created during enrollment or message construction
//! 2. Used as keys in caches, queues, and stores
//! 3. Serialized into the wire envelope
//!
//! ## ⚠️ Important Note for Next Developer
//! - A ClientId is DERIVED from the client's public key; never invent one
//! - SessionId values beginning with `control/` are reserved for the
//!   protocol itself (see [`ENROLLMENT_SESSION_ID`])
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Prefix of every client identity name.
pub const CLIENT_ID_PREFIX: &str = "C.";

/// Number of hex characters following the prefix.
pub const CLIENT_ID_HEX_LEN: usize = 16;

/// Well-known session id used for enrollment control messages.
///
/// Messages on this session are processed by the server even when the
/// sending client's certificate is not yet known.
pub const ENROLLMENT_SESSION_ID: &str = "control/enrollment";

/// Action name carried by a client's enrollment signing request.
pub const ENROLL_REQUEST_ACTION: &str = "enroll_request";

/// Action name carried by the server's issued-certificate response.
pub const ENROLL_CERTIFICATE_ACTION: &str = "enroll_certificate";

// ============================================
// ClientId
// ============================================

/// Unique identity name of a client.
///
/// # Format
/// `C.` followed by 16 lowercase hex characters, deterministically derived
/// from the client's public key (first 8 bytes of the SHA-256 digest of the
/// DER-encoded key). Because the name is a pure function of the key,
/// identity and authentication collapse to "does this key's derived name
/// match the claimed name".
///
/// # Example
/// ```
/// use argus_common::types::ClientId;
///
/// let id: ClientId = "C.0011223344556677".parse().unwrap();
/// assert_eq!(id.as_str(), "C.0011223344556677");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Creates a client id from a raw string, validating the format.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the string is not `C.` + 16 hex chars.
    pub fn new(name: impl Into<String>) -> Result<Self, CommonError> {
        let name = name.into();
        let Some(hex_part) = name.strip_prefix(CLIENT_ID_PREFIX) else {
            return Err(CommonError::invalid_input(
                "client_id",
                format!("must start with '{CLIENT_ID_PREFIX}'"),
            ));
        };
        if hex_part.len() != CLIENT_ID_HEX_LEN {
            return Err(CommonError::invalid_input(
                "client_id",
                format!("expected {CLIENT_ID_HEX_LEN} hex chars after prefix"),
            ));
        }
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
            return Err(CommonError::invalid_input(
                "client_id",
                "expected lowercase hex characters",
            ));
        }
        Ok(Self(name))
    }

    /// Builds a client id from the 8-byte key digest prefix.
    #[must_use]
    pub fn from_digest_prefix(prefix: [u8; 8]) -> Self {
        let mut name = String::with_capacity(CLIENT_ID_PREFIX.len() + CLIENT_ID_HEX_LEN);
        name.push_str(CLIENT_ID_PREFIX);
        for byte in prefix {
            use fmt::Write;
            let _ = write!(name, "{byte:02x}");
        }
        Self(name)
    }

    /// Returns the identity name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ClientId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================
// SessionId
// ============================================

/// Opaque name of a message stream (a flow or queue).
///
/// Insertion into an envelope does not interpret the value; only the
/// receiving dispatch layer gives it meaning. The single exception is the
/// reserved [`ENROLLMENT_SESSION_ID`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session id from a raw string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The well-known enrollment session id.
    #[must_use]
    pub fn enrollment() -> Self {
        Self(ENROLLMENT_SESSION_ID.to_string())
    }

    /// Returns the session name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks whether this is the reserved enrollment session.
    #[must_use]
    pub fn is_enrollment(&self) -> bool {
        self.0 == ENROLLMENT_SESSION_ID
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================
// AuthState
// ============================================

/// Authentication classification stamped on every decoded message.
///
/// # Values
/// | Value | Meaning |
/// |-------|---------|
/// | 0x00  | Unauthenticated - source identity could not be verified |
/// | 0x01  | Authenticated - verified source, fresh envelope |
/// | 0x02  | Desynchronized - verified source, stale freshness nonce |
///
/// A message is never `Authenticated` unless the envelope's signature and
/// HMAC checks passed; the freshness comparison only refines the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AuthState {
    /// Source identity could not be verified.
    #[default]
    Unauthenticated = 0x00,
    /// Verified source and fresh envelope.
    Authenticated = 0x01,
    /// Verified source but the freshness nonce regressed beyond tolerance.
    Desynchronized = 0x02,
}

impl AuthState {
    /// Converts a byte to an `AuthState`.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Unauthenticated),
            0x01 => Some(Self::Authenticated),
            0x02 => Some(Self::Desynchronized),
            _ => None,
        }
    }

    /// Converts the `AuthState` to its byte representation.
    #[must_use]
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "UNAUTHENTICATED"),
            Self::Authenticated => write!(f, "AUTHENTICATED"),
            Self::Desynchronized => write!(f, "DESYNCHRONIZED"),
        }
    }
}

// ============================================
// Priority
// ============================================

/// Delivery priority for a queued message.
///
/// `High` priority messages request low latency: the agent switches to
/// fast polling for the next cycle when one is queued or received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    /// Background traffic, no latency requirement.
    Low = 0x00,
    /// Normal traffic.
    #[default]
    Medium = 0x01,
    /// Latency-sensitive traffic; triggers fast polling.
    High = 0x02,
}

impl Priority {
    /// Converts a byte to a `Priority`.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Low),
            0x01 => Some(Self::Medium),
            0x02 => Some(Self::High),
            _ => None,
        }
    }

    /// Converts the `Priority` to its byte representation.
    #[must_use]
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_valid() {
        let id = ClientId::new("C.0123456789abcdef").unwrap();
        assert_eq!(id.as_str(), "C.0123456789abcdef");
    }

    #[test]
    fn test_client_id_rejects_bad_prefix() {
        assert!(ClientId::new("X.0123456789abcdef").is_err());
        assert!(ClientId::new("0123456789abcdef").is_err());
    }

    #[test]
    fn test_client_id_rejects_bad_length() {
        assert!(ClientId::new("C.0123").is_err());
        assert!(ClientId::new("C.0123456789abcdef00").is_err());
    }

    #[test]
    fn test_client_id_rejects_uppercase() {
        assert!(ClientId::new("C.0123456789ABCDEF").is_err());
    }

    #[test]
    fn test_client_id_from_digest_prefix() {
        let id = ClientId::from_digest_prefix([0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        assert_eq!(id.as_str(), "C.0011223344556677");
        // Derived names always re-validate
        assert!(ClientId::new(id.as_str()).is_ok());
    }

    #[test]
    fn test_session_id_enrollment() {
        let session = SessionId::enrollment();
        assert!(session.is_enrollment());
        assert!(!SessionId::new("flows/F:1234").is_enrollment());
    }

    #[test]
    fn test_auth_state_byte_roundtrip() {
        for state in [
            AuthState::Unauthenticated,
            AuthState::Authenticated,
            AuthState::Desynchronized,
        ] {
            assert_eq!(AuthState::from_byte(state.as_byte()), Some(state));
        }
        assert_eq!(AuthState::from_byte(0xFF), None);
    }

    #[test]
    fn test_priority_byte_roundtrip() {
        for priority in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::from_byte(priority.as_byte()), Some(priority));
        }
        assert_eq!(Priority::from_byte(0x7F), None);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_client_id_serde() {
        let id = ClientId::new("C.0123456789abcdef").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"C.0123456789abcdef\"");
        let restored: ClientId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, restored);
    }
}
