// ============================================
// File: crates/argus-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines the closed error taxonomy for protocol and cryptographic
//! operations. Callers branch on these variants to decide retry versus
//! enrollment versus drop, so the distinctions are load-bearing:
//! "could not parse" is never conflated with "parsed but failed crypto".
//!
//! ## Main Functionality
//! - `CoreError`: Error enum for envelope, cipher, and identity operations
//! - `Result<T>`: Type alias using `CoreError`
//! - Classification helpers (`is_structural`, `is_cryptographic`)
//!
//! ## ⚠️ Important Note for Next Developer
//! - Error messages must never include key material or plaintext
//! - A structural failure means the bytes were rejected before any
//!   cryptographic processing; keep that property when adding variants
//!
//! ## Last Modified
//! v0.1.0 - Initial error taxonomy

use thiserror::Error;

use argus_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol and cryptographic operations.
///
/// # Security Note
/// Error messages are designed to be informative for debugging
/// without revealing sensitive information like key material.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Failed to generate cryptographic key.
    #[error("Key generation failed: {context}")]
    KeyGeneration {
        /// What key was being generated
        context: String,
    },

    /// Signature verification failed.
    #[error("Signature verification failed")]
    SignatureVerification,

    /// Signature creation failed.
    #[error("Failed to create signature: {reason}")]
    SignatureCreation {
        /// Why signing failed
        reason: String,
    },

    /// Unwrapping the symmetric key material failed.
    #[error("Key unwrap failed: {reason}")]
    KeyUnwrap {
        /// Why the asymmetric unwrap failed
        reason: String,
    },

    /// HMAC verification over the ciphertext failed.
    #[error("Integrity check failed: HMAC mismatch")]
    Integrity,

    /// Block cipher padding was malformed after decryption.
    #[error("Decryption failed: invalid padding")]
    Padding,

    /// Encryption operation failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What was being encrypted
        context: String,
    },

    // ========================================
    // Structural Errors
    // ========================================

    /// Envelope bytes are malformed or inconsistent.
    #[error("Malformed envelope: {reason}")]
    MalformedEnvelope {
        /// What's wrong with the envelope
        reason: String,
    },

    /// Envelope is too short to be valid.
    #[error("Envelope too short: expected at least {expected} bytes, got {actual}")]
    EnvelopeTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Serialized payload exceeds the configured maximum.
    #[error("Payload too large: max {max} bytes, got {actual}")]
    PayloadTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size produced
        actual: usize,
    },

    /// Compression or decompression failed.
    #[error("Compression error: {reason}")]
    Compression {
        /// What went wrong
        reason: String,
    },

    /// Protocol version outside the supported range.
    #[error("Unsupported protocol version: {got}, supported {min}..={max}")]
    UnsupportedVersion {
        /// Version received
        got: u8,
        /// Minimum supported version
        min: u8,
        /// Maximum supported version
        max: u8,
    },

    // ========================================
    // Identity Errors
    // ========================================

    /// Certificate or signing request failed validation.
    #[error("Invalid certificate: {reason}")]
    CertificateInvalid {
        /// Why validation failed
        reason: String,
    },

    /// No server certificate has been loaded yet.
    #[error("No server certificate loaded")]
    NoServerCertificate,

    /// Wrapped common error.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `KeyGeneration` error.
    pub fn key_generation(context: impl Into<String>) -> Self {
        Self::KeyGeneration {
            context: context.into(),
        }
    }

    /// Creates a `SignatureCreation` error.
    pub fn signature_creation(reason: impl Into<String>) -> Self {
        Self::SignatureCreation {
            reason: reason.into(),
        }
    }

    /// Creates a `KeyUnwrap` error.
    pub fn key_unwrap(reason: impl Into<String>) -> Self {
        Self::KeyUnwrap {
            reason: reason.into(),
        }
    }

    /// Creates an `Encryption` error.
    pub fn encryption(context: impl Into<String>) -> Self {
        Self::Encryption {
            context: context.into(),
        }
    }

    /// Creates a `MalformedEnvelope` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    /// Creates an `EnvelopeTooShort` error.
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::EnvelopeTooShort { expected, actual }
    }

    /// Creates a `PayloadTooLarge` error.
    pub const fn payload_too_large(max: usize, actual: usize) -> Self {
        Self::PayloadTooLarge { max, actual }
    }

    /// Creates a `Compression` error.
    pub fn compression(reason: impl Into<String>) -> Self {
        Self::Compression {
            reason: reason.into(),
        }
    }

    /// Creates a `CertificateInvalid` error.
    pub fn certificate_invalid(reason: impl Into<String>) -> Self {
        Self::CertificateInvalid {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if the bytes were rejected before any crypto ran.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MalformedEnvelope { .. }
                | Self::EnvelopeTooShort { .. }
                | Self::UnsupportedVersion { .. }
        )
    }

    /// Returns `true` if the failure was cryptographic.
    ///
    /// Cryptographic failures are treated as potential tampering: the
    /// envelope is dropped and never retried verbatim.
    #[must_use]
    pub const fn is_cryptographic(&self) -> bool {
        matches!(
            self,
            Self::SignatureVerification
                | Self::KeyUnwrap { .. }
                | Self::Integrity
                | Self::Padding
        )
    }
}

// ============================================
// Tests
// ============================================
