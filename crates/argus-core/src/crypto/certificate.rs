// ============================================
// File: crates/argus-core/src/crypto/certificate.rs
// ============================================
//! # Certificates and Signing Requests
//!
//! ## Creation Reason
//! Provides the compact certificate format binding an identity name to an
//! RSA public key, and the self-signed signing request a client submits
//! during enrollment.
//!
//! ## Main Functionality
//! - `Certificate`: issuer-signed {subject, key, validity} record
//! - `SigningRequest`: self-signed enrollment request
//! - Canonical binary encoding shared by signing and transport
//!
//! ## Trust Model
//! ```text
//! CA identity ──signs──► server certificate
//!      │
//!      └──────signs──► client certificates (issued at enrollment)
//!
//! A client's subject name is DERIVED from its public key, so a
//! certificate is valid only if subject == derive(subject_public_key).
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The canonical encoding feeds the issuer signature; any change to
//!   field order or width invalidates every certificate in the fleet
//! - Validity times are epoch MICROSECONDS, matching envelope nonces
//!
//! ## Last Modified
//! v0.1.0 - Initial certificate implementation

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use argus_common::time::Timestamp;
use argus_common::types::ClientId;

use crate::crypto::keys::{IdentityKeyPair, IdentityPublicKey};
use crate::error::{CoreError, Result};
use crate::protocol::codec::{get_i64_le, get_string, get_u64_le, get_u8, get_vec, put_string, put_vec};

// ============================================
// Constants
// ============================================

/// Certificate format version.
const CERTIFICATE_FORMAT_VERSION: u8 = 0x01;

/// Signing request format version.
const REQUEST_FORMAT_VERSION: u8 = 0x01;

// ============================================
// Certificate
// ============================================

/// An issuer-signed binding of an identity name to an RSA public key.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use argus_core::crypto::{Certificate, IdentityKeyPair};
///
/// let ca = IdentityKeyPair::generate().unwrap();
/// let subject_key = IdentityKeyPair::generate().unwrap();
/// let cert = Certificate::issue(
///     "server",
///     &subject_key.public_key(),
///     "ca",
///     &ca,
///     1,
///     Duration::from_secs(365 * 24 * 3600),
/// ).unwrap();
/// cert.verify(&ca.public_key(), argus_common::time::Timestamp::now()).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Subject common name.
    pub subject: String,
    /// Issuer common name.
    pub issuer: String,
    /// Issuer-assigned serial number.
    pub serial: u64,
    /// Start of the validity window.
    pub not_before: Timestamp,
    /// End of the validity window.
    pub not_after: Timestamp,
    /// DER-encoded subject public key.
    pub public_key_der: Vec<u8>,
    /// Issuer RSA-PKCS1v15-SHA256 signature over the canonical encoding.
    pub signature: Vec<u8>,
}

impl Certificate {
    /// Issues a certificate for `subject_key`, signed by `issuer_keypair`.
    ///
    /// # Errors
    /// Returns `KeyGeneration`/`SignatureCreation` on encoding or signing
    /// failure.
    pub fn issue(
        subject: impl Into<String>,
        subject_key: &IdentityPublicKey,
        issuer: impl Into<String>,
        issuer_keypair: &IdentityKeyPair,
        serial: u64,
        validity: Duration,
    ) -> Result<Self> {
        let not_before = Timestamp::now();
        let not_after = not_before.saturating_add_micros(validity.as_micros() as i64);
        let mut cert = Self {
            subject: subject.into(),
            issuer: issuer.into(),
            serial,
            not_before,
            not_after,
            public_key_der: subject_key.to_der()?,
            signature: Vec::new(),
        };
        cert.signature = issuer_keypair.sign(&cert.sign_data())?;
        Ok(cert)
    }

    /// Returns the canonical bytes the issuer signature covers.
    #[must_use]
    pub fn sign_data(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(CERTIFICATE_FORMAT_VERSION);
        put_string(&mut buf, &self.subject);
        put_string(&mut buf, &self.issuer);
        buf.put_u64_le(self.serial);
        buf.put_i64_le(self.not_before.as_micros());
        buf.put_i64_le(self.not_after.as_micros());
        put_vec(&mut buf, &self.public_key_der);
        buf.to_vec()
    }

    /// Verifies the issuer signature and the validity window at `now`.
    ///
    /// # Errors
    /// - `SignatureVerification`: the issuer signature does not match
    /// - `CertificateInvalid`: outside the validity window
    pub fn verify(&self, issuer_key: &IdentityPublicKey, now: Timestamp) -> Result<()> {
        issuer_key.verify(&self.sign_data(), &self.signature)?;
        if now < self.not_before || now > self.not_after {
            return Err(CoreError::certificate_invalid(format!(
                "outside validity window (serial {})",
                self.serial
            )));
        }
        Ok(())
    }

    /// Returns the subject public key.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` if the embedded DER is unparsable.
    pub fn public_key(&self) -> Result<IdentityPublicKey> {
        IdentityPublicKey::from_der(&self.public_key_der)
    }

    /// Serializes the certificate (including signature) to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(&self.sign_data());
        put_vec(&mut buf, &self.signature);
        buf.to_vec()
    }

    /// Deserializes a certificate from bytes.
    ///
    /// # Errors
    /// Returns structural errors on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let format = get_u8(&mut buf)?;
        if format != CERTIFICATE_FORMAT_VERSION {
            return Err(CoreError::certificate_invalid(format!(
                "unknown certificate format 0x{format:02x}"
            )));
        }
        let subject = get_string(&mut buf)?;
        let issuer = get_string(&mut buf)?;
        let serial = get_u64_le(&mut buf)?;
        let not_before = Timestamp::from_micros(get_i64_le(&mut buf)?);
        let not_after = Timestamp::from_micros(get_i64_le(&mut buf)?);
        let public_key_der = get_vec(&mut buf)?;
        let signature = get_vec(&mut buf)?;
        if buf.has_remaining() {
            return Err(CoreError::certificate_invalid("trailing bytes"));
        }
        Ok(Self {
            subject,
            issuer,
            serial,
            not_before,
            not_after,
            public_key_der,
            signature,
        })
    }
}

// ============================================
// SigningRequest
// ============================================

/// A self-signed enrollment request.
///
/// The self-signature proves possession of the private key; the subject
/// name must match the name derived from the embedded public key, which
/// the server re-checks before issuing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    /// Requested subject common name (key-derived client id).
    pub subject: String,
    /// DER-encoded public key to certify.
    pub public_key_der: Vec<u8>,
    /// Self-signature over the canonical encoding.
    pub signature: Vec<u8>,
}

impl SigningRequest {
    /// Builds a signing request for `keypair`.
    ///
    /// The subject is always the key-derived client id; callers cannot
    /// request arbitrary names.
    ///
    /// # Errors
    /// Returns `KeyGeneration`/`SignatureCreation` on failure.
    pub fn new(keypair: &IdentityKeyPair) -> Result<Self> {
        let subject = keypair.client_id()?.as_str().to_string();
        let mut request = Self {
            subject,
            public_key_der: keypair.public_key().to_der()?,
            signature: Vec::new(),
        };
        request.signature = keypair.sign(&request.sign_data())?;
        Ok(request)
    }

    /// Returns the canonical bytes the self-signature covers.
    #[must_use]
    pub fn sign_data(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(REQUEST_FORMAT_VERSION);
        put_string(&mut buf, &self.subject);
        put_vec(&mut buf, &self.public_key_der);
        buf.to_vec()
    }

    /// Validates the request: key parses, self-signature verifies, and the
    /// subject equals the key-derived name.
    ///
    /// # Errors
    /// - `CertificateInvalid`: key unparsable or subject mismatch
    /// - `SignatureVerification`: self-signature does not match
    pub fn verify(&self) -> Result<ClientId> {
        let key = IdentityPublicKey::from_der(&self.public_key_der)?;
        key.verify(&self.sign_data(), &self.signature)?;
        let derived = key.client_id()?;
        if derived.as_str() != self.subject {
            return Err(CoreError::certificate_invalid(format!(
                "subject '{}' does not match key-derived name '{derived}'",
                self.subject
            )));
        }
        Ok(derived)
    }

    /// Serializes the request (including signature) to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_slice(&self.sign_data());
        put_vec(&mut buf, &self.signature);
        buf.to_vec()
    }

    /// Deserializes a request from bytes.
    ///
    /// # Errors
    /// Returns structural errors on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let format = get_u8(&mut buf)?;
        if format != REQUEST_FORMAT_VERSION {
            return Err(CoreError::certificate_invalid(format!(
                "unknown request format 0x{format:02x}"
            )));
        }
        let subject = get_string(&mut buf)?;
        let public_key_der = get_vec(&mut buf)?;
        let signature = get_vec(&mut buf)?;
        if buf.has_remaining() {
            return Err(CoreError::certificate_invalid("trailing bytes"));
        }
        Ok(Self {
            subject,
            public_key_der,
            signature,
        })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn ca() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn client() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn issue_client_cert() -> Certificate {
        let subject = client().client_id().unwrap();
        Certificate::issue(
            subject.as_str(),
            &client().public_key(),
            "ca",
            ca(),
            7,
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let cert = issue_client_cert();
        assert!(cert.verify(&ca().public_key(), Timestamp::now()).is_ok());
    }

    #[test]
    fn test_verify_rejects_wrong_issuer() {
        let cert = issue_client_cert();
        let result = cert.verify(&client().public_key(), Timestamp::now());
        assert!(matches!(result, Err(CoreError::SignatureVerification)));
    }

    #[test]
    fn test_verify_rejects_expired() {
        let cert = issue_client_cert();
        let after_expiry = cert.not_after.saturating_add_micros(1);
        let result = cert.verify(&ca().public_key(), after_expiry);
        assert!(matches!(result, Err(CoreError::CertificateInvalid { .. })));
    }

    #[test]
    fn test_tampered_subject_fails() {
        let mut cert = issue_client_cert();
        cert.subject = "C.ffffffffffffffff".to_string();
        let result = cert.verify(&ca().public_key(), Timestamp::now());
        assert!(matches!(result, Err(CoreError::SignatureVerification)));
    }

    #[test]
    fn test_certificate_bytes_roundtrip() {
        let cert = issue_client_cert();
        let restored = Certificate::from_bytes(&cert.to_bytes()).unwrap();
        assert_eq!(cert, restored);
        assert!(restored.verify(&ca().public_key(), Timestamp::now()).is_ok());
    }

    #[test]
    fn test_signing_request_verify() {
        let request = SigningRequest::new(client()).unwrap();
        let derived = request.verify().unwrap();
        assert_eq!(derived, client().client_id().unwrap());
    }

    #[test]
    fn test_signing_request_rejects_renamed_subject() {
        let mut request = SigningRequest::new(client()).unwrap();
        request.subject = "C.0000000000000000".to_string();
        // Renaming breaks the self-signature before the derivation check.
        assert!(request.verify().is_err());
    }

    #[test]
    fn test_signing_request_bytes_roundtrip() {
        let request = SigningRequest::new(client()).unwrap();
        let restored = SigningRequest::from_bytes(&request.to_bytes()).unwrap();
        assert_eq!(request, restored);
        assert!(restored.verify().is_ok());
    }

    #[test]
    fn test_request_rejects_swapped_key() {
        let mut request = SigningRequest::new(client()).unwrap();
        request.public_key_der = ca().public_key().to_der().unwrap();
        assert!(request.verify().is_err());
    }
}
