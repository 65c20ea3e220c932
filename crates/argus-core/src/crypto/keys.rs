// ============================================
// File: crates/argus-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Defines the RSA identity key types used throughout the Argus protocol
//! with proper security properties (redacted Debug, PEM persistence,
//! deterministic name derivation).
//!
//! ## Main Functionality
//! - `IdentityKeyPair`: Long-term RSA-2048 signing/unwrapping keys
//! - `IdentityPublicKey`: Public half, used to verify and wrap
//! - Deterministic client-name derivation from the public key
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  IdentityKeyPair (Long-term)                               │
//! │  ├─ Generated once, persisted as PKCS#8 PEM                │
//! │  ├─ Signs envelopes, certificates, signing requests        │
//! │  └─ Unwraps per-envelope symmetric keys (RSA-OAEP)         │
//! │                                                            │
//! │  Per-envelope AES/HMAC keys live in `cipher`, never here.  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private keys must NEVER appear in logs or Debug output
//! - A client's name is a pure function of its public key; the
//!   derivation in [`IdentityPublicKey::client_id`] is part of the
//!   protocol and must not change between releases
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::{Oaep, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use argus_common::types::ClientId;

use super::RSA_KEY_BITS;
use crate::error::{CoreError, Result};

// ============================================
// IdentityKeyPair
// ============================================

/// Long-term RSA identity key pair.
///
/// # Purpose
/// Signs outbound envelopes and certificates, and unwraps the symmetric
/// key material of inbound envelopes addressed to this identity.
///
/// # Security
/// - Never serialize the private key except through [`to_pkcs8_pem`]
/// - Debug output is redacted
///
/// [`to_pkcs8_pem`]: IdentityKeyPair::to_pkcs8_pem
///
/// # Example
/// ```
/// use argus_core::crypto::IdentityKeyPair;
///
/// let identity = IdentityKeyPair::generate().unwrap();
/// let signature = identity.sign(b"hello fleet").unwrap();
/// identity.public_key().verify(b"hello fleet", &signature).unwrap();
/// ```
pub struct IdentityKeyPair {
    /// RSA private key
    private: RsaPrivateKey,
    /// Cached public half
    public: RsaPublicKey,
}

impl IdentityKeyPair {
    /// Generates a new random RSA-2048 identity key pair.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if the underlying RNG or prime search fails.
    pub fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| CoreError::key_generation(format!("RSA keygen: {e}")))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Loads an identity key pair from a PKCS#8 PEM string.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if the PEM cannot be parsed.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CoreError::key_generation(format!("PKCS#8 parse: {e}")))?;
        let public = RsaPublicKey::from(&private);
        Ok(Self { private, public })
    }

    /// Exports the private key as a PKCS#8 PEM string.
    ///
    /// # Security Warning
    /// The returned buffer zeroizes on drop; write it straight to its
    /// destination and let it fall out of scope.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if encoding fails.
    pub fn to_pkcs8_pem(&self) -> Result<Zeroizing<String>> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CoreError::key_generation(format!("PKCS#8 encode: {e}")))
    }

    /// Returns the public key component.
    #[must_use]
    pub fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.public.clone())
    }

    /// Returns the client name derived from this key pair's public half.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if the public key cannot be DER-encoded.
    pub fn client_id(&self) -> Result<ClientId> {
        self.public_key().client_id()
    }

    /// Signs `data` with RSA-PKCS1v15 over a SHA-256 digest.
    ///
    /// # Errors
    /// Returns `SignatureCreation` if signing fails.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let digest = Sha256::digest(data);
        self.private
            .sign(Pkcs1v15Sign::new::<Sha256>(), digest.as_slice())
            .map_err(|e| CoreError::signature_creation(e.to_string()))
    }

    /// Unwraps key material wrapped to this identity with RSA-OAEP-SHA256.
    ///
    /// # Errors
    /// Returns `KeyUnwrap` on any RSA failure; the reason string never
    /// distinguishes padding from other failures to callers over the wire.
    pub fn unwrap_key(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.private
            .decrypt(Oaep::new::<Sha256>(), wrapped)
            .map(Zeroizing::new)
            .map_err(|_| CoreError::key_unwrap("RSA-OAEP decrypt failed"))
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ============================================
// IdentityPublicKey
// ============================================

/// Public component of an RSA identity key.
///
/// Safe to share publicly. Used to verify signatures from, and wrap key
/// material to, the corresponding private key holder.
#[derive(Clone, PartialEq)]
pub struct IdentityPublicKey(RsaPublicKey);

impl IdentityPublicKey {
    /// Creates a public key from DER-encoded SubjectPublicKeyInfo bytes.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` if the bytes are not a valid RSA key.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| CoreError::certificate_invalid(format!("public key DER: {e}")))?;
        Ok(Self(key))
    }

    /// Returns the DER-encoded SubjectPublicKeyInfo bytes.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if encoding fails.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CoreError::key_generation(format!("public key DER encode: {e}")))
    }

    /// Derives the deterministic client name for this key.
    ///
    /// # Derivation
    /// `C.` + hex of the first 8 bytes of SHA-256 over the DER encoding.
    /// Identity and authentication collapse to this derivation: a peer is
    /// who its key says it is.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if the key cannot be DER-encoded.
    pub fn client_id(&self) -> Result<ClientId> {
        let der = self.to_der()?;
        let digest = Sha256::digest(&der);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Ok(ClientId::from_digest_prefix(prefix))
    }

    /// Verifies an RSA-PKCS1v15-SHA256 signature over `data`.
    ///
    /// # Errors
    /// Returns `SignatureVerification` if the signature does not match.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let digest = Sha256::digest(data);
        self.0
            .verify(Pkcs1v15Sign::new::<Sha256>(), digest.as_slice(), signature)
            .map_err(|_| CoreError::SignatureVerification)
    }

    /// Wraps key material to this identity with RSA-OAEP-SHA256.
    ///
    /// # Errors
    /// Returns `Encryption` if the material is too large for the modulus.
    pub fn wrap_key(&self, material: &[u8]) -> Result<Vec<u8>> {
        self.0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), material)
            .map_err(|e| CoreError::encryption(format!("RSA-OAEP encrypt: {e}")))
    }
}

impl fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show truncated fingerprint for debugging
        match self.to_der() {
            Ok(der) => {
                let digest = Sha256::digest(&der);
                write!(f, "IdentityPublicKey({})", hex::encode(&digest[..4]))
            }
            Err(_) => write!(f, "IdentityPublicKey(<unencodable>)"),
        }
    }
}

// ============================================
// Tests
// ============================================
