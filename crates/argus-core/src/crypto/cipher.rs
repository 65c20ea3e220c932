// ============================================
// File: crates/argus-core/src/crypto/cipher.rs
// ============================================
//! # Hybrid Envelope Cipher
//!
//! ## Creation Reason
//! Implements the per-envelope hybrid cipher: fresh symmetric keys for
//! every seal, wrapped to the recipient with RSA-OAEP, AES-CBC bulk
//! encryption, and an HMAC tag verified before any decryption.
//!
//! ## Main Functionality
//! - `CipherProperties`: the per-envelope AES + HMAC key material
//! - `SealedPayload`: everything `seal` produces for one envelope
//! - `seal` / `open`: the two sides of the hybrid cipher
//!
//! ## Sealed Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ wrapped_properties │ RSA-OAEP({aes_key ‖ hmac_key})          │
//! ├─────────────────────────────────────────────────────────────┤
//! │ iv (16 bytes)      │ random per envelope                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │ ciphertext         │ AES-128-CBC/PKCS7(payload)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │ hmac (32 bytes)    │ HMAC-SHA256(ciphertext ‖ iv ‖ wrapped)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ signature          │ sender RSA sig over (wrapped ‖ iv)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `open` verifies the HMAC BEFORE touching the block cipher; this
//!   ordering closes padding-oracle side channels and must be preserved
//! - Symmetric keys are NEVER reused across envelopes; a static key with
//!   CBC would leak plaintext structure across many small messages
//!
//! ## Last Modified
//! v0.1.0 - Initial hybrid cipher implementation

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AES_IV_SIZE, AES_KEY_SIZE, CIPHER_PROPERTIES_SIZE, HMAC_KEY_SIZE, HMAC_SIZE};
use crate::crypto::keys::{IdentityKeyPair, IdentityPublicKey};
use crate::error::{CoreError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

// ============================================
// CipherProperties
// ============================================

/// Per-envelope symmetric key material.
///
/// Generated fresh for every [`seal`] call and transported to the
/// recipient inside the RSA-OAEP wrapped blob. Zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct CipherProperties {
    /// AES-128 bulk encryption key
    pub aes_key: [u8; AES_KEY_SIZE],
    /// HMAC-SHA256 key
    pub hmac_key: [u8; HMAC_KEY_SIZE],
}

impl CipherProperties {
    /// Generates fresh random key material from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut aes_key = [0u8; AES_KEY_SIZE];
        let mut hmac_key = [0u8; HMAC_KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut aes_key);
        rand::rngs::OsRng.fill_bytes(&mut hmac_key);
        Self { aes_key, hmac_key }
    }

    /// Serializes the key material for wrapping.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; CIPHER_PROPERTIES_SIZE] {
        let mut out = [0u8; CIPHER_PROPERTIES_SIZE];
        out[..AES_KEY_SIZE].copy_from_slice(&self.aes_key);
        out[AES_KEY_SIZE..].copy_from_slice(&self.hmac_key);
        out
    }

    /// Deserializes unwrapped key material.
    ///
    /// # Errors
    /// Returns `KeyUnwrap` if the blob has the wrong length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CIPHER_PROPERTIES_SIZE {
            return Err(CoreError::key_unwrap(format!(
                "cipher properties: expected {CIPHER_PROPERTIES_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut aes_key = [0u8; AES_KEY_SIZE];
        let mut hmac_key = [0u8; HMAC_KEY_SIZE];
        aes_key.copy_from_slice(&bytes[..AES_KEY_SIZE]);
        hmac_key.copy_from_slice(&bytes[AES_KEY_SIZE..]);
        Ok(Self { aes_key, hmac_key })
    }
}

impl std::fmt::Debug for CipherProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        write!(f, "CipherProperties([REDACTED])")
    }
}

// ============================================
// SealedPayload
// ============================================

/// Output of [`seal`]: the crypto fields of one wire envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// RSA-OAEP wrapped [`CipherProperties`]
    pub wrapped_properties: Vec<u8>,
    /// Random CBC initialization vector
    pub iv: [u8; AES_IV_SIZE],
    /// AES-128-CBC/PKCS7 ciphertext of the payload
    pub ciphertext: Vec<u8>,
    /// HMAC-SHA256 over ciphertext ‖ iv ‖ wrapped_properties
    pub hmac: [u8; HMAC_SIZE],
    /// Sender signature over wrapped_properties ‖ iv
    pub signature: Vec<u8>,
}

impl SealedPayload {
    /// Returns the data the sender signature covers.
    ///
    /// Binding the signature to the freshly wrapped keys ties the sender
    /// identity to this envelope's symmetric material.
    #[must_use]
    pub fn signed_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.wrapped_properties.len() + AES_IV_SIZE);
        data.extend_from_slice(&self.wrapped_properties);
        data.extend_from_slice(&self.iv);
        data
    }
}

// ============================================
// Seal / Open
// ============================================

/// Seals `payload` for `recipient`, signed by `sender`.
///
/// Generates a fresh AES key, HMAC key, and IV; encrypts with
/// AES-128-CBC/PKCS7; MACs the ciphertext; wraps the symmetric material
/// with the recipient's public key; signs the key-binding data.
///
/// # Errors
/// - `Encryption`: RSA wrapping failed
/// - `SignatureCreation`: signing failed
pub fn seal(
    payload: &[u8],
    recipient: &IdentityPublicKey,
    sender: &IdentityKeyPair,
) -> Result<SealedPayload> {
    let properties = CipherProperties::generate();
    let mut iv = [0u8; AES_IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes128CbcEnc::new(&properties.aes_key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(payload);

    let wrapped_properties = recipient.wrap_key(&properties.to_bytes())?;
    let hmac = compute_hmac(&properties.hmac_key, &ciphertext, &iv, &wrapped_properties);

    let mut sealed = SealedPayload {
        wrapped_properties,
        iv,
        ciphertext,
        hmac,
        signature: Vec::new(),
    };
    sealed.signature = sender.sign(&sealed.signed_data())?;
    Ok(sealed)
}

/// Opens a sealed payload addressed to `recipient`.
///
/// Unwraps the symmetric keys, verifies the HMAC, and only then runs the
/// block cipher. The sender signature is NOT checked here; callers verify
/// it against the claimed source identity once that identity's public key
/// has been resolved.
///
/// # Errors
/// - `KeyUnwrap`: RSA unwrap of the cipher properties failed
/// - `Integrity`: HMAC mismatch (checked before decryption)
/// - `Padding`: CBC padding invalid after decryption
pub fn open(sealed: &SealedPayload, recipient: &IdentityKeyPair) -> Result<Vec<u8>> {
    let unwrapped = recipient.unwrap_key(&sealed.wrapped_properties)?;
    let properties = CipherProperties::from_bytes(&unwrapped)?;

    // Integrity first: nothing below runs on unauthenticated ciphertext.
    verify_hmac(
        &properties.hmac_key,
        &sealed.ciphertext,
        &sealed.iv,
        &sealed.wrapped_properties,
        &sealed.hmac,
    )?;

    Aes128CbcDec::new(&properties.aes_key.into(), &sealed.iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&sealed.ciphertext)
        .map_err(|_| CoreError::Padding)
}

// ============================================
// HMAC Helpers
// ============================================

/// Computes the envelope HMAC over ciphertext ‖ iv ‖ wrapped key blob.
fn compute_hmac(
    hmac_key: &[u8; HMAC_KEY_SIZE],
    ciphertext: &[u8],
    iv: &[u8; AES_IV_SIZE],
    wrapped: &[u8],
) -> [u8; HMAC_SIZE] {
    let mut mac = HmacSha256::new_from_slice(hmac_key).expect("HMAC accepts any key length");
    mac.update(ciphertext);
    mac.update(iv);
    mac.update(wrapped);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; HMAC_SIZE];
    out.copy_from_slice(&tag);
    out
}

/// Verifies the envelope HMAC in constant time.
fn verify_hmac(
    hmac_key: &[u8; HMAC_KEY_SIZE],
    ciphertext: &[u8],
    iv: &[u8; AES_IV_SIZE],
    wrapped: &[u8],
    expected: &[u8; HMAC_SIZE],
) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(hmac_key).expect("HMAC accepts any key length");
    mac.update(ciphertext);
    mac.update(iv);
    mac.update(wrapped);
    mac.verify_slice(expected).map_err(|_| CoreError::Integrity)
}

// ============================================
// Tests
// ============================================
