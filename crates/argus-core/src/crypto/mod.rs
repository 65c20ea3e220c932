// ============================================
// File: crates/argus-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes all cryptographic operations for the Argus protocol,
//! using audited RustCrypto implementations.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: RSA identity key pairs, signing, key wrapping
//! - [`cipher`]: Hybrid per-envelope cipher (AES-CBC + HMAC + RSA-OAEP)
//! - [`certificate`]: Certificates and signing requests
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Sealing an envelope                      │
//! │                                                             │
//! │  fresh AES-128 key + HMAC key ──RSA-OAEP──► wrapped blob    │
//! │  payload ──AES-128-CBC/PKCS7──► ciphertext                  │
//! │  HMAC-SHA256(ciphertext ‖ iv ‖ wrapped blob) ──► tag        │
//! │  RSA-PKCS1v15-SHA256(wrapped blob ‖ iv) ──► signature       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//! - **Freshness**: new symmetric keys for every sealed envelope
//! - **Confidentiality**: AES-128-CBC under the per-envelope key
//! - **Integrity**: HMAC verified BEFORE any decryption
//! - **Authentication**: sender signature over the key-binding data
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL implementations use RustCrypto (audited); never roll your own
//! - The HMAC-before-decrypt ordering and the fresh-keys-per-envelope
//!   rule are load-bearing; do not "optimize" either away
//! - ALL sensitive key material implements Zeroize
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod certificate;
pub mod cipher;
pub mod keys;

// Re-export primary types at module level
pub use certificate::{Certificate, SigningRequest};
pub use cipher::{CipherProperties, SealedPayload};
pub use keys::{IdentityKeyPair, IdentityPublicKey};

// ============================================
// Constants
// ============================================

/// RSA modulus size in bits for all identities.
pub const RSA_KEY_BITS: usize = 2048;

/// Size of the per-envelope AES key in bytes (AES-128).
pub const AES_KEY_SIZE: usize = 16;

/// Size of the AES-CBC initialization vector in bytes.
pub const AES_IV_SIZE: usize = 16;

/// Size of the per-envelope HMAC key in bytes.
pub const HMAC_KEY_SIZE: usize = 32;

/// Size of the HMAC-SHA256 tag in bytes.
pub const HMAC_SIZE: usize = 32;

/// Serialized size of the wrapped cipher properties before wrapping.
pub const CIPHER_PROPERTIES_SIZE: usize = AES_KEY_SIZE + HMAC_KEY_SIZE;
