// ============================================
// File: crates/argus-core/src/comms.rs
// ============================================
//! # Envelope Sealing and Opening
//!
//! ## Creation Reason
//! Ties the codec and the hybrid cipher together into the two operations
//! both sides of the protocol share: turn a message batch into wire bytes
//! addressed to a peer, and turn wire bytes back into a verified batch.
//!
//! ## Main Functionality
//! - `seal_envelope`: batch → compressed → sealed → framed bytes
//! - `open_envelope`: framed bytes → opened → verified → batch
//! - `OpenedEnvelope` / `SourceVerification`: the decode result
//!
//! ## Main Logical Flow (receive path)
//! ```text
//! bytes ──decode──► Envelope            (structural errors)
//!       ──unwrap/HMAC/decrypt──► payload (cryptographic errors)
//!       ──lookup source key──► Verified | UnknownSource
//!       ──decompress + parse──► MessageList
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - An unknown source is NOT an error here: the messages still decode
//!   (tagged UNAUTHENTICATED) so the enrollment handler can read the
//!   signing request they carry. Callers decide what unknown means.
//! - A KNOWN source with a bad signature IS an error; never soften it
//!
//! ## Last Modified
//! v0.1.0 - Initial seal/open orchestration

use tracing::{debug, trace};

use argus_common::time::Timestamp;
use argus_common::types::AuthState;

use crate::crypto::cipher::{self, SealedPayload};
use crate::crypto::keys::{IdentityKeyPair, IdentityPublicKey};
use crate::error::Result;
use crate::protocol::envelope::{compress_payload, decompress_payload, CompressionMode, Envelope};
use crate::protocol::version::ProtocolVersion;
use crate::protocol::{decode_message_list, encode_message_list, MessageList};

// ============================================
// SealOptions
// ============================================

/// Per-envelope sealing parameters, sourced from configuration.
#[derive(Debug, Clone, Copy)]
pub struct SealOptions {
    /// Payload compression applied before sealing.
    pub compression: CompressionMode,
    /// Maximum serialized (post-compression) payload size in bytes.
    pub max_payload: usize,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMode::Zlib,
            max_payload: 2 * 1024 * 1024,
        }
    }
}

// ============================================
// SourceVerification
// ============================================

/// Outcome of resolving and checking the claimed source identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceVerification {
    /// Source key was found and its signature verified.
    Verified,
    /// No key is known for the claimed source; messages stay
    /// UNAUTHENTICATED. This is the expected first-contact case.
    UnknownSource,
}

// ============================================
// OpenedEnvelope
// ============================================

/// A successfully decoded and decrypted envelope.
#[derive(Debug)]
pub struct OpenedEnvelope {
    /// Decoded message batch; auth state stamped per `verification`.
    pub messages: MessageList,
    /// Claimed (and, if `Verified`, proven) source identity name.
    pub source: String,
    /// Freshness nonce stamped by the sender.
    pub nonce: Timestamp,
    /// Whether the source identity was proven.
    pub verification: SourceVerification,
}

// ============================================
// Seal / Open
// ============================================

/// Seals `messages` into wire bytes addressed to `destination`.
///
/// # Errors
/// - `PayloadTooLarge`: serialized batch exceeds `options.max_payload`
/// - `Encryption` / `SignatureCreation`: sealing failed
pub fn seal_envelope(
    messages: &MessageList,
    source: &str,
    destination: &str,
    nonce: Timestamp,
    sender: &IdentityKeyPair,
    recipient: &IdentityPublicKey,
    options: &SealOptions,
) -> Result<Vec<u8>> {
    let raw = encode_message_list(messages);
    let payload = compress_payload(&raw, options.compression, options.max_payload)?;
    let sealed = cipher::seal(&payload, recipient, sender)?;

    let envelope = Envelope {
        version: ProtocolVersion::current(),
        source: source.to_string(),
        destination: destination.to_string(),
        nonce,
        compression: options.compression,
        wrapped_properties: sealed.wrapped_properties,
        iv: sealed.iv,
        signature: sealed.signature,
        hmac: sealed.hmac,
        ciphertext: sealed.ciphertext,
    };

    trace!(
        source,
        destination,
        batch = messages.len(),
        nonce = nonce.as_micros(),
        "sealed envelope"
    );
    Ok(envelope.encode())
}

/// Opens wire bytes addressed to `recipient`.
///
/// `lookup_source_key` resolves the claimed source name to a public key;
/// returning `None` marks the envelope `UnknownSource` instead of failing,
/// so enrollment traffic from never-seen clients still decodes.
///
/// Every returned message carries `AuthState::Unauthenticated`; the caller
/// upgrades verified envelopes after freshness classification.
///
/// # Errors
/// - structural: `MalformedEnvelope`, `EnvelopeTooShort`, `UnsupportedVersion`
/// - cryptographic: `KeyUnwrap`, `Integrity`, `Padding`,
///   `SignatureVerification` (known source, bad signature)
/// - `PayloadTooLarge`: decompressed batch exceeds `max_payload`
pub fn open_envelope(
    bytes: &[u8],
    recipient: &IdentityKeyPair,
    lookup_source_key: impl FnOnce(&str) -> Option<IdentityPublicKey>,
    options: &SealOptions,
) -> Result<OpenedEnvelope> {
    let envelope = Envelope::decode(bytes)?;

    let sealed = SealedPayload {
        wrapped_properties: envelope.wrapped_properties.clone(),
        iv: envelope.iv,
        ciphertext: envelope.ciphertext.clone(),
        hmac: envelope.hmac,
        signature: envelope.signature.clone(),
    };
    let payload = cipher::open(&sealed, recipient)?;

    let verification = match lookup_source_key(&envelope.source) {
        Some(source_key) => {
            source_key.verify(&sealed.signed_data(), &sealed.signature)?;
            SourceVerification::Verified
        }
        None => {
            debug!(source = %envelope.source, "no key known for envelope source");
            SourceVerification::UnknownSource
        }
    };

    let raw = decompress_payload(&payload, envelope.compression, options.max_payload)?;
    let mut messages = decode_message_list(&raw)?;
    messages.stamp_auth_state(AuthState::Unauthenticated);

    Ok(OpenedEnvelope {
        messages,
        source: envelope.source,
        nonce: envelope.nonce,
        verification,
    })
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    use argus_common::types::SessionId;

    use crate::error::CoreError;
    use crate::protocol::Message;

    fn client() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn server() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn sample_batch() -> MessageList {
        MessageList::from(vec![
            Message::new(SessionId::new("flows/F:7"), "list_sockets", vec![1, 2, 3]),
            Message::new(SessionId::new("flows/F:8"), "read_file", vec![4, 5]),
        ])
    }

    fn seal_sample(options: &SealOptions) -> Vec<u8> {
        seal_envelope(
            &sample_batch(),
            "C.0011223344556677",
            "server",
            Timestamp::from_micros(1_700_000_000_000_000),
            client(),
            &server().public_key(),
            options,
        )
        .unwrap()
    }

    #[test]
    fn test_seal_open_roundtrip_verified() {
        let options = SealOptions::default();
        let bytes = seal_sample(&options);

        let opened = open_envelope(
            &bytes,
            server(),
            |_| Some(client().public_key()),
            &options,
        )
        .unwrap();

        assert_eq!(opened.verification, SourceVerification::Verified);
        assert_eq!(opened.source, "C.0011223344556677");
        assert_eq!(opened.nonce.as_micros(), 1_700_000_000_000_000);

        // Payload round-trips exactly, modulo the receiver-owned auth tag.
        let mut expected = sample_batch();
        expected.stamp_auth_state(AuthState::Unauthenticated);
        assert_eq!(opened.messages, expected);
    }

    #[test]
    fn test_seal_open_roundtrip_uncompressed() {
        let options = SealOptions {
            compression: CompressionMode::Uncompressed,
            ..SealOptions::default()
        };
        let bytes = seal_sample(&options);
        let opened = open_envelope(
            &bytes,
            server(),
            |_| Some(client().public_key()),
            &options,
        )
        .unwrap();
        assert_eq!(opened.messages.len(), 2);
    }

    #[test]
    fn test_unknown_source_still_decodes() {
        let options = SealOptions::default();
        let bytes = seal_sample(&options);

        let opened = open_envelope(&bytes, server(), |_| None, &options).unwrap();
        assert_eq!(opened.verification, SourceVerification::UnknownSource);
        assert!(opened
            .messages
            .iter()
            .all(|m| m.auth_state == AuthState::Unauthenticated));
    }

    #[test]
    fn test_known_source_bad_signature_rejected() {
        let options = SealOptions::default();
        let bytes = seal_sample(&options);

        // Look up a DIFFERENT key for the claimed source.
        let result = open_envelope(&bytes, server(), |_| Some(server().public_key()), &options);
        assert!(matches!(result, Err(CoreError::SignatureVerification)));
    }

    #[test]
    fn test_sealing_twice_differs_but_decodes_identically() {
        let options = SealOptions::default();
        let bytes1 = seal_sample(&options);
        let bytes2 = seal_sample(&options);
        // Fresh keys per seal: wire bytes always differ.
        assert_ne!(bytes1, bytes2);

        let opened1 =
            open_envelope(&bytes1, server(), |_| Some(client().public_key()), &options).unwrap();
        let opened2 =
            open_envelope(&bytes2, server(), |_| Some(client().public_key()), &options).unwrap();
        assert_eq!(opened1.messages, opened2.messages);
    }

    #[test]
    fn test_payload_bound_enforced_on_seal() {
        let options = SealOptions {
            compression: CompressionMode::Uncompressed,
            max_payload: 8,
        };
        let result = seal_envelope(
            &sample_batch(),
            "C.0011223344556677",
            "server",
            Timestamp::now(),
            client(),
            &server().public_key(),
            &options,
        );
        assert!(matches!(result, Err(CoreError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_single_byte_tamper_fails_closed() {
        let options = SealOptions::default();
        let bytes = seal_sample(&options);
        let envelope = Envelope::decode(&bytes).unwrap();

        // Flip one byte in each protected region; every flip must fail
        // closed, never yield different-but-plausible plaintext.
        let mut ciphertext_tampered = envelope.clone();
        ciphertext_tampered.ciphertext[0] ^= 0x01;
        let mut hmac_tampered = envelope.clone();
        hmac_tampered.hmac[0] ^= 0x01;
        let mut wrapped_tampered = envelope.clone();
        wrapped_tampered.wrapped_properties[0] ^= 0x01;
        let mut signature_tampered = envelope.clone();
        signature_tampered.signature[0] ^= 0x01;

        for (name, tampered) in [
            ("ciphertext", ciphertext_tampered),
            ("hmac", hmac_tampered),
            ("wrapped_properties", wrapped_tampered),
            ("signature", signature_tampered),
        ] {
            let result = open_envelope(
                &tampered.encode(),
                server(),
                |_| Some(client().public_key()),
                &options,
            );
            assert!(result.is_err(), "tamper in {name} was accepted");
        }
    }

    #[test]
    fn test_wrong_recipient_cannot_open() {
        let options = SealOptions::default();
        let bytes = seal_sample(&options);
        let result = open_envelope(&bytes, client(), |_| Some(client().public_key()), &options);
        assert!(matches!(result, Err(CoreError::KeyUnwrap { .. })));
    }
}
