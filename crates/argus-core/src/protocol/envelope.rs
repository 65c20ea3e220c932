// ============================================
// File: crates/argus-core/src/protocol/envelope.rs
// ============================================
//! # Wire Envelope
//!
//! ## Creation Reason
//! Defines the signed, encrypted container for one batch of messages and
//! its binary framing. Constructed fresh for every HTTP round trip and
//! never persisted.
//!
//! ## Main Functionality
//! - `Envelope`: the wire structure with all crypto metadata
//! - `CompressionMode`: payload compression selector
//! - Deterministic encode/decode + bounded compression helpers
//!
//! ## Wire Format
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │ magic (4 bytes)            │ 0x41524745 "ARGE"   │
//! ├──────────────────────────────────────────────────┤
//! │ version (1 byte)           │ protocol version    │
//! ├──────────────────────────────────────────────────┤
//! │ source (len + UTF-8)       │ sender name         │
//! ├──────────────────────────────────────────────────┤
//! │ destination (len + UTF-8)  │ recipient name      │
//! ├──────────────────────────────────────────────────┤
//! │ nonce (8 bytes)            │ epoch microseconds  │
//! ├──────────────────────────────────────────────────┤
//! │ compression (1 byte)       │ payload compression │
//! ├──────────────────────────────────────────────────┤
//! │ wrapped_properties (len+b) │ RSA-OAEP blob       │
//! ├──────────────────────────────────────────────────┤
//! │ iv (16 bytes)              │ CBC IV              │
//! ├──────────────────────────────────────────────────┤
//! │ signature (len + bytes)    │ sender RSA sig      │
//! ├──────────────────────────────────────────────────┤
//! │ hmac (32 bytes)            │ HMAC-SHA256 tag     │
//! ├──────────────────────────────────────────────────┤
//! │ ciphertext (len + bytes)   │ AES-CBC payload     │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Encoding must stay byte-for-byte stable: an envelope retransmitted
//!   verbatim after a transport failure must be recognizable as identical
//!   by the receiver's freshness bookkeeping
//! - Compression runs BEFORE sealing on the send path, and after opening
//!   on the receive path; the size bound applies on both paths
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope implementation

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use argus_common::time::Timestamp;

use crate::crypto::{AES_IV_SIZE, HMAC_SIZE};
use crate::error::{CoreError, Result};
use crate::protocol::codec::{
    get_array, get_i64_le, get_string, get_u8, get_vec, put_string, put_vec,
};
use crate::protocol::version::ProtocolVersion;

// ============================================
// Constants
// ============================================

/// Envelope magic bytes ("ARGE" big-endian).
pub const ENVELOPE_MAGIC: u32 = 0x4152_4745;

/// Minimum sensible envelope size (all fixed fields, empty var fields).
pub const MIN_ENVELOPE_SIZE: usize = 4 + 1 + 4 + 4 + 8 + 1 + 4 + AES_IV_SIZE + 4 + HMAC_SIZE + 4;

// ============================================
// CompressionMode
// ============================================

/// Payload compression selector.
///
/// # Values
/// | Value | Mode |
/// |-------|------|
/// | 0x00  | Uncompressed |
/// | 0x01  | Zlib |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionMode {
    /// Payload is serialized without compression.
    Uncompressed = 0x00,
    /// Payload is zlib-compressed before sealing.
    #[default]
    Zlib = 0x01,
}

impl CompressionMode {
    /// Converts a byte to a `CompressionMode`.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Uncompressed),
            0x01 => Some(Self::Zlib),
            _ => None,
        }
    }

    /// Converts the `CompressionMode` to its byte representation.
    #[must_use]
    pub const fn as_byte(&self) -> u8 {
        *self as u8
    }
}

// ============================================
// Envelope
// ============================================

/// The signed, encrypted container for one message batch.
///
/// Exists only for the duration of one transmission attempt. On transient
/// transport failure the same bytes may be POSTed again verbatim;
/// re-sealing would change the wrapped keys and defeat the receiver's
/// exact-replay tolerance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Protocol version tag.
    pub version: ProtocolVersion,
    /// Sender identity name.
    pub source: String,
    /// Recipient identity name.
    pub destination: String,
    /// Freshness nonce: sender clock in epoch microseconds.
    pub nonce: Timestamp,
    /// Payload compression applied before sealing.
    pub compression: CompressionMode,
    /// RSA-OAEP wrapped symmetric key material.
    pub wrapped_properties: Vec<u8>,
    /// CBC initialization vector.
    pub iv: [u8; AES_IV_SIZE],
    /// Sender signature over the key-binding data.
    pub signature: Vec<u8>,
    /// HMAC-SHA256 over ciphertext ‖ iv ‖ wrapped_properties.
    pub hmac: [u8; HMAC_SIZE],
    /// AES-128-CBC ciphertext of the (optionally compressed) batch.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encodes the envelope into wire bytes.
    ///
    /// Deterministic: identical envelopes always produce identical bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(
            MIN_ENVELOPE_SIZE
                + self.source.len()
                + self.destination.len()
                + self.wrapped_properties.len()
                + self.signature.len()
                + self.ciphertext.len(),
        );
        buf.put_u32(ENVELOPE_MAGIC);
        buf.put_u8(self.version.as_u8());
        put_string(&mut buf, &self.source);
        put_string(&mut buf, &self.destination);
        buf.put_i64_le(self.nonce.as_micros());
        buf.put_u8(self.compression.as_byte());
        put_vec(&mut buf, &self.wrapped_properties);
        buf.put_slice(&self.iv);
        put_vec(&mut buf, &self.signature);
        buf.put_slice(&self.hmac);
        put_vec(&mut buf, &self.ciphertext);
        buf.to_vec()
    }

    /// Decodes an envelope from wire bytes.
    ///
    /// # Errors
    /// - `EnvelopeTooShort` / `MalformedEnvelope`: structural failures
    /// - `UnsupportedVersion`: version outside the supported range
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_ENVELOPE_SIZE {
            return Err(CoreError::too_short(MIN_ENVELOPE_SIZE, bytes.len()));
        }
        let mut buf = Bytes::copy_from_slice(bytes);

        let magic = u32::from_be_bytes(get_array::<4>(&mut buf)?);
        if magic != ENVELOPE_MAGIC {
            return Err(CoreError::malformed(format!(
                "bad magic 0x{magic:08x}, expected 0x{ENVELOPE_MAGIC:08x}"
            )));
        }

        let version = ProtocolVersion::new(get_u8(&mut buf)?);
        version.validate()?;

        let source = get_string(&mut buf)?;
        let destination = get_string(&mut buf)?;
        let nonce = Timestamp::from_micros(get_i64_le(&mut buf)?);

        let compression_byte = get_u8(&mut buf)?;
        let compression = CompressionMode::from_byte(compression_byte).ok_or_else(|| {
            CoreError::malformed(format!("unknown compression 0x{compression_byte:02x}"))
        })?;

        let wrapped_properties = get_vec(&mut buf)?;
        let iv = get_array::<AES_IV_SIZE>(&mut buf)?;
        let signature = get_vec(&mut buf)?;
        let hmac = get_array::<HMAC_SIZE>(&mut buf)?;
        let ciphertext = get_vec(&mut buf)?;

        if buf.has_remaining() {
            return Err(CoreError::malformed(format!(
                "{} trailing bytes after envelope",
                buf.remaining()
            )));
        }

        Ok(Self {
            version,
            source,
            destination,
            nonce,
            compression,
            wrapped_properties,
            iv,
            signature,
            hmac,
            ciphertext,
        })
    }
}

// ============================================
// Compression Helpers
// ============================================

/// Compresses a serialized batch according to `mode`, bounded by `max_size`.
///
/// # Errors
/// - `PayloadTooLarge`: output exceeds `max_size`
/// - `Compression`: the zlib encoder failed
pub fn compress_payload(raw: &[u8], mode: CompressionMode, max_size: usize) -> Result<Vec<u8>> {
    let out = match mode {
        CompressionMode::Uncompressed => raw.to_vec(),
        CompressionMode::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(raw)
                .and_then(|()| encoder.finish())
                .map_err(|e| CoreError::compression(format!("zlib encode: {e}")))?
        }
    };
    if out.len() > max_size {
        return Err(CoreError::payload_too_large(max_size, out.len()));
    }
    Ok(out)
}

/// Decompresses an opened payload according to `mode`, bounded by `max_size`.
///
/// The decoder reads at most `max_size + 1` bytes so a hostile
/// decompression bomb is cut off rather than expanded.
///
/// # Errors
/// - `PayloadTooLarge`: decompressed output exceeds `max_size`
/// - `Compression`: the zlib stream is corrupt
pub fn decompress_payload(
    payload: &[u8],
    mode: CompressionMode,
    max_size: usize,
) -> Result<Vec<u8>> {
    match mode {
        CompressionMode::Uncompressed => {
            if payload.len() > max_size {
                return Err(CoreError::payload_too_large(max_size, payload.len()));
            }
            Ok(payload.to_vec())
        }
        CompressionMode::Zlib => {
            let mut out = Vec::new();
            let mut decoder = ZlibDecoder::new(payload).take(max_size as u64 + 1);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CoreError::compression(format!("zlib decode: {e}")))?;
            if out.len() > max_size {
                return Err(CoreError::payload_too_large(max_size, out.len()));
            }
            Ok(out)
        }
    }
}

// ============================================
// Tests
// ============================================
