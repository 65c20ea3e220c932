// ============================================
// File: crates/argus-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! Provides binary serialization and deserialization for protocol
//! structures. Pure data transformation: no cryptography happens here.
//!
//! ## Main Functionality
//! - `Codec` trait: Generic encode/decode interface
//! - `ProtocolCodec`: Implementation for messages and batches
//! - Length-prefixed field helpers shared by the envelope and
//!   certificate encodings
//!
//! ## Wire Format
//! All multi-byte integers are little-endian. Variable-length fields are
//! prefixed with a u32 length. Encoding is deterministic: identical input
//! always yields identical bytes, which is what makes verbatim
//! retransmission detectable on the receiving side.
//!
//! ## Parsing Strategy
//! 1. Check remaining buffer length before every read
//! 2. Bound every length prefix by `MAX_FIELD_SIZE`
//! 3. Validate enums and UTF-8 after the raw read
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always validate buffer lengths before reading
//! - Decoding failures here are STRUCTURAL errors, distinct from all
//!   cryptographic failures
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};

use argus_common::types::{AuthState, Priority, SessionId};

use crate::error::{CoreError, Result};
use crate::protocol::messages::{Message, MessageList};

// ============================================
// Constants
// ============================================

/// Upper bound on any single length-prefixed field.
///
/// Prevents a hostile length prefix from driving a giant allocation
/// before the HMAC has a chance to reject the envelope.
pub const MAX_FIELD_SIZE: usize = 64 * 1024 * 1024;

/// Flag bit: message carries a TTL annotation.
const FLAG_HAS_TTL: u8 = 0b0000_0001;

/// Flag bit: message carries a CPU budget annotation.
const FLAG_HAS_CPU_LIMIT: u8 = 0b0000_0010;

// ============================================
// Codec Trait
// ============================================

/// Trait for encoding and decoding protocol structures.
///
/// # Type Parameters
/// * `T` - The structure to encode/decode
pub trait Codec<T> {
    /// Encodes a structure into a byte buffer.
    fn encode(&self, msg: &T, buf: &mut BytesMut);

    /// Decodes a structure from bytes.
    ///
    /// # Errors
    /// Returns a structural error if decoding fails.
    fn decode(&self, buf: &mut Bytes) -> Result<T>;
}

// ============================================
// Field Helpers
// ============================================

/// Reads a single byte, checking the remaining length.
pub(crate) fn get_u8(buf: &mut Bytes) -> Result<u8> {
    if buf.remaining() < 1 {
        return Err(CoreError::too_short(1, buf.remaining()));
    }
    Ok(buf.get_u8())
}

/// Reads a little-endian u32, checking the remaining length.
pub(crate) fn get_u32_le(buf: &mut Bytes) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(CoreError::too_short(4, buf.remaining()));
    }
    Ok(buf.get_u32_le())
}

/// Reads a little-endian u64, checking the remaining length.
pub(crate) fn get_u64_le(buf: &mut Bytes) -> Result<u64> {
    if buf.remaining() < 8 {
        return Err(CoreError::too_short(8, buf.remaining()));
    }
    Ok(buf.get_u64_le())
}

/// Reads a little-endian i64, checking the remaining length.
pub(crate) fn get_i64_le(buf: &mut Bytes) -> Result<i64> {
    if buf.remaining() < 8 {
        return Err(CoreError::too_short(8, buf.remaining()));
    }
    Ok(buf.get_i64_le())
}

/// Reads a fixed-size array, checking the remaining length.
pub(crate) fn get_array<const N: usize>(buf: &mut Bytes) -> Result<[u8; N]> {
    if buf.remaining() < N {
        return Err(CoreError::too_short(N, buf.remaining()));
    }
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Writes a u32-length-prefixed byte field.
pub(crate) fn put_vec(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32_le(bytes.len() as u32);
    buf.put_slice(bytes);
}

/// Reads a u32-length-prefixed byte field.
pub(crate) fn get_vec(buf: &mut Bytes) -> Result<Vec<u8>> {
    let len = get_u32_le(buf)? as usize;
    if len > MAX_FIELD_SIZE {
        return Err(CoreError::malformed(format!(
            "field length {len} exceeds maximum {MAX_FIELD_SIZE}"
        )));
    }
    if buf.remaining() < len {
        return Err(CoreError::too_short(len, buf.remaining()));
    }
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Writes a u32-length-prefixed UTF-8 string field.
pub(crate) fn put_string(buf: &mut BytesMut, s: &str) {
    put_vec(buf, s.as_bytes());
}

/// Reads a u32-length-prefixed UTF-8 string field.
pub(crate) fn get_string(buf: &mut Bytes) -> Result<String> {
    let bytes = get_vec(buf)?;
    String::from_utf8(bytes).map_err(|_| CoreError::malformed("field is not valid UTF-8"))
}

// ============================================
// ProtocolCodec
// ============================================

/// Codec implementation for application messages and batches.
#[derive(Debug, Default, Clone)]
pub struct ProtocolCodec;

impl ProtocolCodec {
    /// Creates a new protocol codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

// ============================================
// Message Codec
// ============================================

impl Codec<Message> for ProtocolCodec {
    fn encode(&self, msg: &Message, buf: &mut BytesMut) {
        put_string(buf, msg.session_id.as_str());
        buf.put_u64_le(msg.request_id);
        buf.put_u64_le(msg.response_id);
        put_string(buf, &msg.action);
        put_vec(buf, &msg.payload);
        buf.put_u8(msg.priority.as_byte());
        buf.put_u8(msg.auth_state.as_byte());

        let mut flags = 0u8;
        if msg.ttl.is_some() {
            flags |= FLAG_HAS_TTL;
        }
        if msg.cpu_limit_ms.is_some() {
            flags |= FLAG_HAS_CPU_LIMIT;
        }
        buf.put_u8(flags);
        if let Some(ttl) = msg.ttl {
            buf.put_u32_le(ttl);
        }
        if let Some(cpu_limit_ms) = msg.cpu_limit_ms {
            buf.put_u32_le(cpu_limit_ms);
        }
    }

    fn decode(&self, buf: &mut Bytes) -> Result<Message> {
        let session_id = SessionId::new(get_string(buf)?);
        let request_id = get_u64_le(buf)?;
        let response_id = get_u64_le(buf)?;
        let action = get_string(buf)?;
        let payload = get_vec(buf)?;

        let priority_byte = get_u8(buf)?;
        let priority = Priority::from_byte(priority_byte)
            .ok_or_else(|| CoreError::malformed(format!("unknown priority 0x{priority_byte:02x}")))?;

        let auth_byte = get_u8(buf)?;
        let auth_state = AuthState::from_byte(auth_byte)
            .ok_or_else(|| CoreError::malformed(format!("unknown auth state 0x{auth_byte:02x}")))?;

        let flags = get_u8(buf)?;
        let ttl = if flags & FLAG_HAS_TTL != 0 {
            Some(get_u32_le(buf)?)
        } else {
            None
        };
        let cpu_limit_ms = if flags & FLAG_HAS_CPU_LIMIT != 0 {
            Some(get_u32_le(buf)?)
        } else {
            None
        };

        Ok(Message {
            session_id,
            request_id,
            response_id,
            action,
            payload,
            priority,
            auth_state,
            ttl,
            cpu_limit_ms,
        })
    }
}

// ============================================
// MessageList Codec
// ============================================

impl Codec<MessageList> for ProtocolCodec {
    fn encode(&self, list: &MessageList, buf: &mut BytesMut) {
        buf.put_u32_le(list.len() as u32);
        for message in list.iter() {
            self.encode(message, buf);
        }
    }

    fn decode(&self, buf: &mut Bytes) -> Result<MessageList> {
        let count = get_u32_le(buf)? as usize;
        // Each message occupies at least its fixed fields; a count that
        // cannot possibly fit the remaining bytes is rejected up front.
        if count > buf.remaining() {
            return Err(CoreError::malformed(format!(
                "message count {count} exceeds remaining {} bytes",
                buf.remaining()
            )));
        }
        let mut messages = Vec::with_capacity(count);
        for _ in 0..count {
            messages.push(Codec::<Message>::decode(self, buf)?);
        }
        Ok(MessageList(messages))
    }
}

// ============================================
// Convenience Functions
// ============================================

/// Encodes a message batch to bytes.
#[must_use]
pub fn encode_message_list(list: &MessageList) -> Vec<u8> {
    let mut buf = BytesMut::new();
    ProtocolCodec.encode(list, &mut buf);
    buf.to_vec()
}

/// Decodes a message batch from bytes.
///
/// # Errors
/// Returns a structural error on malformed input or trailing bytes.
pub fn decode_message_list(bytes: &[u8]) -> Result<MessageList> {
    let mut buf = Bytes::copy_from_slice(bytes);
    let list = ProtocolCodec.decode(&mut buf)?;
    if buf.has_remaining() {
        return Err(CoreError::malformed(format!(
            "{} trailing bytes after message batch",
            buf.remaining()
        )));
    }
    Ok(list)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> Message {
        Message::new(SessionId::new("flows/F:42"), "enumerate_users", vec![9, 8, 7])
            .with_request_id(11)
            .with_response_id(3)
            .with_priority(Priority::High)
            .with_ttl(5)
    }

    #[test]
    fn test_message_roundtrip() {
        let original = sample_message();
        let mut buf = BytesMut::new();
        ProtocolCodec.encode(&original, &mut buf);

        let mut bytes = buf.freeze();
        let decoded: Message = ProtocolCodec.decode(&mut bytes).unwrap();
        assert_eq!(original, decoded);
        assert!(!bytes.has_remaining());
    }

    #[test]
    fn test_message_without_annotations() {
        let original = Message::new(SessionId::new("flows/F:1"), "echo", vec![]);
        let mut buf = BytesMut::new();
        ProtocolCodec.encode(&original, &mut buf);
        let decoded: Message = ProtocolCodec.decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded.ttl, None);
        assert_eq!(decoded.cpu_limit_ms, None);
    }

    #[test]
    fn test_message_list_roundtrip() {
        let list = MessageList::from(vec![
            sample_message(),
            Message::new(SessionId::new("flows/F:2"), "read_registry", vec![0xFF; 200]),
        ]);
        let encoded = encode_message_list(&list);
        let decoded = decode_message_list(&encoded).unwrap();
        assert_eq!(list, decoded);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let list = MessageList::from(vec![sample_message()]);
        assert_eq!(encode_message_list(&list), encode_message_list(&list));
    }

    #[test]
    fn test_decode_truncated_fails() {
        let encoded = encode_message_list(&MessageList::from(vec![sample_message()]));
        let result = decode_message_list(&encoded[..encoded.len() - 2]);
        assert!(matches!(result, Err(CoreError::EnvelopeTooShort { .. })));
    }

    #[test]
    fn test_decode_trailing_bytes_fails() {
        let mut encoded = encode_message_list(&MessageList::from(vec![sample_message()]));
        encoded.push(0x00);
        assert!(matches!(
            decode_message_list(&encoded),
            Err(CoreError::MalformedEnvelope { .. })
        ));
    }

    #[test]
    fn test_decode_unknown_priority_fails() {
        let mut buf = BytesMut::new();
        ProtocolCodec.encode(&sample_message(), &mut buf);
        let mut encoded = buf.to_vec();
        // priority byte sits right after the payload field
        let priority_offset = encoded.len() - 1 - 1 - 1 - 4; // flags, auth, priority, ttl
        encoded[priority_offset] = 0x7F;
        let mut bytes = Bytes::copy_from_slice(&encoded);
        let result: Result<Message> = ProtocolCodec.decode(&mut bytes);
        assert!(matches!(result, Err(CoreError::MalformedEnvelope { .. })));
    }

    #[test]
    fn test_decode_hostile_count_fails() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(u32::MAX);
        let result = decode_message_list(&buf);
        assert!(matches!(result, Err(CoreError::MalformedEnvelope { .. })));
    }

    #[test]
    fn test_empty_list_roundtrip() {
        let encoded = encode_message_list(&MessageList::new());
        let decoded = decode_message_list(&encoded).unwrap();
        assert!(decoded.is_empty());
    }
}
