// ============================================
// File: crates/argus-core/src/protocol/messages.rs
// ============================================
//! # Application Messages
//!
//! ## Creation Reason
//! Defines the atomic application-level unit exchanged between agents and
//! the server, and the ordered batch sealed into one envelope.
//!
//! ## Main Functionality
//! - `Message`: one addressed, typed payload
//! - `MessageList`: ordered batch for one transmission
//!
//! ## Main Logical Flow
//! 1. The sending side queues `Message`s (action results, dispatched work)
//! 2. The transport drains them into a `MessageList` per cycle
//! 3. The receiver classifies and hands each message to its sink
//!
//! ## ⚠️ Important Note for Next Developer
//! - A message is immutable once sealed; the ONLY field the receiver
//!   rewrites is `auth_state`, after envelope verification
//! - Insertion order in a `MessageList` is the transmission order
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use serde::{Deserialize, Serialize};

use argus_common::types::{AuthState, Priority, SessionId};

// ============================================
// Message
// ============================================

/// The atomic application-level unit.
///
/// # Fields
/// Addressing (`session_id`, `request_id`, `response_id`) is opaque to the
/// transport; only the dispatch layer interprets it. The `action` tag names
/// the handler on the receiving side. `ttl` and `cpu_limit_ms` are
/// annotations consumed by the executing layer, not the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Name of the flow/queue this message belongs to.
    pub session_id: SessionId,
    /// Request counter within the session.
    pub request_id: u64,
    /// Response counter within the request (0 for requests).
    pub response_id: u64,
    /// Handler name on the receiving side.
    pub action: String,
    /// Typed payload blob, interpreted by the handler.
    pub payload: Vec<u8>,
    /// Delivery priority.
    pub priority: Priority,
    /// Authentication classification, stamped by the receiver.
    pub auth_state: AuthState,
    /// Remaining delivery attempts, if bounded.
    pub ttl: Option<u32>,
    /// CPU budget for the executing action in milliseconds, if bounded.
    pub cpu_limit_ms: Option<u32>,
}

impl Message {
    /// Creates a message with default priority and no annotations.
    #[must_use]
    pub fn new(session_id: SessionId, action: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            session_id,
            request_id: 0,
            response_id: 0,
            action: action.into(),
            payload,
            priority: Priority::default(),
            auth_state: AuthState::default(),
            ttl: None,
            cpu_limit_ms: None,
        }
    }

    /// Sets the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: u64) -> Self {
        self.request_id = request_id;
        self
    }

    /// Sets the response id.
    #[must_use]
    pub fn with_response_id(mut self, response_id: u64) -> Self {
        self.response_id = response_id;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the remaining delivery attempts.
    #[must_use]
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the CPU budget annotation.
    #[must_use]
    pub fn with_cpu_limit_ms(mut self, cpu_limit_ms: u32) -> Self {
        self.cpu_limit_ms = Some(cpu_limit_ms);
        self
    }

    /// Checks whether this message requests low-latency delivery.
    #[must_use]
    pub fn wants_fast_poll(&self) -> bool {
        self.priority == Priority::High
    }
}

// ============================================
// MessageList
// ============================================

/// An ordered batch of messages sealed into one envelope.
///
/// Insertion order is the transmission order. Sequence across retransmits
/// is established by the envelope freshness nonce, not by the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageList(pub Vec<Message>);

impl MessageList {
    /// Creates an empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a message, preserving order.
    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    /// Returns the number of batched messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the batched messages in transmission order.
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.0.iter()
    }

    /// Stamps an authentication classification onto every message.
    ///
    /// Called once per envelope after verification; the classification is
    /// an envelope-level judgement, never per message.
    pub fn stamp_auth_state(&mut self, state: AuthState) {
        for message in &mut self.0 {
            message.auth_state = state;
        }
    }
}

impl From<Vec<Message>> for MessageList {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

impl IntoIterator for MessageList {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================
// Tests
// ============================================
