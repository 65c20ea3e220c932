// ============================================
// File: crates/argus-server/src/outbox.rs
// ============================================
//! # Per-Client Outbound Queues
//!
//! ## Creation Reason
//! The flow layer produces server→client messages between polls; this
//! module buffers them per client and drains them oldest-first into the
//! response envelope when that client next polls.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Queues are bounded per client; overflow drops the NEWEST message
//!   (the flow layer learns via the return value and can re-send)
//! - Draining respects the response size budget; the remainder rides on
//!   the client's next poll
//!
//! ## Last Modified
//! v0.1.0 - Initial outbox implementation

use std::collections::VecDeque;

use dashmap::DashMap;
use tracing::warn;

use argus_common::types::ClientId;
use argus_core::protocol::{Message, MessageList};

// ============================================
// Constants
// ============================================

/// Fixed per-message overhead estimate (ids, lengths, flags).
const MESSAGE_OVERHEAD_ESTIMATE: usize = 64;

// ============================================
// Outbox
// ============================================

/// Bounded per-client FIFO of server→client messages.
#[derive(Debug)]
pub struct Outbox {
    queues: DashMap<ClientId, VecDeque<Message>>,
    max_per_client: usize,
}

impl Outbox {
    /// Creates an outbox bounding each client queue to `max_per_client`.
    #[must_use]
    pub fn new(max_per_client: usize) -> Self {
        Self {
            queues: DashMap::new(),
            max_per_client,
        }
    }

    /// Enqueues a message for `client_id`.
    ///
    /// Returns `false` (and drops the message) when the client's queue
    /// is full.
    pub fn enqueue(&self, client_id: ClientId, message: Message) -> bool {
        let mut queue = self.queues.entry(client_id.clone()).or_default();
        if queue.len() >= self.max_per_client {
            warn!(client = %client_id, "outbox full, dropping message");
            return false;
        }
        queue.push_back(message);
        true
    }

    /// Drains a response batch for `client_id`, oldest first, bounded by
    /// `max_bytes` of estimated serialized size.
    #[must_use]
    pub fn drain(&self, client_id: &ClientId, max_bytes: usize) -> MessageList {
        let mut batch = MessageList::new();
        let Some(mut queue) = self.queues.get_mut(client_id) else {
            return batch;
        };
        let mut used = 0usize;
        while let Some(front) = queue.front() {
            let estimate = Self::estimate_size(front);
            if !batch.is_empty() && used + estimate > max_bytes {
                break;
            }
            used += estimate;
            batch.push(queue.pop_front().expect("front exists"));
        }
        batch
    }

    /// Returns the number of messages queued for `client_id`.
    #[must_use]
    pub fn queued(&self, client_id: &ClientId) -> usize {
        self.queues.get(client_id).map_or(0, |queue| queue.len())
    }

    /// Estimates the serialized size of one message.
    fn estimate_size(message: &Message) -> usize {
        MESSAGE_OVERHEAD_ESTIMATE
            + message.session_id.as_str().len()
            + message.action.len()
            + message.payload.len()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    use argus_common::types::SessionId;

    fn client(tag: char) -> ClientId {
        ClientId::new(format!("C.{}", String::from(tag).repeat(16))).unwrap()
    }

    fn message(tag: u8) -> Message {
        Message::new(SessionId::new("flows/F:1"), "notify", vec![tag])
    }

    #[test]
    fn test_drain_is_fifo() {
        let outbox = Outbox::new(16);
        let id = client('a');
        for tag in 0..5u8 {
            assert!(outbox.enqueue(id.clone(), message(tag)));
        }
        let batch = outbox.drain(&id, 1 << 20);
        let tags: Vec<u8> = batch.iter().map(|m| m.payload[0]).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4]);
        assert_eq!(outbox.queued(&id), 0);
    }

    #[test]
    fn test_per_client_isolation() {
        let outbox = Outbox::new(16);
        outbox.enqueue(client('a'), message(1));
        outbox.enqueue(client('b'), message(2));

        let batch = outbox.drain(&client('a'), 1 << 20);
        assert_eq!(batch.len(), 1);
        assert_eq!(outbox.queued(&client('b')), 1);
    }

    #[test]
    fn test_bound_enforced() {
        let outbox = Outbox::new(2);
        let id = client('a');
        assert!(outbox.enqueue(id.clone(), message(0)));
        assert!(outbox.enqueue(id.clone(), message(1)));
        assert!(!outbox.enqueue(id.clone(), message(2)));
        assert_eq!(outbox.queued(&id), 2);
    }

    #[test]
    fn test_drain_respects_budget() {
        let outbox = Outbox::new(64);
        let id = client('a');
        for tag in 0..10u8 {
            outbox.enqueue(
                id.clone(),
                Message::new(SessionId::new("flows/F:1"), "notify", vec![tag; 400]),
            );
        }
        let batch = outbox.drain(&id, 1000);
        assert!(!batch.is_empty());
        assert!(batch.len() < 10);
        assert_eq!(outbox.queued(&id), 10 - batch.len());
    }

    #[test]
    fn test_drain_unknown_client_is_empty() {
        let outbox = Outbox::new(16);
        assert!(outbox.drain(&client('c'), 1 << 20).is_empty());
    }
}
