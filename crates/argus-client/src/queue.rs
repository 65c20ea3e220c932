// ============================================
// File: crates/argus-client/src/queue.rs
// ============================================
//! # Outbound Message Queue
//!
//! ## Creation Reason
//! Buffers messages produced between polling cycles and drains them into
//! size-bounded batches, one batch per POST.
//!
//! ## Main Logical Flow
//! 1. Action handlers and local producers `push` messages
//! 2. Each cycle drains a batch bounded by the configured post size;
//!    overflow messages simply wait for the next cycle
//! 3. On a failed POST the batch is requeued at the front so ordering
//!    is preserved across retries
//!
//! ## ⚠️ Important Note for Next Developer
//! - The size bound is an estimate of the serialized size; the envelope
//!   seal enforces the hard limit and the estimate keeps us clear of it
//! - At least one message is always drained, so a single oversized
//!   message cannot wedge the queue forever
//!
//! ## Last Modified
//! v0.1.0 - Initial queue implementation

use std::collections::VecDeque;

use tracing::warn;

use argus_common::types::Priority;
use argus_core::protocol::{Message, MessageList};

// ============================================
// Constants
// ============================================

/// Fixed per-message overhead estimate (ids, lengths, flags).
const MESSAGE_OVERHEAD_ESTIMATE: usize = 64;

// ============================================
// OutQueue
// ============================================

/// Bounded FIFO of outbound messages.
#[derive(Debug)]
pub struct OutQueue {
    items: VecDeque<Message>,
    max_len: usize,
    dropped: u64,
}

impl OutQueue {
    /// Creates a queue bounded to `max_len` messages.
    #[must_use]
    pub fn new(max_len: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_len,
            dropped: 0,
        }
    }

    /// Enqueues a message at the back.
    ///
    /// # Errors
    /// Returns the message back when the queue is full so the caller can
    /// decide whether to retry or drop it.
    pub fn push(&mut self, message: Message) -> Result<(), Message> {
        if self.items.len() >= self.max_len {
            self.dropped += 1;
            warn!(
                queued = self.items.len(),
                dropped_total = self.dropped,
                "outbound queue full"
            );
            return Err(message);
        }
        self.items.push_back(message);
        Ok(())
    }

    /// Drains a batch from the front, bounded by `max_bytes` of estimated
    /// serialized size. Always yields at least one message if any are
    /// queued.
    #[must_use]
    pub fn drain_batch(&mut self, max_bytes: usize) -> MessageList {
        let mut batch = MessageList::new();
        let mut used = 0usize;
        while let Some(front) = self.items.front() {
            let estimate = Self::estimate_size(front);
            if !batch.is_empty() && used + estimate > max_bytes {
                break;
            }
            used += estimate;
            batch.push(self.items.pop_front().expect("front exists"));
        }
        batch
    }

    /// Requeues a drained batch at the front, preserving order.
    ///
    /// Used when a POST fails before the server accepted the batch.
    pub fn requeue_front(&mut self, batch: MessageList) {
        for message in batch.into_iter().rev() {
            self.items.push_front(message);
        }
    }

    /// Checks whether any queued message requests low latency.
    #[must_use]
    pub fn has_high_priority(&self) -> bool {
        self.items.iter().any(|m| m.priority == Priority::High)
    }

    /// Returns the number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the count of messages rejected because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
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

    fn message(tag: u8, payload_len: usize) -> Message {
        Message::new(
            SessionId::new("flows/F:1"),
            "echo",
            vec![tag; payload_len],
        )
    }

    #[test]
    fn test_fifo_order_preserved() {
        let mut queue = OutQueue::new(16);
        for tag in 0..5u8 {
            queue.push(message(tag, 1)).unwrap();
        }
        let batch = queue.drain_batch(1 << 20);
        let tags: Vec<u8> = batch.iter().map(|m| m.payload[0]).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_bound_rejects_when_full() {
        let mut queue = OutQueue::new(2);
        queue.push(message(0, 1)).unwrap();
        queue.push(message(1, 1)).unwrap();
        assert!(queue.push(message(2, 1)).is_err());
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_drain_respects_byte_budget() {
        let mut queue = OutQueue::new(16);
        for tag in 0..10u8 {
            queue.push(message(tag, 400)).unwrap();
        }
        // Budget fits roughly two 400-byte messages plus overhead.
        let batch = queue.drain_batch(1000);
        assert!(batch.len() < 10);
        assert!(!batch.is_empty());
        // The rest wait for the next cycle.
        assert_eq!(queue.len(), 10 - batch.len());
    }

    #[test]
    fn test_oversized_message_still_drains_alone() {
        let mut queue = OutQueue::new(4);
        queue.push(message(0, 10_000)).unwrap();
        let batch = queue.drain_batch(100);
        assert_eq!(batch.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_front_preserves_order() {
        let mut queue = OutQueue::new(16);
        for tag in 0..6u8 {
            queue.push(message(tag, 1)).unwrap();
        }
        let batch = queue.drain_batch(1 << 20);
        queue.requeue_front(batch);
        // Push something new behind the requeued batch.
        queue.push(message(9, 1)).unwrap();

        let drained = queue.drain_batch(1 << 20);
        let tags: Vec<u8> = drained.iter().map(|m| m.payload[0]).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4, 5, 9]);
    }

    #[test]
    fn test_high_priority_detection() {
        let mut queue = OutQueue::new(16);
        queue.push(message(0, 1)).unwrap();
        assert!(!queue.has_high_priority());
        queue
            .push(message(1, 1).with_priority(Priority::High))
            .unwrap();
        assert!(queue.has_high_priority());
    }
}
