// ============================================
// File: crates/argus-server/src/dispatch.rs
// ============================================
//! # Message Sink Interface
//!
//! ## Creation Reason
//! The flow-processing layer is an external collaborator; the protocol
//! core hands it every decoded, classified message through this seam and
//! nothing else.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The sink alone decides what to do with DESYNCHRONIZED and
//!   UNAUTHENTICATED messages; the transport never filters them
//! - Sinks run on the request path; expensive work must be queued, not
//!   performed inline
//!
//! ## Last Modified
//! v0.1.0 - Initial sink interface

use tracing::info;

use argus_common::types::ClientId;
use argus_core::protocol::Message;

// ============================================
// MessageSink Trait
// ============================================

/// Receives every decoded, classified inbound message exactly once.
pub trait MessageSink: Send + Sync {
    /// Hands one message to the flow layer.
    fn dispatch(&self, client_id: &ClientId, message: Message);
}

// ============================================
// LoggingSink
// ============================================

/// Default sink: records message metadata and drops the payload.
///
/// Stands in for the flow layer in single-binary deployments and tests.
#[derive(Debug, Default, Clone)]
pub struct LoggingSink;

impl MessageSink for LoggingSink {
    fn dispatch(&self, client_id: &ClientId, message: Message) {
        info!(
            client = %client_id,
            session = %message.session_id,
            action = %message.action,
            state = %message.auth_state,
            payload_len = message.payload.len(),
            "message received"
        );
    }
}

// ============================================
// ChannelSink
// ============================================

/// Sink forwarding messages into an unbounded channel.
///
/// Used by embedders and integration tests to observe delivery order.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: tokio::sync::mpsc::UnboundedSender<(ClientId, Message)>,
}

impl ChannelSink {
    /// Creates a sink and the receiving half.
    #[must_use]
    pub fn new() -> (
        Self,
        tokio::sync::mpsc::UnboundedReceiver<(ClientId, Message)>,
    ) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl MessageSink for ChannelSink {
    fn dispatch(&self, client_id: &ClientId, message: Message) {
        // A dropped receiver means the embedder went away; nothing to do.
        let _ = self.sender.send((client_id.clone(), message));
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    use argus_common::types::SessionId;

    #[test]
    fn test_channel_sink_preserves_order() {
        let (sink, mut receiver) = ChannelSink::new();
        let id = ClientId::new("C.0011223344556677").unwrap();

        for tag in 0..3u8 {
            sink.dispatch(
                &id,
                Message::new(SessionId::new("flows/F:1"), "notify", vec![tag]),
            );
        }

        let mut tags = Vec::new();
        while let Ok((_, message)) = receiver.try_recv() {
            tags.push(message.payload[0]);
        }
        assert_eq!(tags, vec![0, 1, 2]);
    }
}
