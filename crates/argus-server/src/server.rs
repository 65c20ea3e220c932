// ============================================
// File: crates/argus-server/src/server.rs
// ============================================
//! # Control Endpoint
//!
//! ## Creation Reason
//! Exposes the single HTTP surface of the protocol: agents POST sealed
//! envelopes to `/control` and receive a sealed response envelope back.
//!
//! ## Status Mapping
//! | Status | Meaning |
//! |--------|---------|
//! | 200    | accepted; the body is a response envelope |
//! | 406    | unknown client certificate; enroll first |
//! | 400    | malformed or cryptographically unverifiable envelope |
//! | 500    | the response could not be sealed |
//!
//! ## Request Pipeline
//! ```text
//! body ──decrypt──► known client ──► dispatch + enrollment messages
//!        │                          ──► drain outbox ──► seal ──► 200
//!        ├──► unknown client ──► process enrollment requests ──► 406
//!        └──► error ──► 400 (dropped, logged, never retried verbatim)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `handle_envelope` is a pure function of the state and body so the
//!   whole pipeline can be exercised without a socket; the axum layer
//!   adds nothing but transport
//!
//! ## Last Modified
//! v0.1.0 - Initial control endpoint

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tracing::{debug, info, warn};

use argus_common::types::{ClientId, ENROLL_REQUEST_ACTION};
use argus_core::protocol::Message;

use crate::communicator::{DecryptOutcome, ServerCommunicator};
use crate::dispatch::MessageSink;
use crate::enroll::EnrollmentService;
use crate::outbox::Outbox;

// ============================================
// ServerState
// ============================================

/// Everything one request needs, injected at construction.
///
/// Lifecycle is owned by the process entry point; there are no ambient
/// globals anywhere in the request path.
pub struct ServerState {
    /// Envelope opening/sealing and identity caching.
    pub communicator: ServerCommunicator,
    /// Certificate issuance.
    pub enrollment: EnrollmentService,
    /// Server→client message buffering.
    pub outbox: Outbox,
    /// The flow layer.
    pub sink: Arc<dyn MessageSink>,
    /// Response payload budget per poll, in bytes.
    pub max_response_size: usize,
}

// ============================================
// Router
// ============================================

/// Builds the control router around shared state.
#[must_use]
pub fn router(state: Arc<ServerState>) -> Router {
    let body_limit = state.max_response_size.saturating_mul(4).max(1 << 20);
    Router::new()
        .route("/control", post(control))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// POST /control: one envelope in, one envelope out.
async fn control(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> (StatusCode, Vec<u8>) {
    handle_envelope(&state, &body)
}

// ============================================
// Request Pipeline
// ============================================

/// Processes one sealed envelope and produces the HTTP reply.
///
/// Synchronous and socket-free by design: integration tests drive the
/// complete protocol through this function.
#[must_use]
pub fn handle_envelope(state: &ServerState, body: &[u8]) -> (StatusCode, Vec<u8>) {
    match state.communicator.decrypt_envelope(body) {
        Ok(DecryptOutcome::Known {
            messages,
            client_id,
            ..
        }) => {
            for message in messages {
                deliver_known(state, &client_id, message);
            }
            respond_to(state, &client_id)
        }
        Ok(DecryptOutcome::UnknownClient { messages, claimed }) => {
            debug!(claimed, "envelope from unknown client");
            for message in messages.iter() {
                maybe_enroll(state, message);
            }
            (StatusCode::NOT_ACCEPTABLE, Vec::new())
        }
        Err(error) => {
            // Structural and cryptographic failures alike: drop the
            // envelope, log, and let the sender re-seal if it cares.
            warn!(%error, "envelope rejected");
            (StatusCode::BAD_REQUEST, Vec::new())
        }
    }
}

/// Routes one message from a known client.
fn deliver_known(state: &ServerState, client_id: &ClientId, message: Message) {
    // Enrollment traffic is consumed by the protocol itself; a known
    // client re-enrolling is how certificate refresh works.
    if message.session_id.is_enrollment() && message.action == ENROLL_REQUEST_ACTION {
        maybe_enroll(state, &message);
        return;
    }
    state.sink.dispatch(client_id, message);
}

/// Processes an enrollment request message, if it is one.
fn maybe_enroll(state: &ServerState, message: &Message) {
    if !message.session_id.is_enrollment() || message.action != ENROLL_REQUEST_ACTION {
        return;
    }
    match state.enrollment.process_request(message) {
        Ok((client_id, certificate)) => {
            // A fresh certificate may replace a cached key.
            state.communicator.invalidate_identity(&client_id);
            let response = EnrollmentService::issued_certificate_message(&certificate);
            state.outbox.enqueue(client_id.clone(), response);
            info!(client = %client_id, "enrollment processed");
        }
        Err(error) => warn!(%error, "enrollment request refused"),
    }
}

/// Drains the client's outbox and seals the response envelope.
fn respond_to(state: &ServerState, client_id: &ClientId) -> (StatusCode, Vec<u8>) {
    let batch = state.outbox.drain(client_id, state.max_response_size);
    match state.communicator.encode_response(&batch, client_id) {
        Ok(bytes) => (StatusCode::OK, bytes),
        Err(error) => {
            warn!(client = %client_id, %error, "failed to seal response");
            (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
        }
    }
}

// ============================================
// Tests
// ============================================
