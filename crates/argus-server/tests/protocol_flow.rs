// ============================================
// File: crates/argus-server/tests/protocol_flow.rs
// ============================================
//! End-to-end protocol exercise: a fresh agent enrolls against a server
//! that has never seen it, then exchanges authenticated traffic, with
//! the complete client loop driving the complete server pipeline
//! through an in-process channel.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use argus_common::cache::BoundedCache;
use argus_common::types::{AuthState, ClientId, SessionId};
use argus_core::crypto::{Certificate, IdentityKeyPair};
use argus_core::protocol::Message;
use argus_core::SealOptions;

use argus_client::agent::{Agent, CycleOutcome};
use argus_client::comms::ClientCommunicator;
use argus_client::config::ClientConfig;
use argus_client::enroll::EnrollmentPhase;
use argus_client::error::Result as ClientResult;
use argus_client::http::{HttpChannel, PostOutcome};
use argus_client::registry::ActionRegistry;

use argus_server::communicator::ServerCommunicator;
use argus_server::dispatch::ChannelSink;
use argus_server::enroll::EnrollmentService;
use argus_server::outbox::Outbox;
use argus_server::sequencer::SessionSequencer;
use argus_server::server::{handle_envelope, ServerState};
use argus_server::store::{IdentityStore, InMemoryIdentityStore};

// ============================================
// Loopback Channel
// ============================================

/// HTTP channel short-circuited onto the server pipeline.
struct LoopbackChannel {
    state: Arc<ServerState>,
}

#[async_trait]
impl HttpChannel for LoopbackChannel {
    async fn post(&self, _url: &str, body: Vec<u8>) -> ClientResult<PostOutcome> {
        let (status, response) = handle_envelope(&self.state, &body);
        Ok(match status.as_u16() {
            200 => PostOutcome::Accepted(response),
            406 => PostOutcome::EnrollmentRequired,
            other => PostOutcome::Rejected { status: other },
        })
    }
}

// ============================================
// Fixture
// ============================================

struct Fixture {
    agent: Agent<LoopbackChannel>,
    state: Arc<ServerState>,
    sink_rx: tokio::sync::mpsc::UnboundedReceiver<(ClientId, Message)>,
    client_id: ClientId,
}

fn build_fixture() -> Fixture {
    let ca = IdentityKeyPair::generate().unwrap();
    let server_identity = IdentityKeyPair::generate().unwrap();
    let server_certificate = Certificate::issue(
        "server",
        &server_identity.public_key(),
        "ca",
        &ca,
        0,
        Duration::from_secs(24 * 3600),
    )
    .unwrap();

    let store: Arc<dyn IdentityStore> = Arc::new(InMemoryIdentityStore::new());
    let (sink, sink_rx) = ChannelSink::new();

    let communicator = ServerCommunicator::new(
        server_identity,
        "server",
        ca.public_key(),
        Arc::clone(&store),
        BoundedCache::new(64, Duration::from_secs(3600)),
        SessionSequencer::new(64, Duration::from_secs(3600), Duration::from_secs(3600)),
        SealOptions::default(),
    );
    let enrollment = EnrollmentService::new(
        ca,
        "ca",
        store,
        Duration::from_secs(24 * 3600),
        None,
    );
    let state = Arc::new(ServerState {
        communicator,
        enrollment,
        outbox: Outbox::new(64),
        sink: Arc::new(sink),
        max_response_size: 1 << 20,
    });

    // Fresh agent identity: the server has never seen this key.
    let agent_identity = IdentityKeyPair::generate().unwrap();
    let client_id = agent_identity.client_id().unwrap();
    let mut client_comms =
        ClientCommunicator::new(agent_identity, SealOptions::default()).unwrap();
    client_comms
        .load_server_certificate(server_certificate)
        .unwrap();

    let mut config = ClientConfig::default();
    // Keep filesystem side effects inside the test sandbox.
    config.identity.certificate_file = std::env::temp_dir()
        .join(format!("argus-test-{}.crt", client_id.as_str()))
        .display()
        .to_string();

    let mut registry = ActionRegistry::new();
    registry.register("echo", |message: &Message| Ok(message.payload.clone()));

    let agent = Agent::new(
        config,
        client_comms,
        LoopbackChannel {
            state: Arc::clone(&state),
        },
        registry,
    );

    Fixture {
        agent,
        state,
        sink_rx,
        client_id,
    }
}

// ============================================
// Tests
// ============================================

/// The full first-contact story: 406, enrollment, then a 200 poll that
/// delivers ten queued server messages in order.
#[tokio::test]
async fn enrollment_bootstrap_then_ordered_delivery() {
    let mut fixture = build_fixture();

    // First cycle: the server has no certificate for this agent.
    let outcome = fixture.agent.run_once().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Enrolling);
    assert_eq!(fixture.agent.phase(), EnrollmentPhase::Waiting);

    // The enrollment request was processed server-side.
    assert!(
        fixture
            .state
            .communicator
            .stats()
            .unknown_clients
            .load(Ordering::Relaxed)
            > 0
    );

    // Queue ten server→client messages before the next poll.
    for tag in 0..10u8 {
        assert!(fixture.state.outbox.enqueue(
            fixture.client_id.clone(),
            Message::new(SessionId::new("flows/F:7"), "echo", vec![tag]),
        ));
    }

    // Second cycle: now a known client; the response carries the issued
    // certificate plus the ten queued messages, in order.
    let outcome = fixture.agent.run_once().await.unwrap();
    match outcome {
        CycleOutcome::Success { delivered } => assert_eq!(delivered, 11),
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(fixture.agent.phase(), EnrollmentPhase::Enrolled);

    // Ten echo responses queued for the next cycle.
    assert_eq!(fixture.agent.queued(), 10);

    // Third cycle: the echo responses arrive at the server's flow layer
    // AUTHENTICATED and in transmission order.
    let outcome = fixture.agent.run_once().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Success { .. }));

    let mut payloads = Vec::new();
    while let Ok((from, message)) = fixture.sink_rx.try_recv() {
        assert_eq!(from, fixture.client_id);
        assert_eq!(message.auth_state, AuthState::Authenticated);
        payloads.push(message.payload[0]);
    }
    assert_eq!(payloads, (0..10).collect::<Vec<u8>>());
}

/// Messages queued before first contact survive the 406 round trip and
/// reach the flow layer once enrollment completes.
#[tokio::test]
async fn queued_traffic_survives_enrollment() {
    let mut fixture = build_fixture();

    fixture.agent.enqueue(Message::new(
        SessionId::new("flows/F:3"),
        "report_findings",
        vec![0xAB],
    ));

    // First cycle bounces on 406; the batch is requeued, not lost.
    assert_eq!(
        fixture.agent.run_once().await.unwrap(),
        CycleOutcome::Enrolling
    );
    assert_eq!(fixture.agent.queued(), 1);

    // Second cycle delivers it to the server's flow layer.
    let outcome = fixture.agent.run_once().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Success { .. }));

    let (from, message) = fixture.sink_rx.try_recv().unwrap();
    assert_eq!(from, fixture.client_id);
    assert_eq!(message.action, "report_findings");
    assert_eq!(message.payload, vec![0xAB]);
    assert_eq!(message.auth_state, AuthState::Authenticated);
}
