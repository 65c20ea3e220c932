// ============================================
// File: crates/argus-client/src/agent.rs
// ============================================
//! # Agent Polling Loop
//!
//! ## Creation Reason
//! Implements the single-threaded transport state machine: gather
//! outbound messages, seal, POST, classify the outcome, deliver inbound
//! messages, sleep, repeat.
//!
//! ## Cycle State Machine
//! ```text
//! IDLE ──► SENDING ──► SUCCESS  (deliver inbound, fast poll or decay)
//!                 ├──► RETRY    (requeue batch, error-paced sleep)
//!                 ├──► ENROLL   (send signing request, retry batch next)
//!                 └──► FATAL    (error limit hit, loop returns Err)
//! ```
//! Exactly one request is ever in flight; the loop blocks on each POST
//! by design, trading throughput for bounded resource use on endpoints.
//!
//! ## ⚠️ Important Note for Next Developer
//! - A batch is requeued ONLY when the server never accepted it; once a
//!   200 arrived the batch is spent, even if the response fails to parse
//! - A failed response parse triggers a freshly sealed retry next cycle,
//!   never a verbatim resend of the same response request
//!
//! ## Last Modified
//! v0.1.0 - Initial agent loop implementation

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use argus_core::protocol::{Message, MessageList};

use crate::comms::ClientCommunicator;
use crate::config::ClientConfig;
use crate::enroll::{
    accept_issued_certificate, build_enrollment_message, EnrollmentPhase,
    ENROLL_CERTIFICATE_ACTION,
};
use crate::error::{ClientError, Result};
use crate::http::{post_any, HttpChannel, PostOutcome};
use crate::poll::PollState;
use crate::queue::OutQueue;
use crate::registry::ActionRegistry;

// ============================================
// CycleOutcome
// ============================================

/// The closed set of outcomes one polling cycle can produce.
///
/// Raw protocol errors never escape past this boundary; fatal conditions
/// surface as `Err` from [`Agent::run_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The server accepted the batch and the response was delivered.
    Success {
        /// Inbound messages handed to handlers this cycle
        delivered: usize,
    },
    /// Transient failure; the batch waits for the next cycle.
    Retry,
    /// The server demanded enrollment; a signing request was sent.
    Enrolling,
}

// ============================================
// AgentStats
// ============================================

/// Transfer counters for diagnostics.
#[derive(Debug, Default)]
pub struct AgentStats {
    /// Envelopes successfully POSTed and accepted.
    pub envelopes_sent: AtomicU64,
    /// Response envelopes successfully decoded.
    pub envelopes_received: AtomicU64,
    /// Outbound messages accepted by the server.
    pub messages_sent: AtomicU64,
    /// Inbound messages handed to handlers.
    pub messages_delivered: AtomicU64,
    /// Enrollment signing requests sent.
    pub enrollment_attempts: AtomicU64,
    /// Connection-level failures observed.
    pub connection_failures: AtomicU64,
}

// ============================================
// Agent
// ============================================

/// The endpoint agent: owns the queue, communicator, and polling state.
pub struct Agent<C: HttpChannel> {
    config: ClientConfig,
    communicator: ClientCommunicator,
    channel: C,
    queue: OutQueue,
    poll: PollState,
    registry: ActionRegistry,
    phase: EnrollmentPhase,
    stats: AgentStats,
    shutdown: Arc<AtomicBool>,
}

impl<C: HttpChannel> Agent<C> {
    /// Creates an agent from its collaborators.
    ///
    /// Lifecycle is owned by the process entry point; nothing here reads
    /// ambient global state.
    #[must_use]
    pub fn new(
        config: ClientConfig,
        communicator: ClientCommunicator,
        channel: C,
        registry: ActionRegistry,
    ) -> Self {
        let queue = OutQueue::new(config.queue.max_out_queue);
        let poll = PollState::new(config.poll.clone());
        // Holding the server's certificate says nothing about whether the
        // server knows US; assume unenrolled until a cycle proves it.
        let phase = EnrollmentPhase::Unenrolled;
        Self {
            config,
            communicator,
            channel,
            queue,
            poll,
            registry,
            phase,
            stats: AgentStats::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a handle that stops the loop at the next cycle boundary.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Returns the transfer counters.
    #[must_use]
    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// Returns the current enrollment phase.
    #[must_use]
    pub fn phase(&self) -> EnrollmentPhase {
        self.phase
    }

    /// Returns the number of queued outbound messages.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Enqueues an outbound message.
    ///
    /// High-priority messages request a fast poll for the next cycle.
    /// A full queue drops the message with a warning; producers that
    /// cannot tolerate loss must pace themselves on [`Agent::queued`].
    pub fn enqueue(&mut self, message: Message) {
        if message.wants_fast_poll() {
            self.poll.request_fast_poll();
        }
        if let Err(rejected) = self.queue.push(message) {
            warn!(action = %rejected.action, "dropping outbound message, queue full");
        }
    }

    /// Runs the polling loop until shutdown or a fatal error.
    ///
    /// # Errors
    /// Returns the fatal error that terminated the loop; the supervisor
    /// is expected to restart the process.
    pub async fn run(&mut self) -> Result<()> {
        info!(client_id = %self.communicator.client_id(), "agent loop starting");
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("agent loop stopping on shutdown request");
                return Ok(());
            }
            let outcome = self.run_once().await?;
            debug!(?outcome, "cycle complete");

            tokio::time::sleep(self.poll.next_delay()).await;
        }
    }

    /// Runs exactly one polling cycle.
    ///
    /// # Errors
    /// - `TooManyFailures`: consecutive connection failures hit the limit
    /// - `NoServerCertificate`: the agent is missing its trust anchor
    pub async fn run_once(&mut self) -> Result<CycleOutcome> {
        if self.queue.has_high_priority() {
            self.poll.request_fast_poll();
        }

        let batch = self.queue.drain_batch(self.config.queue.max_post_size);
        let had_outbound = !batch.is_empty();
        let batch_len = batch.len();

        let bytes = match self.communicator.encode_messages(&batch) {
            Ok(bytes) => bytes,
            Err(error) => {
                // Losing the batch here would silently drop data.
                self.queue.requeue_front(batch);
                return Err(error);
            }
        };

        match post_any(&self.channel, &self.config.transport.control_urls, &bytes).await {
            Ok(PostOutcome::Accepted(body)) => {
                self.stats.envelopes_sent.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .messages_sent
                    .fetch_add(batch_len as u64, Ordering::Relaxed);
                match self.communicator.decode_response(&body) {
                    Ok(messages) => {
                        self.stats.envelopes_received.fetch_add(1, Ordering::Relaxed);
                        let delivered = self.deliver(messages).await;
                        self.poll.on_success(had_outbound);
                        Ok(CycleOutcome::Success { delivered })
                    }
                    Err(error) => {
                        // The batch is spent; only the response was bad.
                        // Next cycle re-seals from scratch.
                        warn!(%error, "response envelope rejected");
                        self.poll.on_protocol_error();
                        Ok(CycleOutcome::Retry)
                    }
                }
            }
            Ok(PostOutcome::EnrollmentRequired) => {
                debug!("server does not know this agent, enrolling");
                self.queue.requeue_front(batch);
                self.send_enrollment_request().await;
                self.phase = EnrollmentPhase::Waiting;
                self.poll.request_fast_poll();
                Ok(CycleOutcome::Enrolling)
            }
            Ok(PostOutcome::Rejected { status }) => {
                warn!(status, "server rejected the request");
                self.queue.requeue_front(batch);
                self.stats.connection_failures.fetch_add(1, Ordering::Relaxed);
                self.poll.on_connection_error()?;
                Ok(CycleOutcome::Retry)
            }
            Err(error) => {
                warn!(%error, "no control URL reachable");
                self.queue.requeue_front(batch);
                self.stats.connection_failures.fetch_add(1, Ordering::Relaxed);
                self.poll.on_connection_error()?;
                Ok(CycleOutcome::Retry)
            }
        }
    }

    /// Sends the enrollment signing request; best effort.
    ///
    /// Failures are logged, not escalated: the next cycle hits 406 again
    /// and retries enrollment from scratch.
    async fn send_enrollment_request(&mut self) {
        self.stats.enrollment_attempts.fetch_add(1, Ordering::Relaxed);
        let message = match build_enrollment_message(self.communicator.identity()) {
            Ok(message) => message,
            Err(error) => {
                error!(%error, "failed to build enrollment request");
                return;
            }
        };
        let list = MessageList::from(vec![message]);
        let bytes = match self.communicator.encode_messages(&list) {
            Ok(bytes) => bytes,
            Err(error) => {
                error!(%error, "failed to seal enrollment request");
                return;
            }
        };
        match post_any(&self.channel, &self.config.transport.control_urls, &bytes).await {
            Ok(PostOutcome::Accepted(body)) => {
                // The certificate may already ride back on this response.
                if let Ok(messages) = self.communicator.decode_response(&body) {
                    let _ = self.deliver(messages).await;
                }
            }
            Ok(outcome) => debug!(?outcome, "enrollment request not accepted yet"),
            Err(error) => warn!(%error, "enrollment request did not reach the server"),
        }
    }

    /// Delivers inbound messages: enrollment responses are consumed here,
    /// everything else goes through the action registry and its response
    /// is queued for the next cycle.
    async fn deliver(&mut self, messages: MessageList) -> usize {
        let mut delivered = 0usize;
        for message in messages {
            delivered += 1;
            self.stats.messages_delivered.fetch_add(1, Ordering::Relaxed);
            if message.wants_fast_poll() {
                self.poll.request_fast_poll();
            }

            if message.session_id.is_enrollment() && message.action == ENROLL_CERTIFICATE_ACTION {
                self.store_issued_certificate(&message).await;
                continue;
            }

            let response = self.registry.dispatch(&message);
            if let Err(rejected) = self.queue.push(response) {
                warn!(action = %rejected.action, "dropping response, queue full");
            }
        }
        delivered
    }

    /// Validates and persists the certificate issued at enrollment.
    async fn store_issued_certificate(&mut self, message: &Message) {
        match accept_issued_certificate(message, self.communicator.identity()) {
            Ok(certificate) => {
                let path = &self.config.identity.certificate_file;
                if let Err(error) = tokio::fs::write(path, certificate.to_bytes()).await {
                    warn!(%error, path, "could not persist issued certificate");
                }
                self.phase = EnrollmentPhase::Enrolled;
                info!(serial = certificate.serial, "enrollment complete");
            }
            Err(error) => warn!(%error, "rejected issued certificate"),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use argus_common::time::Timestamp;
    use argus_common::types::SessionId;
    use argus_core::crypto::{Certificate, IdentityKeyPair};
    use argus_core::{seal_envelope, SealOptions};

    fn server_identity() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn client_identity() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn server_certificate() -> Certificate {
        Certificate::issue(
            "server",
            &server_identity().public_key(),
            "ca",
            server_identity(),
            1,
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    /// Seals a server→client response batch for the scripted channel.
    fn sealed_response(messages: MessageList) -> Vec<u8> {
        let client_id = client_identity().client_id().unwrap();
        seal_envelope(
            &messages,
            "server",
            client_id.as_str(),
            Timestamp::now(),
            server_identity(),
            &client_identity().public_key(),
            &SealOptions::default(),
        )
        .unwrap()
    }

    /// Channel replaying a fixed script of outcomes.
    struct ScriptChannel {
        script: Mutex<Vec<Result<PostOutcome>>>,
    }

    impl ScriptChannel {
        fn new(script: Vec<Result<PostOutcome>>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl HttpChannel for ScriptChannel {
        async fn post(&self, _url: &str, _body: Vec<u8>) -> Result<PostOutcome> {
            self.script.lock().remove(0)
        }
    }

    fn test_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.poll.connection_error_limit = 2;
        config
    }

    fn agent_with(channel: ScriptChannel) -> Agent<ScriptChannel> {
        let identity = IdentityKeyPair::from_pkcs8_pem(
            &client_identity().to_pkcs8_pem().unwrap(),
        )
        .unwrap();
        let mut communicator =
            ClientCommunicator::new(identity, SealOptions::default()).unwrap();
        communicator
            .load_server_certificate(server_certificate())
            .unwrap();

        let mut registry = ActionRegistry::new();
        registry.register("echo", |message: &Message| Ok(message.payload.clone()));

        Agent::new(test_config(), communicator, channel, registry)
    }

    #[tokio::test]
    async fn test_empty_cycle_succeeds() {
        let response = sealed_response(MessageList::new());
        let channel = ScriptChannel::new(vec![Ok(PostOutcome::Accepted(response))]);
        let mut agent = agent_with(channel);

        let outcome = agent.run_once().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Success { delivered: 0 });
        assert_eq!(agent.stats().envelopes_sent.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_inbound_messages_dispatched_in_order() {
        let inbound = MessageList::from(vec![
            Message::new(SessionId::new("flows/F:1"), "echo", vec![1]),
            Message::new(SessionId::new("flows/F:1"), "echo", vec![2]),
            Message::new(SessionId::new("flows/F:1"), "echo", vec![3]),
        ]);
        let channel =
            ScriptChannel::new(vec![Ok(PostOutcome::Accepted(sealed_response(inbound)))]);
        let mut agent = agent_with(channel);

        let outcome = agent.run_once().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Success { delivered: 3 });
        // Each inbound request produced a queued response, in order.
        assert_eq!(agent.queued(), 3);
    }

    #[tokio::test]
    async fn test_enrollment_on_406() {
        let channel = ScriptChannel::new(vec![
            Ok(PostOutcome::EnrollmentRequired),
            // The enrollment POST itself is answered politely.
            Ok(PostOutcome::Accepted(sealed_response(MessageList::new()))),
        ]);
        let mut agent = agent_with(channel);
        agent.enqueue(Message::new(SessionId::new("flows/F:9"), "echo", vec![42]));

        let outcome = agent.run_once().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Enrolling);
        assert_eq!(agent.phase(), EnrollmentPhase::Waiting);
        // Two POSTs happened: the original batch, then the signing request.
        assert_eq!(agent.stats().enrollment_attempts.load(Ordering::Relaxed), 1);
        // The original message survived for the next cycle.
        assert_eq!(agent.queued(), 1);
    }

    #[tokio::test]
    async fn test_connection_errors_escalate_to_fatal() {
        let channel = ScriptChannel::new(vec![
            Err(ClientError::connection("refused")),
            Err(ClientError::connection("refused")),
        ]);
        let mut agent = agent_with(channel);

        assert_eq!(agent.run_once().await.unwrap(), CycleOutcome::Retry);
        let result = agent.run_once().await;
        assert!(matches!(result, Err(ClientError::TooManyFailures { .. })));
    }

    #[tokio::test]
    async fn test_bad_response_is_retry_not_fatal() {
        let channel = ScriptChannel::new(vec![
            Ok(PostOutcome::Accepted(vec![0xBA, 0xD0])),
            Ok(PostOutcome::Accepted(vec![0xBA, 0xD0])),
            Ok(PostOutcome::Accepted(vec![0xBA, 0xD0])),
        ]);
        let mut agent = agent_with(channel);

        // Protocol failures never count toward the connection limit (2).
        for _ in 0..3 {
            assert_eq!(agent.run_once().await.unwrap(), CycleOutcome::Retry);
        }
    }

    #[tokio::test]
    async fn test_rejected_batch_requeued() {
        let channel = ScriptChannel::new(vec![Ok(PostOutcome::Rejected { status: 503 })]);
        let mut agent = agent_with(channel);
        agent.enqueue(Message::new(SessionId::new("flows/F:2"), "echo", vec![7]));

        assert_eq!(agent.run_once().await.unwrap(), CycleOutcome::Retry);
        assert_eq!(agent.queued(), 1);
    }
}
