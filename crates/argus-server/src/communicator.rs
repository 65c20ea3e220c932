// ============================================
// File: crates/argus-server/src/communicator.rs
// ============================================
//! # Server Communicator
//!
//! ## Creation Reason
//! Owns the server's identity material and drives envelope opening and
//! response sealing for every client request, including the bounded
//! identity→public-key cache in front of the durable store.
//!
//! ## Main Logical Flow (one request)
//! ```text
//! bytes ──open──► claimed source
//!        │
//!        ├─ key known ──► signature ok ──► sequencer ──► Known{...}
//!        │                signature bad ──► rejected (error)
//!        │
//!        └─ key unknown ──► UnknownClient{...}  (messages stay
//!                            UNAUTHENTICATED; maps to HTTP 406)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Stored certificates are re-verified against the CA before their key
//!   enters the cache; a corrupted store entry must not mint identities
//! - The cache is invalidated whenever enrollment (re)persists a
//!   certificate, otherwise key rotation would be invisible for a TTL
//!
//! ## Last Modified
//! v0.1.0 - Initial server communicator

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use argus_common::cache::BoundedCache;
use argus_common::time::Timestamp;
use argus_common::types::{AuthState, ClientId};
use argus_core::crypto::{Certificate, IdentityKeyPair, IdentityPublicKey};
use argus_core::protocol::MessageList;
use argus_core::{open_envelope, seal_envelope, SealOptions, SourceVerification};

use crate::error::{Result, ServerError};
use crate::sequencer::SessionSequencer;
use crate::store::IdentityStore;

// ============================================
// DecryptOutcome
// ============================================

/// Result of opening one client envelope.
///
/// "Unknown client" is a first-class outcome, not an error: it is the
/// expected, benign first-contact case that maps to HTTP 406 and
/// enrollment, never to attack logging.
#[derive(Debug)]
pub enum DecryptOutcome {
    /// The source identity is on record and proved itself.
    Known {
        /// Decoded messages, stamped with the freshness classification.
        messages: MessageList,
        /// The proven source identity.
        client_id: ClientId,
        /// Freshness nonce from the envelope.
        nonce: Timestamp,
    },
    /// No certificate is on record for the claimed source.
    UnknownClient {
        /// Decoded messages, all UNAUTHENTICATED.
        messages: MessageList,
        /// The claimed (unproven) source name.
        claimed: String,
    },
}

// ============================================
// ServerStats
// ============================================

/// Transfer counters for diagnostics.
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Envelopes successfully opened.
    pub envelopes_opened: AtomicU64,
    /// Responses sealed.
    pub responses_sealed: AtomicU64,
    /// Envelopes from clients with no certificate on record.
    pub unknown_clients: AtomicU64,
    /// Envelopes classified DESYNCHRONIZED.
    pub desynchronized: AtomicU64,
}

// ============================================
// ServerCommunicator
// ============================================

/// Opens client envelopes and seals responses, fleet-wide.
///
/// Stateless per call except for the bounded identity cache and the
/// sequencer state, both safe under concurrent requests.
pub struct ServerCommunicator {
    /// Server private key.
    identity: IdentityKeyPair,
    /// Server identity name (its certificate subject).
    identity_name: String,
    /// CA public key used to re-verify stored certificates.
    ca_key: IdentityPublicKey,
    /// Durable certificate store (external collaborator).
    store: Arc<dyn IdentityStore>,
    /// Bounded identity→public-key cache in front of the store.
    key_cache: BoundedCache<ClientId, IdentityPublicKey>,
    /// Per-client freshness classification.
    sequencer: SessionSequencer,
    /// Sealing parameters from configuration.
    options: SealOptions,
    /// Last response nonce handed out (server→client direction).
    last_nonce: AtomicI64,
    /// Transfer counters.
    stats: ServerStats,
}

impl ServerCommunicator {
    /// Creates a communicator.
    #[must_use]
    pub fn new(
        identity: IdentityKeyPair,
        identity_name: impl Into<String>,
        ca_key: IdentityPublicKey,
        store: Arc<dyn IdentityStore>,
        key_cache: BoundedCache<ClientId, IdentityPublicKey>,
        sequencer: SessionSequencer,
        options: SealOptions,
    ) -> Self {
        Self {
            identity,
            identity_name: identity_name.into(),
            ca_key,
            store,
            key_cache,
            sequencer,
            options,
            last_nonce: AtomicI64::new(0),
            stats: ServerStats::default(),
        }
    }

    /// Returns the transfer counters.
    #[must_use]
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Opens one client envelope and classifies its messages.
    ///
    /// # Errors
    /// Structural and cryptographic errors from the core; notably
    /// `SignatureVerification` when a KNOWN client's signature is wrong.
    pub fn decrypt_envelope(&self, bytes: &[u8]) -> Result<DecryptOutcome> {
        let opened = open_envelope(
            bytes,
            &self.identity,
            |source| self.resolve_key(source),
            &self.options,
        )?;
        self.stats.envelopes_opened.fetch_add(1, Ordering::Relaxed);

        match opened.verification {
            SourceVerification::Verified => {
                let client_id = ClientId::new(&opened.source)?;
                let auth_state = self.sequencer.classify(&client_id, opened.nonce);
                if auth_state == AuthState::Desynchronized {
                    self.stats.desynchronized.fetch_add(1, Ordering::Relaxed);
                }
                let mut messages = opened.messages;
                messages.stamp_auth_state(auth_state);
                debug!(
                    client = %client_id,
                    batch = messages.len(),
                    state = %auth_state,
                    "envelope accepted"
                );
                Ok(DecryptOutcome::Known {
                    messages,
                    client_id,
                    nonce: opened.nonce,
                })
            }
            SourceVerification::UnknownSource => {
                self.stats.unknown_clients.fetch_add(1, Ordering::Relaxed);
                Ok(DecryptOutcome::UnknownClient {
                    messages: opened.messages,
                    claimed: opened.source,
                })
            }
        }
    }

    /// Seals a response batch for `client_id`.
    ///
    /// # Errors
    /// - `UnknownClient`: no key on record for the recipient
    /// - sealing errors from the core
    pub fn encode_response(
        &self,
        messages: &MessageList,
        client_id: &ClientId,
    ) -> Result<Vec<u8>> {
        let Some(client_key) = self.resolve_key(client_id.as_str()) else {
            return Err(ServerError::UnknownClient {
                client_id: client_id.as_str().to_string(),
            });
        };

        let bytes = seal_envelope(
            messages,
            &self.identity_name,
            client_id.as_str(),
            self.next_nonce(),
            &self.identity,
            &client_key,
            &self.options,
        )?;
        self.stats.responses_sealed.fetch_add(1, Ordering::Relaxed);
        Ok(bytes)
    }

    /// Drops the cached key for `client_id`.
    ///
    /// Called whenever a certificate is (re)persisted so key rotation
    /// takes effect immediately instead of after a cache TTL.
    pub fn invalidate_identity(&self, client_id: &ClientId) {
        self.key_cache.invalidate(client_id);
    }

    /// Resolves a claimed source name to a public key: cache first, then
    /// the durable store, re-verifying the stored certificate on a miss.
    fn resolve_key(&self, source: &str) -> Option<IdentityPublicKey> {
        let client_id = ClientId::new(source).ok()?;
        if let Some(key) = self.key_cache.get(&client_id) {
            return Some(key);
        }
        let certificate = self.store.lookup_certificate(&client_id)?;
        match self.verify_stored_certificate(&client_id, &certificate) {
            Some(key) => {
                self.key_cache.put(client_id, key.clone());
                Some(key)
            }
            None => None,
        }
    }

    /// Re-verifies a stored certificate before trusting its key.
    fn verify_stored_certificate(
        &self,
        client_id: &ClientId,
        certificate: &Certificate,
    ) -> Option<IdentityPublicKey> {
        if certificate.subject != client_id.as_str() {
            warn!(client = %client_id, "stored certificate subject mismatch");
            return None;
        }
        if let Err(error) = certificate.verify(&self.ca_key, Timestamp::now()) {
            warn!(client = %client_id, %error, "stored certificate failed verification");
            return None;
        }
        certificate.public_key().ok()
    }

    /// Returns the next strictly monotonic response nonce.
    fn next_nonce(&self) -> Timestamp {
        let now = Timestamp::now().as_micros();
        let mut current = self.last_nonce.load(Ordering::Relaxed);
        loop {
            let next = now.max(current + 1);
            match self.last_nonce.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Timestamp::from_micros(next),
                Err(observed) => current = observed,
            }
        }
    }
}

impl std::fmt::Debug for ServerCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerCommunicator")
            .field("identity_name", &self.identity_name)
            .finish_non_exhaustive()
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

    use argus_common::types::SessionId;
    use argus_core::protocol::Message;

    use crate::store::InMemoryIdentityStore;

    fn ca() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn server_identity() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn client_identity() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn communicator_with_store(store: Arc<InMemoryIdentityStore>) -> ServerCommunicator {
        let identity =
            IdentityKeyPair::from_pkcs8_pem(&server_identity().to_pkcs8_pem().unwrap()).unwrap();
        ServerCommunicator::new(
            identity,
            "server",
            ca().public_key(),
            store,
            BoundedCache::new(64, Duration::from_secs(3600)),
            SessionSequencer::new(64, Duration::from_secs(3600), Duration::from_secs(3600)),
            SealOptions::default(),
        )
    }

    fn enroll_client(store: &InMemoryIdentityStore) -> ClientId {
        let client_id = client_identity().client_id().unwrap();
        let cert = Certificate::issue(
            client_id.as_str(),
            &client_identity().public_key(),
            "ca",
            ca(),
            1,
            Duration::from_secs(3600),
        )
        .unwrap();
        store.persist_certificate(client_id.clone(), cert);
        client_id
    }

    fn client_envelope(nonce_micros: i64) -> Vec<u8> {
        let batch = MessageList::from(vec![Message::new(
            SessionId::new("flows/F:1"),
            "collect_logs",
            vec![1, 2, 3],
        )]);
        seal_envelope(
            &batch,
            client_identity().client_id().unwrap().as_str(),
            "server",
            Timestamp::from_micros(nonce_micros),
            client_identity(),
            &server_identity().public_key(),
            &SealOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_client_is_outcome_not_error() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let comms = communicator_with_store(store);

        let outcome = comms
            .decrypt_envelope(&client_envelope(1_700_000_000_000_000))
            .unwrap();
        match outcome {
            DecryptOutcome::UnknownClient { messages, claimed } => {
                assert_eq!(claimed, client_identity().client_id().unwrap().as_str());
                assert!(messages
                    .iter()
                    .all(|m| m.auth_state == AuthState::Unauthenticated));
            }
            DecryptOutcome::Known { .. } => panic!("client should be unknown"),
        }
    }

    #[test]
    fn test_known_client_is_authenticated() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let expected = enroll_client(&store);
        let comms = communicator_with_store(store);

        let outcome = comms
            .decrypt_envelope(&client_envelope(1_700_000_000_000_000))
            .unwrap();
        match outcome {
            DecryptOutcome::Known {
                messages,
                client_id,
                ..
            } => {
                assert_eq!(client_id, expected);
                assert!(messages
                    .iter()
                    .all(|m| m.auth_state == AuthState::Authenticated));
            }
            DecryptOutcome::UnknownClient { .. } => panic!("client should be known"),
        }
    }

    #[test]
    fn test_stale_nonce_marks_desynchronized() {
        let store = Arc::new(InMemoryIdentityStore::new());
        enroll_client(&store);
        let comms = communicator_with_store(store);

        let base = 1_700_000_000_000_000i64;
        let first = client_envelope(base);
        // Accept at base, advance past tolerance, then replay the first
        // envelope bytes verbatim.
        comms.decrypt_envelope(&first).unwrap();
        comms
            .decrypt_envelope(&client_envelope(base + 3700 * 1_000_000))
            .unwrap();
        let outcome = comms.decrypt_envelope(&first).unwrap();
        match outcome {
            DecryptOutcome::Known { messages, .. } => {
                assert!(messages
                    .iter()
                    .all(|m| m.auth_state == AuthState::Desynchronized));
            }
            DecryptOutcome::UnknownClient { .. } => panic!("client should be known"),
        }
        assert_eq!(comms.stats().desynchronized.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_exact_duplicate_post_authenticated() {
        let store = Arc::new(InMemoryIdentityStore::new());
        enroll_client(&store);
        let comms = communicator_with_store(store);

        let envelope = client_envelope(1_700_000_000_000_000);
        for _ in 0..2 {
            match comms.decrypt_envelope(&envelope).unwrap() {
                DecryptOutcome::Known { messages, .. } => assert!(messages
                    .iter()
                    .all(|m| m.auth_state == AuthState::Authenticated)),
                DecryptOutcome::UnknownClient { .. } => panic!("client should be known"),
            }
        }
    }

    #[test]
    fn test_response_roundtrips_to_client() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let client_id = enroll_client(&store);
        let comms = communicator_with_store(store);

        let batch = MessageList::from(vec![Message::new(
            SessionId::new("flows/F:2"),
            "echo",
            vec![9],
        )]);
        let bytes = comms.encode_response(&batch, &client_id).unwrap();

        let opened = open_envelope(
            &bytes,
            client_identity(),
            |_| Some(server_identity().public_key()),
            &SealOptions::default(),
        )
        .unwrap();
        assert_eq!(opened.source, "server");
        assert_eq!(opened.messages.len(), 1);
    }

    #[test]
    fn test_response_to_unknown_client_fails() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let comms = communicator_with_store(store);
        let stranger = ClientId::new("C.ffffffffffffffff").unwrap();

        let result = comms.encode_response(&MessageList::new(), &stranger);
        assert!(matches!(result, Err(ServerError::UnknownClient { .. })));
    }

    #[test]
    fn test_invalidate_forces_store_reload() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let client_id = enroll_client(&store);
        let comms = communicator_with_store(Arc::clone(&store));

        // Warm the cache, then rotate: persist a certificate for a NEW key.
        comms.decrypt_envelope(&client_envelope(1_700_000_000_000_000)).unwrap();
        let rotated = IdentityKeyPair::generate().unwrap();
        let cert = Certificate::issue(
            client_id.as_str(),
            &rotated.public_key(),
            "ca",
            ca(),
            2,
            Duration::from_secs(3600),
        )
        .unwrap();
        store.persist_certificate(client_id.clone(), cert);
        comms.invalidate_identity(&client_id);

        // Envelopes signed with the OLD key are now rejected.
        let result = comms.decrypt_envelope(&client_envelope(1_700_000_000_001_000));
        assert!(result.is_err());
    }

    #[test]
    fn test_corrupt_store_entry_not_trusted() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let client_id = client_identity().client_id().unwrap();
        // Persist a certificate signed by the wrong authority.
        let rogue_ca = IdentityKeyPair::generate().unwrap();
        let cert = Certificate::issue(
            client_id.as_str(),
            &client_identity().public_key(),
            "ca",
            &rogue_ca,
            9,
            Duration::from_secs(3600),
        )
        .unwrap();
        store.persist_certificate(client_id, cert);

        let comms = communicator_with_store(store);
        let outcome = comms
            .decrypt_envelope(&client_envelope(1_700_000_000_000_000))
            .unwrap();
        assert!(matches!(outcome, DecryptOutcome::UnknownClient { .. }));
    }
}
