// ============================================
// File: crates/argus-client/src/comms.rs
// ============================================
//! # Agent Communicator
//!
//! ## Creation Reason
//! Owns the agent's identity material and the server's certificate, and
//! drives envelope sealing/opening for the transport loop.
//!
//! ## Main Functionality
//! - `ClientCommunicator`: encode outbound batches, decode responses
//! - Strictly monotonic freshness nonce generation
//!
//! ## Main Logical Flow
//! 1. The loop drains a batch and calls [`encode_messages`]
//! 2. The sealed bytes are POSTed; the response body comes back here
//! 3. [`decode_response`] verifies the server identity and returns the
//!    inbound batch, stamped AUTHENTICATED
//!
//! [`encode_messages`]: ClientCommunicator::encode_messages
//! [`decode_response`]: ClientCommunicator::decode_response
//!
//! ## ⚠️ Important Note for Next Developer
//! - Nonces must never repeat across envelopes from one identity: the
//!   generator takes max(now, last + 1) so a stalled clock still yields
//!   strictly increasing values
//!
//! ## Last Modified
//! v0.1.0 - Initial communicator implementation

use tracing::debug;

use argus_common::time::Timestamp;
use argus_common::types::{AuthState, ClientId};
use argus_core::crypto::{Certificate, IdentityKeyPair, IdentityPublicKey};
use argus_core::error::CoreError;
use argus_core::protocol::MessageList;
use argus_core::{open_envelope, seal_envelope, SealOptions, SourceVerification};

use crate::error::{ClientError, Result};

// ============================================
// ClientCommunicator
// ============================================

/// Seals outbound batches and opens server responses.
pub struct ClientCommunicator {
    /// The agent's long-term identity.
    identity: IdentityKeyPair,
    /// Name derived from the identity key.
    client_id: ClientId,
    /// The server's certificate, if loaded.
    server_certificate: Option<Certificate>,
    /// Public key extracted from the server certificate.
    server_key: Option<IdentityPublicKey>,
    /// Last freshness nonce handed out.
    last_nonce: i64,
    /// Sealing parameters from configuration.
    options: SealOptions,
}

impl ClientCommunicator {
    /// Creates a communicator around the agent's identity.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if the client name cannot be derived.
    pub fn new(identity: IdentityKeyPair, options: SealOptions) -> Result<Self> {
        let client_id = identity.client_id()?;
        Ok(Self {
            identity,
            client_id,
            server_certificate: None,
            server_key: None,
            last_nonce: 0,
            options,
        })
    }

    /// Returns the agent's identity name.
    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Returns the agent's identity key pair.
    #[must_use]
    pub fn identity(&self) -> &IdentityKeyPair {
        &self.identity
    }

    /// Loads the server certificate the agent was shipped with.
    ///
    /// # Errors
    /// Returns `CertificateInvalid` if the embedded key is unparsable.
    pub fn load_server_certificate(&mut self, certificate: Certificate) -> Result<()> {
        let key = certificate.public_key()?;
        debug!(subject = %certificate.subject, "loaded server certificate");
        self.server_key = Some(key);
        self.server_certificate = Some(certificate);
        Ok(())
    }

    /// Checks whether a server certificate has been loaded.
    #[must_use]
    pub fn has_server_certificate(&self) -> bool {
        self.server_certificate.is_some()
    }

    /// Returns the next strictly monotonic freshness nonce.
    fn next_nonce(&mut self) -> Timestamp {
        let now = Timestamp::now().as_micros();
        let next = now.max(self.last_nonce + 1);
        self.last_nonce = next;
        Timestamp::from_micros(next)
    }

    /// Seals a batch for the server, ready for POST.
    ///
    /// # Errors
    /// - `NoServerCertificate`: no server certificate loaded yet
    /// - `PayloadTooLarge` and sealing errors from the core
    pub fn encode_messages(&mut self, messages: &MessageList) -> Result<Vec<u8>> {
        let (destination, server_key) = match (&self.server_certificate, &self.server_key) {
            (Some(certificate), Some(key)) => (certificate.subject.clone(), key.clone()),
            _ => return Err(CoreError::NoServerCertificate.into()),
        };
        let nonce = self.next_nonce();

        let bytes = seal_envelope(
            messages,
            self.client_id.as_str(),
            &destination,
            nonce,
            &self.identity,
            &server_key,
            &self.options,
        )?;
        Ok(bytes)
    }

    /// Opens a response envelope from the server.
    ///
    /// The response must prove the server identity the agent was shipped;
    /// any other claimed source is rejected. Verified messages are
    /// stamped AUTHENTICATED.
    ///
    /// # Errors
    /// - structural/cryptographic errors from the core
    /// - `ServerIdentity`: the response claimed an unexpected source
    pub fn decode_response(&self, bytes: &[u8]) -> Result<MessageList> {
        let Some(server_certificate) = &self.server_certificate else {
            return Err(CoreError::NoServerCertificate.into());
        };
        let server_key = self
            .server_key
            .as_ref()
            .expect("server key set alongside certificate");

        let expected_source = server_certificate.subject.clone();
        let opened = open_envelope(
            bytes,
            &self.identity,
            |source| {
                if source == expected_source {
                    Some(server_key.clone())
                } else {
                    None
                }
            },
            &self.options,
        )?;

        if opened.verification != SourceVerification::Verified {
            return Err(ClientError::ServerIdentity {
                claimed: opened.source,
            });
        }

        let mut messages = opened.messages;
        messages.stamp_auth_state(AuthState::Authenticated);
        Ok(messages)
    }
}

impl std::fmt::Debug for ClientCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCommunicator")
            .field("client_id", &self.client_id)
            .field("server_certificate_loaded", &self.server_certificate.is_some())
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

    fn server_identity() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn ca_identity() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn server_certificate() -> Certificate {
        Certificate::issue(
            "server",
            &server_identity().public_key(),
            "ca",
            ca_identity(),
            1,
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    fn communicator() -> ClientCommunicator {
        let identity = IdentityKeyPair::generate().unwrap();
        let mut comms = ClientCommunicator::new(identity, SealOptions::default()).unwrap();
        comms.load_server_certificate(server_certificate()).unwrap();
        comms
    }

    fn batch() -> MessageList {
        MessageList::from(vec![Message::new(
            SessionId::new("flows/F:1"),
            "collect_logs",
            vec![1, 2, 3],
        )])
    }

    #[test]
    fn test_encode_without_certificate_fails() {
        let identity = IdentityKeyPair::generate().unwrap();
        let mut comms = ClientCommunicator::new(identity, SealOptions::default()).unwrap();
        let result = comms.encode_messages(&batch());
        assert!(matches!(
            result,
            Err(ClientError::Core(CoreError::NoServerCertificate))
        ));
    }

    #[test]
    fn test_encode_decode_with_server() {
        let mut comms = communicator();
        let bytes = comms.encode_messages(&batch()).unwrap();

        // The server opens it with its own private key.
        let client_key = comms.identity().public_key();
        let opened = open_envelope(
            &bytes,
            server_identity(),
            |_| Some(client_key.clone()),
            &SealOptions::default(),
        )
        .unwrap();
        assert_eq!(opened.source, comms.client_id().as_str());
        assert_eq!(opened.messages.len(), 1);
    }

    #[test]
    fn test_nonces_strictly_increase() {
        let mut comms = communicator();
        let mut last = 0i64;
        for _ in 0..50 {
            let bytes = comms.encode_messages(&batch()).unwrap();
            let envelope = argus_core::protocol::Envelope::decode(&bytes).unwrap();
            assert!(envelope.nonce.as_micros() > last);
            last = envelope.nonce.as_micros();
        }
    }

    #[test]
    fn test_decode_response_verifies_server() {
        let comms = communicator();
        let response = seal_envelope(
            &batch(),
            "server",
            comms.client_id().as_str(),
            Timestamp::now(),
            server_identity(),
            &comms.identity().public_key(),
            &SealOptions::default(),
        )
        .unwrap();

        let messages = comms.decode_response(&response).unwrap();
        assert!(messages
            .iter()
            .all(|m| m.auth_state == AuthState::Authenticated));
    }

    #[test]
    fn test_decode_response_rejects_imposter() {
        let comms = communicator();
        let imposter = IdentityKeyPair::generate().unwrap();
        let response = seal_envelope(
            &batch(),
            "server",
            comms.client_id().as_str(),
            Timestamp::now(),
            &imposter,
            &comms.identity().public_key(),
            &SealOptions::default(),
        )
        .unwrap();

        // Claimed source is known, but the signature is not the server's.
        let result = comms.decode_response(&response);
        assert!(matches!(
            result,
            Err(ClientError::Core(CoreError::SignatureVerification))
        ));
    }

    #[test]
    fn test_decode_response_rejects_unknown_source_name() {
        let comms = communicator();
        let imposter = IdentityKeyPair::generate().unwrap();
        let response = seal_envelope(
            &batch(),
            "not-the-server",
            comms.client_id().as_str(),
            Timestamp::now(),
            &imposter,
            &comms.identity().public_key(),
            &SealOptions::default(),
        )
        .unwrap();

        let result = comms.decode_response(&response);
        assert!(matches!(result, Err(ClientError::ServerIdentity { .. })));
    }
}
