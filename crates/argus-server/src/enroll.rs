// ============================================
// File: crates/argus-server/src/enroll.rs
// ============================================
//! # Enrollment Service
//!
//! ## Creation Reason
//! Implements the server side of the enrollment bootstrap: validate an
//! unauthenticated signing request, issue a CA-signed certificate, and
//! persist the new identity.
//!
//! ## Issuance Policy
//! ```text
//! signing request ──structural check──► self-signature check
//!     ──► subject must equal key-derived name
//!     ──► optional allowlist check
//!     ──► same key already enrolled? reuse valid certificate (idempotent)
//!     ──► otherwise issue, persist, invalidate identity cache
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Enrolling one public key twice must NEVER create two divergent
//!   identities; the name is key-derived, so the second enrollment
//!   either reuses the stored certificate or re-issues an equivalent one
//!
//! ## Last Modified
//! v0.1.0 - Initial enrollment service

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use argus_common::time::Timestamp;
use argus_common::types::{ClientId, SessionId, ENROLL_CERTIFICATE_ACTION};
use argus_core::crypto::{Certificate, IdentityKeyPair, IdentityPublicKey, SigningRequest};
use argus_core::error::CoreError;
use argus_core::protocol::Message;

use crate::error::Result;
use crate::store::IdentityStore;

// ============================================
// EnrollmentService
// ============================================

/// Validates signing requests and issues client certificates.
pub struct EnrollmentService {
    /// CA identity signing all client certificates.
    ca: IdentityKeyPair,
    /// CA common name recorded as certificate issuer.
    ca_name: String,
    /// Durable certificate store.
    store: Arc<dyn IdentityStore>,
    /// Validity of issued certificates.
    validity: Duration,
    /// Optional allowlist of client names permitted to enroll.
    allowlist: Option<HashSet<String>>,
    /// Serial counter for issued certificates.
    next_serial: AtomicU64,
}

impl EnrollmentService {
    /// Creates an enrollment service.
    #[must_use]
    pub fn new(
        ca: IdentityKeyPair,
        ca_name: impl Into<String>,
        store: Arc<dyn IdentityStore>,
        validity: Duration,
        allowlist: Option<Vec<String>>,
    ) -> Self {
        Self {
            ca,
            ca_name: ca_name.into(),
            store,
            validity,
            allowlist: allowlist.map(|names| names.into_iter().collect()),
            next_serial: AtomicU64::new(1),
        }
    }

    /// Processes one enrollment control message.
    ///
    /// # Errors
    /// - `CertificateInvalid`: malformed request, subject/key mismatch,
    ///   or a name outside the allowlist
    /// - `SignatureVerification`: the self-signature does not match
    pub fn process_request(&self, message: &Message) -> Result<(ClientId, Certificate)> {
        let request = SigningRequest::from_bytes(&message.payload)?;
        let client_id = request.verify()?;

        if let Some(allowlist) = &self.allowlist {
            if !allowlist.contains(client_id.as_str()) {
                warn!(client = %client_id, "enrollment refused: not allowlisted");
                return Err(CoreError::certificate_invalid(format!(
                    "'{client_id}' is not permitted to enroll"
                ))
                .into());
            }
        }

        // Idempotence: the same key re-enrolling gets its existing
        // certificate back as long as it is still valid.
        if let Some(existing) = self.store.lookup_certificate(&client_id) {
            let same_key = existing.public_key_der == request.public_key_der;
            let still_valid = existing
                .verify(&self.ca.public_key(), Timestamp::now())
                .is_ok();
            if same_key && still_valid {
                info!(client = %client_id, serial = existing.serial, "re-enrollment, reusing certificate");
                return Ok((client_id, existing));
            }
        }

        let subject_key = IdentityPublicKey::from_der(&request.public_key_der)?;
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let certificate = Certificate::issue(
            client_id.as_str(),
            &subject_key,
            &self.ca_name,
            &self.ca,
            serial,
            self.validity,
        )?;
        self.store
            .persist_certificate(client_id.clone(), certificate.clone());
        info!(client = %client_id, serial, "issued client certificate");
        Ok((client_id, certificate))
    }

    /// Builds the response message carrying an issued certificate.
    #[must_use]
    pub fn issued_certificate_message(certificate: &Certificate) -> Message {
        Message::new(
            SessionId::enrollment(),
            ENROLL_CERTIFICATE_ACTION,
            certificate.to_bytes(),
        )
    }
}

impl std::fmt::Debug for EnrollmentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentService")
            .field("ca_name", &self.ca_name)
            .field("allowlisted", &self.allowlist.as_ref().map(HashSet::len))
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

    use crate::store::InMemoryIdentityStore;

    fn ca() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn client() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn service(
        store: Arc<InMemoryIdentityStore>,
        allowlist: Option<Vec<String>>,
    ) -> EnrollmentService {
        let ca_key = IdentityKeyPair::from_pkcs8_pem(&ca().to_pkcs8_pem().unwrap()).unwrap();
        EnrollmentService::new(ca_key, "ca", store, Duration::from_secs(24 * 3600), allowlist)
    }

    fn request_message() -> Message {
        let request = SigningRequest::new(client()).unwrap();
        Message::new(SessionId::enrollment(), "enroll_request", request.to_bytes())
    }

    #[test]
    fn test_enrollment_issues_and_persists() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let service = service(Arc::clone(&store), None);

        let (client_id, certificate) = service.process_request(&request_message()).unwrap();
        assert_eq!(client_id, client().client_id().unwrap());
        assert_eq!(certificate.subject, client_id.as_str());
        assert_eq!(certificate.issuer, "ca");
        assert!(certificate
            .verify(&ca().public_key(), Timestamp::now())
            .is_ok());
        assert_eq!(store.lookup_certificate(&client_id), Some(certificate));
    }

    #[test]
    fn test_enrollment_is_idempotent() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let service = service(Arc::clone(&store), None);

        let (id_first, cert_first) = service.process_request(&request_message()).unwrap();
        let (id_second, cert_second) = service.process_request(&request_message()).unwrap();

        // Same key, same identity, same certificate: no divergence.
        assert_eq!(id_first, id_second);
        assert_eq!(cert_first, cert_second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_allowlist_enforced() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let service = service(store, Some(vec!["C.0000000000000000".to_string()]));

        let result = service.process_request(&request_message());
        assert!(result.is_err());
    }

    #[test]
    fn test_allowlisted_client_enrolls() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let own_name = client().client_id().unwrap().as_str().to_string();
        let service = service(store, Some(vec![own_name]));

        assert!(service.process_request(&request_message()).is_ok());
    }

    #[test]
    fn test_garbage_request_rejected() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let service = service(store, None);

        let message = Message::new(SessionId::enrollment(), "enroll_request", vec![0xFF; 10]);
        assert!(service.process_request(&message).is_err());
    }

    #[test]
    fn test_certificate_message_payload_parses() {
        let store = Arc::new(InMemoryIdentityStore::new());
        let service = service(store, None);

        let (_, certificate) = service.process_request(&request_message()).unwrap();
        let message = EnrollmentService::issued_certificate_message(&certificate);
        assert!(message.session_id.is_enrollment());
        assert_eq!(
            Certificate::from_bytes(&message.payload).unwrap(),
            certificate
        );
    }
}
