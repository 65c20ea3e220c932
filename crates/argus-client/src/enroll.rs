// ============================================
// File: crates/argus-client/src/enroll.rs
// ============================================
//! # Agent Enrollment
//!
//! ## Creation Reason
//! Implements the agent side of the enrollment bootstrap: building the
//! self-signed signing request sent on the well-known control session,
//! and handling the certificate the server issues in response.
//!
//! ## Enrollment Flow
//! ```text
//! UNENROLLED ──(server answers 406)──► send signing request
//!     │                                      │
//!     │                                WAITING
//!     │                                      │
//!     └◄──(certificate received, stored)── ENROLLED
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The signing request travels UNAUTHENTICATED by design: the payload
//!   itself (a self-signed key) is what establishes trust going forward
//! - An issued certificate is only accepted if its subject matches the
//!   agent's own key-derived name
//!
//! ## Last Modified
//! v0.1.0 - Initial enrollment implementation

use tracing::info;

use argus_common::types::{Priority, SessionId};
use argus_core::crypto::{Certificate, IdentityKeyPair, SigningRequest};
use argus_core::error::CoreError;
use argus_core::protocol::Message;

use crate::error::Result;

// Re-exported so agent code has one import path for enrollment names.
pub use argus_common::types::{ENROLL_CERTIFICATE_ACTION, ENROLL_REQUEST_ACTION};

// ============================================
// EnrollmentPhase
// ============================================

/// Where the agent stands in the enrollment bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollmentPhase {
    /// No certificate issued yet; the server does not know this agent.
    Unenrolled,
    /// A signing request has been sent; awaiting the certificate.
    Waiting,
    /// The server has issued and this agent has stored a certificate.
    Enrolled,
}

// ============================================
// Request / Response Handling
// ============================================

/// Builds the enrollment control message for `identity`.
///
/// The message is addressed to the well-known enrollment session with
/// high priority, so the next cycle polls fast for the answer.
///
/// # Errors
/// Returns core errors if the signing request cannot be built.
pub fn build_enrollment_message(identity: &IdentityKeyPair) -> Result<Message> {
    let request = SigningRequest::new(identity)?;
    info!(subject = %request.subject, "built enrollment signing request");
    Ok(
        Message::new(SessionId::enrollment(), ENROLL_REQUEST_ACTION, request.to_bytes())
            .with_priority(Priority::High),
    )
}

/// Extracts and validates an issued certificate from an enrollment
/// response message.
///
/// # Errors
/// - `CertificateInvalid`: payload unparsable, or the certificate's
///   subject does not match this agent's key-derived name
pub fn accept_issued_certificate(
    message: &Message,
    identity: &IdentityKeyPair,
) -> Result<Certificate> {
    let certificate = Certificate::from_bytes(&message.payload)?;
    let own_id = identity.client_id()?;
    if certificate.subject != own_id.as_str() {
        return Err(CoreError::certificate_invalid(format!(
            "issued certificate names '{}', this agent is '{own_id}'",
            certificate.subject
        ))
        .into());
    }
    info!(serial = certificate.serial, "accepted issued certificate");
    Ok(certificate)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::time::Duration;

    fn agent_identity() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    fn ca() -> &'static IdentityKeyPair {
        static KP: OnceLock<IdentityKeyPair> = OnceLock::new();
        KP.get_or_init(|| IdentityKeyPair::generate().unwrap())
    }

    #[test]
    fn test_enrollment_message_shape() {
        let message = build_enrollment_message(agent_identity()).unwrap();
        assert!(message.session_id.is_enrollment());
        assert_eq!(message.action, ENROLL_REQUEST_ACTION);
        assert_eq!(message.priority, Priority::High);

        // The payload is a valid, self-consistent signing request.
        let request = SigningRequest::from_bytes(&message.payload).unwrap();
        assert_eq!(
            request.verify().unwrap(),
            agent_identity().client_id().unwrap()
        );
    }

    #[test]
    fn test_accept_issued_certificate() {
        let subject = agent_identity().client_id().unwrap();
        let certificate = Certificate::issue(
            subject.as_str(),
            &agent_identity().public_key(),
            "ca",
            ca(),
            3,
            Duration::from_secs(3600),
        )
        .unwrap();

        let message = Message::new(
            SessionId::enrollment(),
            ENROLL_CERTIFICATE_ACTION,
            certificate.to_bytes(),
        );
        let accepted = accept_issued_certificate(&message, agent_identity()).unwrap();
        assert_eq!(accepted, certificate);
    }

    #[test]
    fn test_reject_certificate_for_other_subject() {
        let certificate = Certificate::issue(
            "C.ffffffffffffffff",
            &agent_identity().public_key(),
            "ca",
            ca(),
            4,
            Duration::from_secs(3600),
        )
        .unwrap();

        let message = Message::new(
            SessionId::enrollment(),
            ENROLL_CERTIFICATE_ACTION,
            certificate.to_bytes(),
        );
        let result = accept_issued_certificate(&message, agent_identity());
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_garbage_payload() {
        let message = Message::new(
            SessionId::enrollment(),
            ENROLL_CERTIFICATE_ACTION,
            vec![0xDE, 0xAD],
        );
        assert!(accept_issued_certificate(&message, agent_identity()).is_err());
    }
}
