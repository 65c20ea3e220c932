// ============================================
// File: crates/argus-client/src/http.rs
// ============================================
//! # HTTP Channel
//!
//! ## Creation Reason
//! Abstracts the HTTP POST of sealed envelope bytes behind a trait so the
//! polling loop can be driven end-to-end in tests without a network, and
//! implements the production channel on `reqwest`.
//!
//! ## Main Functionality
//! - `HttpChannel`: the transport seam (one POST per call)
//! - `ReqwestChannel`: production implementation
//! - `post_any`: proxy-list fallback, first reachable URL wins
//!
//! ## Status Mapping
//! | Status | Outcome |
//! |--------|---------|
//! | 200    | `Accepted(body)` - body is a response envelope |
//! | 406    | `EnrollmentRequired` - server does not know this agent |
//! | other  | `Rejected { status }` - transient, retried with backoff |
//! | (none) | `Err(Connection)` - try the next URL, then count the error |
//!
//! ## ⚠️ Important Note for Next Developer
//! - A reachable server that answers with ANY status stops the URL
//!   fallback; only connection-level failures move to the next URL
//!
//! ## Last Modified
//! v0.1.0 - Initial HTTP channel implementation

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

// ============================================
// PostOutcome
// ============================================

/// Result of one envelope POST that reached a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// 200: the body is the server's response envelope.
    Accepted(Vec<u8>),
    /// 406: the server does not recognize this agent's certificate.
    EnrollmentRequired,
    /// Any other status: transient failure, retried with backoff.
    Rejected {
        /// HTTP status code received
        status: u16,
    },
}

// ============================================
// HttpChannel Trait
// ============================================

/// Abstract interface for POSTing sealed envelopes.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the loop itself stays strictly
/// sequential and never issues overlapping calls.
#[async_trait]
pub trait HttpChannel: Send + Sync {
    /// POSTs envelope bytes to one URL.
    ///
    /// # Errors
    /// Returns `Connection` when no HTTP response was obtained at all
    /// (refused, timeout, DNS failure).
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<PostOutcome>;
}

// ============================================
// ReqwestChannel
// ============================================

/// Production HTTP channel.
#[derive(Debug, Clone)]
pub struct ReqwestChannel {
    client: reqwest::Client,
}

impl ReqwestChannel {
    /// Creates a channel with a per-request timeout.
    ///
    /// # Errors
    /// Returns `Connection` if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::connection(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpChannel for ReqwestChannel {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<PostOutcome> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| ClientError::connection(format!("POST {url}: {e}")))?;

        let status = response.status().as_u16();
        match status {
            200 => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ClientError::connection(format!("reading body: {e}")))?;
                Ok(PostOutcome::Accepted(bytes.to_vec()))
            }
            406 => Ok(PostOutcome::EnrollmentRequired),
            _ => Ok(PostOutcome::Rejected { status }),
        }
    }
}

// ============================================
// URL Fallback
// ============================================

/// POSTs to each configured URL in order; the first one that yields any
/// HTTP response wins.
///
/// # Errors
/// Returns the last `Connection` error once every URL has failed.
pub async fn post_any<C: HttpChannel + ?Sized>(
    channel: &C,
    urls: &[String],
    body: &[u8],
) -> Result<PostOutcome> {
    let mut last_error = ClientError::connection("no control URLs configured");
    for url in urls {
        match channel.post(url, body.to_vec()).await {
            Ok(outcome) => {
                debug!(url, "control URL reachable");
                return Ok(outcome);
            }
            Err(error) => {
                warn!(url, %error, "control URL unreachable, trying next");
                last_error = error;
            }
        }
    }
    Err(last_error)
}

// ============================================
// Tests
// ============================================
