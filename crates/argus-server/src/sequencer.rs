// ============================================
// File: crates/argus-server/src/sequencer.rs
// ============================================
//! # Session Sequencer
//!
//! ## Creation Reason
//! Classifies every cryptographically verified envelope by comparing its
//! freshness nonce against the last accepted nonce for that client,
//! detecting replays and clock desynchronization across an unreliable
//! transport.
//!
//! ## Classification Rules
//! ```text
//! T = envelope nonce, L = last accepted nonce for the client
//!
//! T > L                     → AUTHENTICATED, L := T
//! T == L                    → AUTHENTICATED, L unchanged
//!                             (proxies may double-deliver one POST)
//! L - T <= tolerance        → AUTHENTICATED, L unchanged (clock jitter)
//! L - T >  tolerance        → DESYNCHRONIZED (stale replay / reset)
//! ```
//! Evaluated ONCE per envelope; the result is stamped onto every message
//! it contains. It refines, and never replaces, the signature and HMAC
//! checks: an envelope that failed those never reaches this code.
//!
//! ## Concurrency
//! The compare-and-update of L is atomic per client: two concurrently
//! processed envelopes from one client serialize on the owning cache
//! shard, so neither can observe a stale L.
//!
//! ## ⚠️ Important Note for Next Developer
//! - State is bounded (capacity + TTL); an aged-out client simply starts
//!   fresh, which is safe because the first envelope from an unknown L
//!   is always AUTHENTICATED
//! - The tolerance default (1 hour) is pinned by tests; treat it as
//!   security policy, not a tuning knob
//!
//! ## Last Modified
//! v0.1.0 - Initial sequencer implementation

use std::time::Duration;

use tracing::debug;

use argus_common::cache::BoundedCache;
use argus_common::time::Timestamp;
use argus_common::types::{AuthState, ClientId};

// ============================================
// CounterState
// ============================================

/// Per-client freshness bookkeeping.
#[derive(Debug, Clone, Copy)]
struct CounterState {
    /// Highest accepted nonce (epoch microseconds).
    last_nonce: i64,
}

// ============================================
// SessionSequencer
// ============================================

/// Per-client freshness classification with bounded state.
pub struct SessionSequencer {
    states: BoundedCache<ClientId, CounterState>,
    tolerance_micros: u64,
}

impl SessionSequencer {
    /// Creates a sequencer.
    ///
    /// # Arguments
    /// * `capacity` - bound on tracked clients (LRU beyond that)
    /// * `ttl` - entry lifetime; aged-out clients start fresh
    /// * `tolerance` - nonce regression accepted as clock jitter
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration, tolerance: Duration) -> Self {
        Self {
            states: BoundedCache::new(capacity, ttl),
            tolerance_micros: tolerance.as_micros() as u64,
        }
    }

    /// Classifies one verified envelope from `client_id` with nonce `nonce`.
    ///
    /// Atomically reads and updates the client's freshness state.
    #[must_use]
    pub fn classify(&self, client_id: &ClientId, nonce: Timestamp) -> AuthState {
        let tolerance = self.tolerance_micros;
        let incoming = nonce.as_micros();

        let state = self.states.update(client_id.clone(), |current| {
            let Some(state) = current else {
                // First contact (or aged out): accept and start tracking.
                return (CounterState { last_nonce: incoming }, AuthState::Authenticated);
            };
            let last = state.last_nonce;
            if incoming > last {
                (CounterState { last_nonce: incoming }, AuthState::Authenticated)
            } else if incoming == last {
                // Exact replay of the last envelope: double-delivery.
                (*state, AuthState::Authenticated)
            } else if last.abs_diff(incoming) <= tolerance {
                (*state, AuthState::Authenticated)
            } else {
                (*state, AuthState::Desynchronized)
            }
        });

        if state == AuthState::Desynchronized {
            debug!(client = %client_id, nonce = incoming, "stale nonce, desynchronized");
        }
        state
    }

    /// Returns the number of tracked clients.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.states.len()
    }
}

impl std::fmt::Debug for SessionSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSequencer")
            .field("tracked", &self.states.len())
            .field("tolerance_micros", &self.tolerance_micros)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
