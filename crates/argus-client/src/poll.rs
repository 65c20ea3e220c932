// ============================================
// File: crates/argus-client/src/poll.rs
// ============================================
//! # Polling State
//!
//! ## Creation Reason
//! Tracks the adaptive polling interval, consecutive-error count, and
//! fast-poll flag for the transport loop.
//!
//! ## Interval Behaviour
//! ```text
//! idle cycle      : interval ← min(interval × poll_slew, poll_max)
//! outbound traffic: interval ← poll_min          ("fast poll")
//! transient error : next sleep = error_poll_min  (fixed, no growth)
//! error limit hit : loop terminates (supervisor restarts the process)
//! ```
//! A uniform ±10% jitter is applied to every computed delay so a fleet
//! restarted at once does not synchronize its polling.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Error backoff is deliberately FIXED, not exponential; reconnection
//!   after an outage must stay snappy
//! - Only connection-level failures count toward the fatal limit;
//!   protocol failures get one error-paced retry without counting
//!
//! ## Last Modified
//! v0.1.0 - Initial polling state implementation

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::PollConfig;
use crate::error::{ClientError, Result};

// ============================================
// Constants
// ============================================

/// Jitter applied to every delay: uniform in [1 - JITTER, 1 + JITTER].
const JITTER_FRACTION: f64 = 0.1;

// ============================================
// PollState
// ============================================

/// Mutable polling state for the single-threaded transport loop.
#[derive(Debug)]
pub struct PollState {
    /// Current idle polling interval.
    interval: Duration,
    /// Consecutive connection failures.
    consecutive_errors: u32,
    /// Next cycle should poll at the minimum interval.
    fast_poll: bool,
    /// Next sleep should use the error interval (one-shot).
    error_delay_pending: bool,
    /// Configured bounds and factors.
    config: PollConfig,
}

impl PollState {
    /// Creates polling state starting at the minimum interval.
    #[must_use]
    pub fn new(config: PollConfig) -> Self {
        Self {
            interval: config.poll_min(),
            consecutive_errors: 0,
            fast_poll: false,
            error_delay_pending: false,
            config,
        }
    }

    /// Records a successful cycle.
    ///
    /// Resets the error counter. With outbound traffic (or a pending
    /// fast-poll request) the interval drops to the minimum; otherwise it
    /// decays upward by the slew factor, bounded by the maximum.
    pub fn on_success(&mut self, had_outbound: bool) {
        self.consecutive_errors = 0;
        self.error_delay_pending = false;
        if had_outbound || self.fast_poll {
            self.interval = self.config.poll_min();
            self.fast_poll = false;
        } else {
            let grown = self.interval.as_secs_f64() * self.config.poll_slew;
            self.interval = Duration::from_secs_f64(grown.min(self.config.poll_max_secs));
        }
        debug!(interval_secs = self.interval.as_secs_f64(), "poll interval updated");
    }

    /// Records a connection-level failure.
    ///
    /// # Errors
    /// Returns `TooManyFailures` once the configured limit is exceeded;
    /// the caller terminates the loop.
    pub fn on_connection_error(&mut self) -> Result<()> {
        self.consecutive_errors += 1;
        self.error_delay_pending = true;
        if self.consecutive_errors >= self.config.connection_error_limit {
            return Err(ClientError::TooManyFailures {
                count: self.consecutive_errors,
            });
        }
        warn!(
            consecutive = self.consecutive_errors,
            limit = self.config.connection_error_limit,
            "connection failure, will retry"
        );
        Ok(())
    }

    /// Records a protocol-level failure (bad response envelope).
    ///
    /// Paces the next cycle like an error but does not count toward the
    /// fatal connection limit; the next attempt re-seals from scratch.
    pub fn on_protocol_error(&mut self) {
        self.error_delay_pending = true;
    }

    /// Requests that the next cycle polls at the minimum interval.
    pub fn request_fast_poll(&mut self) {
        self.fast_poll = true;
    }

    /// Returns the delay to sleep before the next cycle, with jitter.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let base = if self.error_delay_pending {
            self.config.error_poll_min()
        } else if self.fast_poll {
            self.config.poll_min()
        } else {
            self.interval
        };
        apply_jitter(base)
    }

    /// Returns the current idle interval (without jitter).
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the consecutive connection failure count.
    #[must_use]
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Checks whether a fast poll is pending.
    #[must_use]
    pub fn fast_poll_pending(&self) -> bool {
        self.fast_poll
    }
}

/// Applies uniform multiplicative jitter to a delay.
fn apply_jitter(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(1.0 - JITTER_FRACTION..=1.0 + JITTER_FRACTION);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

// ============================================
// Tests
// ============================================
