// ============================================
// File: crates/argus-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Provides time-related utilities: the microsecond-resolution `Timestamp`
//! used as the envelope freshness nonce, and an atomic instant for
//! lock-free last-activity tracking.
//!
//! ## Main Functionality
//! - `Timestamp`: Unix timestamp in microseconds with validation
//! - `AtomicInstant`: Thread-safe wrapper around `Instant`
//!
//! ## Main Logical Flow
//! 1. The sender stamps `Timestamp::now()` into every sealed envelope
//! 2. The receiver compares it against the last accepted value per client
//! 3. Background bookkeeping reads `AtomicInstant` without locks
//!
//! ## ⚠️ Important Note for Next Developer
//! - Timestamps are MICROSECONDS since the Unix epoch, not seconds
//! - `AtomicInstant` uses `AtomicU64` internally (nanoseconds since start)
//! - Timestamps should be validated against reasonable bounds
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// Constants
// ============================================

/// Microseconds per second.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Minimum valid timestamp (year 2020, in microseconds).
pub const MIN_VALID_TIMESTAMP: i64 = 1_577_836_800 * MICROS_PER_SEC;

/// Maximum valid timestamp (year 2100, in microseconds).
pub const MAX_VALID_TIMESTAMP: i64 = 4_102_444_800 * MICROS_PER_SEC;

// ============================================
// Timestamp
// ============================================

/// Unix timestamp in microseconds.
///
/// # Purpose
/// Used as the per-envelope freshness nonce for replay and
/// desynchronization detection, and for general wall-clock bookkeeping.
///
/// # Example
/// ```
/// use argus_common::time::Timestamp;
///
/// let now = Timestamp::now();
/// assert!(now.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a new timestamp from Unix microseconds.
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Creates a new timestamp from Unix seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * MICROS_PER_SEC)
    }

    /// Creates a timestamp for the current time.
    #[must_use]
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System time before Unix epoch")
            .as_micros() as i64;
        Self(micros)
    }

    /// Returns the Unix timestamp in microseconds.
    #[must_use]
    pub const fn as_micros(&self) -> i64 {
        self.0
    }

    /// Returns the timestamp as little-endian bytes.
    #[must_use]
    pub const fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Creates a timestamp from little-endian bytes.
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self(i64::from_le_bytes(bytes))
    }

    /// Checks if the timestamp is within valid bounds (2020-2100).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 >= MIN_VALID_TIMESTAMP && self.0 <= MAX_VALID_TIMESTAMP
    }

    /// Returns the absolute difference to another timestamp in microseconds.
    #[must_use]
    pub const fn abs_diff(&self, other: Self) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Returns a timestamp advanced by the given number of microseconds.
    #[must_use]
    pub const fn saturating_add_micros(&self, micros: i64) -> Self {
        Self(self.0.saturating_add(micros))
    }
}

impl From<i64> for Timestamp {
    fn from(micros: i64) -> Self {
        Self(micros)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================
// AtomicInstant
// ============================================

/// Thread-safe wrapper around [`Instant`] for concurrent access.
///
/// # Implementation
/// Stores nanoseconds elapsed since a reference instant (program start).
/// Uses `AtomicU64` with relaxed ordering for performance.
#[derive(Debug)]
pub struct AtomicInstant {
    /// Nanoseconds since the reference instant
    nanos: AtomicU64,
}

impl AtomicInstant {
    /// Reference instant (lazily initialized at program start).
    fn reference() -> Instant {
        use std::sync::OnceLock;
        static REFERENCE: OnceLock<Instant> = OnceLock::new();
        *REFERENCE.get_or_init(Instant::now)
    }

    /// Creates a new `AtomicInstant` set to the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Creates a new `AtomicInstant` from an `Instant`.
    #[must_use]
    pub fn from_instant(instant: Instant) -> Self {
        let reference = Self::reference();
        let nanos = instant
            .checked_duration_since(reference)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self {
            nanos: AtomicU64::new(nanos),
        }
    }

    /// Loads the stored instant.
    #[must_use]
    pub fn load(&self) -> Instant {
        let nanos = self.nanos.load(Ordering::Relaxed);
        Self::reference() + Duration::from_nanos(nanos)
    }

    /// Stores a new instant.
    pub fn store(&self, instant: Instant) {
        let reference = Self::reference();
        let nanos = instant
            .checked_duration_since(reference)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        self.nanos.store(nanos, Ordering::Relaxed);
    }

    /// Updates to the current time.
    pub fn touch(&self) {
        self.store(Instant::now());
    }

    /// Returns the elapsed time since the stored instant.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.load().elapsed()
    }

    /// Checks if more than `duration` has elapsed since the stored instant.
    #[must_use]
    pub fn has_elapsed(&self, duration: Duration) -> bool {
        self.elapsed() > duration
    }
}

impl Default for AtomicInstant {
    fn default() -> Self {
        Self::now()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timestamp_now_is_valid() {
        let ts = Timestamp::now();
        assert!(ts.is_valid());
    }

    #[test]
    fn test_timestamp_bytes_roundtrip() {
        let original = Timestamp::now();
        let bytes = original.to_le_bytes();
        let restored = Timestamp::from_le_bytes(bytes);
        assert_eq!(original, restored);
    }

    #[test]
    fn test_timestamp_ordering() {
        let earlier = Timestamp::from_micros(1_600_000_000_000_000);
        let later = earlier.saturating_add_micros(MICROS_PER_SEC);
        assert!(later > earlier);
        assert_eq!(later.abs_diff(earlier), MICROS_PER_SEC as u64);
    }

    #[test]
    fn test_timestamp_bounds() {
        assert!(!Timestamp::from_micros(0).is_valid());
        assert!(!Timestamp::from_secs(5_000_000_000).is_valid());
    }

    #[test]
    fn test_atomic_instant_store() {
        let atomic = AtomicInstant::now();
        thread::sleep(Duration::from_millis(5));

        let before = atomic.load();
        atomic.touch();
        let after = atomic.load();

        assert!(after > before);
    }

    #[test]
    fn test_atomic_instant_elapsed() {
        let atomic = AtomicInstant::now();
        thread::sleep(Duration::from_millis(10));

        assert!(atomic.elapsed() >= Duration::from_millis(10));
        assert!(atomic.has_elapsed(Duration::from_millis(5)));
    }
}
