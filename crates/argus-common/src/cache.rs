// ============================================
// File: crates/argus-common/src/cache.rs
// ============================================
//! # Bounded Concurrent Cache
//!
//! ## Creation Reason
//! Both mutable shared structures on the server (the identity→public-key
//! cache and the per-client freshness state) must be bounded in capacity
//! and age, and safe under concurrent access from many client requests
//! without serializing all of them behind one lock.
//!
//! ## Main Functionality
//! - `BoundedCache`: sharded LRU cache with capacity + TTL
//! - `get` / `put` / `invalidate`: the full public mutation surface
//! - `update`: atomic read-modify-write under the owning shard lock
//!
//! ## Sharding
//! ```text
//! key ──hash──► shard index ──► Mutex<LruCache<K, Entry<V>>>
//!
//! Two keys in different shards never contend; two requests for the
//! SAME key serialize on one shard lock, which is exactly the atomicity
//! the freshness bookkeeping requires.
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Expired entries are dropped lazily on access, not by a sweeper task
//! - `update` holds the shard lock across the closure; keep closures cheap
//!
//! ## Last Modified
//! v0.1.0 - Initial sharded cache implementation

use std::hash::{BuildHasher, Hash, RandomState};
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

// ============================================
// Constants
// ============================================

/// Number of independent shards.
const SHARD_COUNT: usize = 16;

// ============================================
// Entry
// ============================================

/// A cached value with its insertion time.
#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted: Instant,
}

// ============================================
// BoundedCache
// ============================================

/// Sharded LRU cache with a capacity bound and a time-to-live bound.
///
/// # Purpose
/// Prevents unbounded memory growth from churn of short-lived or
/// malicious identities while keeping hot entries cheap to reach.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use argus_common::cache::BoundedCache;
///
/// let cache: BoundedCache<String, u64> =
///     BoundedCache::new(128, Duration::from_secs(3600));
/// cache.put("alpha".to_string(), 7);
/// assert_eq!(cache.get(&"alpha".to_string()), Some(7));
/// cache.invalidate(&"alpha".to_string());
/// assert_eq!(cache.get(&"alpha".to_string()), None);
/// ```
pub struct BoundedCache<K, V> {
    shards: Vec<Mutex<LruCache<K, Entry<V>>>>,
    hasher: RandomState,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    /// Creates a cache with the given total capacity and entry TTL.
    ///
    /// Capacity is split evenly across shards; each shard holds at least
    /// one entry, so the effective capacity is at least `SHARD_COUNT`.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let per_shard = NonZeroUsize::new((capacity / SHARD_COUNT).max(1))
            .expect("per-shard capacity is at least 1");
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(LruCache::new(per_shard)))
            .collect();
        Self {
            shards,
            hasher: RandomState::new(),
            ttl,
        }
    }

    /// Returns the shard owning `key`.
    fn shard(&self, key: &K) -> &Mutex<LruCache<K, Entry<V>>> {
        let index = (self.hasher.hash_one(key) as usize) % SHARD_COUNT;
        &self.shards[index]
    }

    /// Looks up a value, refreshing its LRU position.
    ///
    /// Expired entries are removed and reported as absent.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let mut shard = self.shard(key).lock();
        let expired = match shard.get(key) {
            Some(entry) if entry.inserted.elapsed() <= self.ttl => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            shard.pop(key);
        }
        None
    }

    /// Inserts or replaces a value, resetting its age.
    pub fn put(&self, key: K, value: V) {
        let mut shard = self.shard(&key).lock();
        shard.put(
            key,
            Entry {
                value,
                inserted: Instant::now(),
            },
        );
    }

    /// Removes a value, if present.
    pub fn invalidate(&self, key: &K) {
        let mut shard = self.shard(key).lock();
        shard.pop(key);
    }

    /// Atomically reads, transforms, and writes back the entry for `key`.
    ///
    /// The closure receives the current value (`None` if absent or
    /// expired) and returns the new value to store plus a result passed
    /// through to the caller. The whole operation holds the shard lock,
    /// so two concurrent `update`s for the same key never interleave.
    pub fn update<R>(&self, key: K, f: impl FnOnce(Option<&V>) -> (V, R)) -> R {
        let mut shard = self.shard(&key).lock();
        let current = shard
            .get(&key)
            .filter(|entry| entry.inserted.elapsed() <= self.ttl)
            .map(|entry| entry.value.clone());
        let (next, result) = f(current.as_ref());
        shard.put(
            key,
            Entry {
                value: next,
                inserted: Instant::now(),
            },
        );
        result
    }

    /// Returns the number of live entries across all shards.
    ///
    /// Counts expired-but-not-yet-evicted entries; intended for
    /// diagnostics, not correctness decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    /// Checks whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("shards", &self.shards.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
