// ============================================
// File: crates/argus-server/src/store.rs
// ============================================
//! # Identity Store Interface
//!
//! ## Creation Reason
//! The durable datastore behind the fleet server is an external
//! collaborator; the protocol core only needs to look up and persist
//! client certificates. This module defines that seam and an in-memory
//! implementation backing tests and single-node deployments.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be safe under concurrent access from many
//!   client requests; `InMemoryIdentityStore` relies on `DashMap` for
//!   per-key locking
//!
//! ## Last Modified
//! v0.1.0 - Initial store interface

use dashmap::DashMap;

use argus_common::types::ClientId;
use argus_core::crypto::Certificate;

// ============================================
// IdentityStore Trait
// ============================================

/// Lookup and persistence of client certificates.
///
/// Consumed by enrollment (persist) and by the server communicator's
/// identity cache on a miss (lookup).
pub trait IdentityStore: Send + Sync {
    /// Returns the stored certificate for `client_id`, if any.
    fn lookup_certificate(&self, client_id: &ClientId) -> Option<Certificate>;

    /// Stores (or replaces) the certificate for `client_id`.
    fn persist_certificate(&self, client_id: ClientId, certificate: Certificate);
}

// ============================================
// InMemoryIdentityStore
// ============================================

/// DashMap-backed store for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    entries: DashMap<ClientId, Certificate>,
}

impl InMemoryIdentityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the number of stored identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn lookup_certificate(&self, client_id: &ClientId) -> Option<Certificate> {
        self.entries.get(client_id).map(|entry| entry.value().clone())
    }

    fn persist_certificate(&self, client_id: ClientId, certificate: Certificate) {
        self.entries.insert(client_id, certificate);
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use argus_core::crypto::IdentityKeyPair;

    #[test]
    fn test_lookup_persist_roundtrip() {
        let store = InMemoryIdentityStore::new();
        let ca = IdentityKeyPair::generate().unwrap();
        let client = IdentityKeyPair::generate().unwrap();
        let client_id = client.client_id().unwrap();

        assert!(store.lookup_certificate(&client_id).is_none());

        let cert = Certificate::issue(
            client_id.as_str(),
            &client.public_key(),
            "ca",
            &ca,
            1,
            Duration::from_secs(3600),
        )
        .unwrap();
        store.persist_certificate(client_id.clone(), cert.clone());

        assert_eq!(store.lookup_certificate(&client_id), Some(cert));
        assert_eq!(store.len(), 1);
    }
}
