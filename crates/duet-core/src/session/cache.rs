//! In-process session cache.
//!
//! A bidirectional user -> partner map giving the relay path a zero-latency
//! lookup without a store round trip. Purely an optimization: the profile
//! store stays the source of truth, and the cache is rebuilt lazily from it
//! after a process restart (see `SessionCoordinator::resolve_partner`).

use crate::profile::UserId;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Bidirectional map of active pairings.
///
/// While a chat is active, `{A -> B}` and `{B -> A}` are both present.
/// All operations are O(1) expected time. Entries are volatile; they vanish
/// on process restart and are repopulated from the store on first lookup
/// miss. Redundant rebinds are idempotent, so racing repopulations are safe.
#[derive(Default)]
pub struct SessionCache {
    entries: RwLock<HashMap<UserId, UserId>>,
}

impl SessionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts both directions of a pairing.
    pub async fn bind(&self, a: UserId, b: UserId) {
        let mut entries = self.entries.write().await;
        entries.insert(a, b);
        entries.insert(b, a);
    }

    /// Returns the cached partner of `user`, if any.
    pub async fn lookup(&self, user: UserId) -> Option<UserId> {
        self.entries.read().await.get(&user).copied()
    }

    /// Removes both directions of the pairing `user` belongs to, regardless
    /// of which side calls. Returns the partner that was bound.
    pub async fn unbind(&self, user: UserId) -> Option<UserId> {
        let mut entries = self.entries.write().await;
        let partner = entries.remove(&user)?;
        // Only drop the reverse edge if it still points back at us.
        if entries.get(&partner) == Some(&user) {
            entries.remove(&partner);
        }
        Some(partner)
    }

    /// Whether `user` has a cached pairing.
    pub async fn contains(&self, user: UserId) -> bool {
        self.entries.read().await.contains_key(&user)
    }

    /// Number of directed entries (two per active pairing).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every entry (used by tests and full resets).
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
