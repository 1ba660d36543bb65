//! TTL Store Module
//!
//! Fingerprint-to-entry map with lazy, call-triggered eviction.
//!
//! Entries are additionally indexed by `(stored_at, key)` so a sweep only walks
//! the expired prefix of the index instead of every entry.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::CacheEntry;
use crate::key::CacheKey;
use crate::policy::elapsed;

// == TTL Store ==
#[derive(Debug)]
pub struct TtlStore<V> {
    /// Fingerprint to entry storage
    entries: HashMap<CacheKey, CacheEntry<V>>,
    /// Expiry order, oldest first; mirrors `entries` exactly
    by_age: BTreeSet<(DateTime<Utc>, CacheKey)>,
}

impl<V> Default for TtlStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlStore<V> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_age: BTreeSet::new(),
        }
    }

    // == Sweep ==
    /// Removes every entry older than `ttl` at `now`.
    ///
    /// Only the base TTL rule applies here; a value from "yesterday" that is still
    /// inside its TTL stays until it lapses. Returns the number of entries removed.
    pub fn sweep(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut removed = 0;
        while let Some((stored_at, _)) = self.by_age.first() {
            if elapsed(*stored_at, now) <= ttl {
                break;
            }
            if let Some((_, key)) = self.by_age.pop_first() {
                self.entries.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    // == Get ==
    /// Plain lookup; expiry is the caller's concern.
    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    // == Put ==
    /// Inserts or replaces the entry for `key`.
    pub fn put(&mut self, key: CacheKey, value: V, now: DateTime<Utc>) {
        let entry = CacheEntry::new(value, now);
        if let Some(old) = self.entries.insert(key.clone(), entry) {
            self.by_age.remove(&(old.stored_at, key.clone()));
        }
        self.by_age.insert((now, key));
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over stored entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&CacheKey, &CacheEntry<V>)> {
        self.entries.iter()
    }
}
