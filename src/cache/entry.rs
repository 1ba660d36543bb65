//! Cache Entry Module
//!
//! A computed value together with the instant it was stored.

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// Represents a single memoized result.
///
/// Entries are never mutated in place; a recomputation replaces the whole entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// The computed value
    pub value: V,
    /// When the computation that produced `value` was started
    pub stored_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    pub fn new(value: V, stored_at: DateTime<Utc>) -> Self {
        Self { value, stored_at }
    }
}
