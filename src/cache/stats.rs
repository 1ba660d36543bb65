//! Cache Statistics Module
//!
//! Tracks hit/miss outcomes of a memoized callable.

use serde::Serialize;

// == Cache Stats ==
/// Per-wrapper counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from the cache
    pub hits: u64,
    /// Calls that ran the target (successfully or not)
    pub misses: u64,
    /// Misses whose computation failed and left nothing cached
    pub failures: u64,
    /// Entries removed by expiry sweeps
    pub swept: u64,
    /// Current number of entries held
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was called yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// A failure is also a miss.
    pub fn record_failure(&mut self) {
        self.misses += 1;
        self.failures += 1;
    }

    pub fn record_swept(&mut self, count: usize) {
        self.swept += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
