//! Cache Module
//!
//! In-memory entry storage with lazy TTL sweeping and hit/miss statistics.

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::TtlStore;
