//! Timed Memo - time-bounded memoization
//!
//! Caches a callable's results per argument bundle for a configurable TTL, with an
//! optional "calendar day changed" invalidation rule and hit notifications.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod key;
pub mod memo;
pub mod notify;
pub mod policy;

pub use cache::{CacheEntry, CacheStats, TtlStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, CallError, Result};
pub use key::{CacheKey, KeyDeriver, Scope, Scoped};
pub use memo::{AsyncMemoized, Memoized, MemoizedMethod};
pub use notify::{HitNotifier, Template, TemplateNotifier};
pub use policy::{DayBoundary, ExpiryPolicy};
