//! Memoized async callables.
//!
//! Same semantics as [`Memoized`](crate::Memoized), but concurrent misses wait on
//! a tokio mutex instead of blocking the worker thread.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::CacheStats;
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::{CallError, Result};
use crate::key::{KeyDeriver, Scope};
use crate::memo::engine::{Engine, InFlight, Lookup};
use crate::memo::function::cache_error;
use crate::notify::HitNotifier;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type AsyncTarget<A, V, E> = Box<dyn Fn(A) -> BoxFuture<std::result::Result<V, E>> + Send + Sync>;

/// An async callable whose results are reused for `ttl` per argument bundle.
///
/// The target takes its argument bundle by value and returns a `Send` future.
/// Each `AsyncMemoized` owns its own cache; share it behind an `Arc` to serve
/// several tasks.
pub struct AsyncMemoized<A, V, E = Infallible> {
    engine: Engine<V>,
    in_flight: InFlight<Mutex<()>>,
    target: AsyncTarget<A, V, E>,
}

impl<A, V, E> AsyncMemoized<A, V, E>
where
    A: Serialize,
    V: Clone,
{
    // == Constructors ==
    /// Wraps an async target that may fail. Failures are returned and never cached.
    pub fn fallible<F, Fut>(identity: impl Into<String>, config: CacheConfig, target: F) -> Result<Self>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        Ok(Self {
            engine: Engine::new(identity, config)?,
            in_flight: InFlight::new(),
            target: Box::new(move |args: A| -> BoxFuture<std::result::Result<V, E>> {
                Box::pin(target(args))
            }),
        })
    }

    /// Replaces the system clock.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine: self.engine.with_clock(clock),
            ..self
        }
    }

    /// Replaces the template notifier, if any, with `notifier`.
    pub fn with_notifier(self, notifier: Arc<dyn HitNotifier>) -> Self {
        Self {
            engine: self.engine.with_notifier(notifier),
            ..self
        }
    }

    // == Calls ==
    /// Returns the cached value for `args`, awaiting the target on a miss.
    ///
    /// Concurrent callers missing on the same key wait for the first one and
    /// receive its value. Dropping the future gives up its place in that queue.
    pub async fn call(&self, args: A) -> std::result::Result<V, CallError<E>> {
        self.call_in(None, args).await
    }

    /// Like [`call`](Self::call), but entries are partitioned by `scope`.
    pub async fn call_scoped(&self, scope: &Scope, args: A) -> std::result::Result<V, CallError<E>> {
        self.call_in(Some(scope), args).await
    }

    async fn call_in(&self, scope: Option<&Scope>, args: A) -> std::result::Result<V, CallError<E>> {
        let key = KeyDeriver::derive_from(self.engine.identity(), scope, &args)?;
        if let Lookup::Hit(value) = self.engine.lookup(&key) {
            return Ok(value);
        }

        let claim = self.in_flight.claim(&key);
        let _guard = claim.lock().await;
        match self.engine.recheck(&key) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Miss(now) => {
                debug!(cache = %self.engine.identity(), %key, "Cache miss, awaiting computation");
                let outcome = (self.target)(args).await;
                self.engine.settle(key, now, outcome)
            }
        }
    }

    // == Accessors ==
    /// Name the keys of this wrapper are derived under.
    pub fn identity(&self) -> &str {
        self.engine.identity()
    }

    /// The validated configuration this wrapper was built with.
    pub fn config(&self) -> &CacheConfig {
        self.engine.config()
    }

    /// Snapshot of hit, miss, failure and sweep counters.
    pub fn stats(&self) -> CacheStats {
        self.engine.stats()
    }

    /// Entries currently held, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A, V> AsyncMemoized<A, V, Infallible>
where
    A: Serialize,
    V: Clone,
{
    /// Wraps an async target that cannot fail.
    pub fn new<F, Fut>(identity: impl Into<String>, config: CacheConfig, target: F) -> Result<Self>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = V> + Send + 'static,
    {
        Self::fallible(identity, config, move |args| {
            let fut = target(args);
            async move { Ok::<V, Infallible>(fut.await) }
        })
    }

    /// Infallible counterpart of [`call`](Self::call).
    pub async fn get(&self, args: A) -> Result<V> {
        self.call(args).await.map_err(cache_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn slow_square(calls: Arc<AtomicUsize>) -> AsyncMemoized<u64, u64> {
        AsyncMemoized::new("slow_square", CacheConfig::new(60.0).unwrap(), move |n: u64| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                n * n
            }
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_async_hit_after_miss() {
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = slow_square(Arc::clone(&calls));

        assert_eq!(memo.get(4).await.unwrap(), 16);
        assert_eq!(memo.get(4).await.unwrap(), 16);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_compute_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = Arc::new(slow_square(Arc::clone(&calls)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = Arc::clone(&memo);
                tokio::spawn(async move { memo.get(9).await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 81);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = memo.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 7);
        assert_eq!(memo.in_flight.pending(), 0);
    }

    #[tokio::test]
    async fn test_async_ttl_with_manual_clock() {
        let calls = Arc::new(AtomicUsize::new(0));
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 9, 9, 9, 0, 0).unwrap());
        let memo = slow_square(Arc::clone(&calls)).with_clock(Arc::new(clock.clone()));

        memo.get(2).await.unwrap();
        clock.advance(Duration::from_secs(61));
        memo.get(2).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_async_failure_propagates() {
        let memo = AsyncMemoized::fallible("parse", CacheConfig::new(60.0).unwrap(), |raw: String| async move {
            raw.parse::<u32>()
        })
        .unwrap();

        assert!(memo.call("12x".to_string()).await.unwrap_err().is_compute());
        assert!(memo.is_empty());
        assert_eq!(memo.call("12".to_string()).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_async_scopes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = slow_square(Arc::clone(&calls));
        let a = Scope::unique();
        let b = Scope::unique();

        memo.call_scoped(&a, 3).await.unwrap();
        memo.call_scoped(&b, 3).await.unwrap();
        memo.call_scoped(&a, 3).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
