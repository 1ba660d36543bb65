//! Memoization Engine
//!
//! The state shared by every wrapper flavor: store, stats, expiry policy, clock
//! and notifier, plus the per-key in-flight claims that make concurrent misses
//! converge on one computation.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::{CacheStats, TtlStore};
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CallError, Result};
use crate::key::CacheKey;
use crate::notify::{HitNotifier, TemplateNotifier};
use crate::policy::ExpiryPolicy;

/// Result of checking the store for a key.
pub(crate) enum Lookup<V> {
    Hit(V),
    /// No servable entry; carries the instant the miss was decided at
    Miss(DateTime<Utc>),
}

struct EngineState<V> {
    store: TtlStore<V>,
    stats: CacheStats,
}

// == Engine ==
pub(crate) struct Engine<V> {
    identity: String,
    config: CacheConfig,
    policy: ExpiryPolicy,
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn HitNotifier>>,
    state: Mutex<EngineState<V>>,
}

impl<V: Clone> Engine<V> {
    pub(crate) fn new(identity: impl Into<String>, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let notifier = TemplateNotifier::from_config(&config)?
            .map(|notifier| Arc::new(notifier) as Arc<dyn HitNotifier>);

        Ok(Self {
            identity: identity.into(),
            policy: ExpiryPolicy::from_config(&config),
            config,
            clock: Arc::new(SystemClock),
            notifier,
            state: Mutex::new(EngineState {
                store: TtlStore::new(),
                stats: CacheStats::new(),
            }),
        })
    }

    pub(crate) fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn with_notifier(mut self, notifier: Arc<dyn HitNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    // == Lookup ==
    /// Sweeps expired entries, then serves `key` if its entry is still valid.
    ///
    /// A hit is counted and announced here; misses are counted once settled.
    pub(crate) fn lookup(&self, key: &CacheKey) -> Lookup<V> {
        self.check(key, true)
    }

    /// Like [`Engine::lookup`] but without sweeping, for the re-check a caller
    /// makes after winning a key's claim within the same call.
    pub(crate) fn recheck(&self, key: &CacheKey) -> Lookup<V> {
        self.check(key, false)
    }

    fn check(&self, key: &CacheKey, sweep: bool) -> Lookup<V> {
        let now = self.clock.now();
        let hit = {
            let mut state = self.state.lock();
            if sweep {
                let removed = state.store.sweep(now, self.policy.ttl());
                if removed > 0 {
                    state.stats.record_swept(removed);
                    debug!(cache = %self.identity, removed, "Swept expired entries");
                }
            }

            let hit = state
                .store
                .get(key)
                .filter(|entry| self.policy.is_valid(entry, now))
                .map(|entry| (entry.value.clone(), entry.stored_at));
            if hit.is_some() {
                state.stats.record_hit();
            }
            let len = state.store.len();
            state.stats.set_total_entries(len);
            hit
        };

        match hit {
            Some((value, stored_at)) => {
                debug!(cache = %self.identity, %key, %stored_at, "Cache hit");
                if let Some(notifier) = &self.notifier {
                    notifier.notify(&self.identity, key, stored_at);
                }
                Lookup::Hit(value)
            }
            None => Lookup::Miss(now),
        }
    }

    // == Settle ==
    /// Records the outcome of a miss. Only successful values are stored.
    pub(crate) fn settle<E>(
        &self,
        key: CacheKey,
        now: DateTime<Utc>,
        outcome: std::result::Result<V, E>,
    ) -> std::result::Result<V, CallError<E>> {
        let mut state = self.state.lock();
        match outcome {
            Ok(value) => {
                state.store.put(key, value.clone(), now);
                state.stats.record_miss();
                let len = state.store.len();
                state.stats.set_total_entries(len);
                Ok(value)
            }
            Err(err) => {
                state.stats.record_failure();
                warn!(cache = %self.identity, %key, "Computation failed, nothing cached");
                Err(CallError::Compute(err))
            }
        }
    }

    /// Blocking miss path: claim the key, re-check, compute if still missing.
    pub(crate) fn resolve_blocking<E>(
        &self,
        in_flight: &InFlight<Mutex<()>>,
        key: CacheKey,
        compute: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<V, CallError<E>> {
        if let Lookup::Hit(value) = self.lookup(&key) {
            return Ok(value);
        }

        let claim = in_flight.claim(&key);
        let _guard = claim.lock();
        match self.recheck(&key) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Miss(now) => {
                debug!(cache = %self.identity, %key, "Cache miss, computing");
                self.settle(key, now, compute())
            }
        }
    }

    // == Accessors ==
    pub(crate) fn identity(&self) -> &str {
        &self.identity
    }

    pub(crate) fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.state.lock().stats.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().store.len()
    }
}

// == In-Flight Claims ==
/// Per-key markers; `M` is the lock type waiters queue on.
pub(crate) struct InFlight<M> {
    markers: Mutex<HashMap<CacheKey, Arc<M>>>,
}

impl<M: Default> InFlight<M> {
    pub(crate) fn new() -> Self {
        Self {
            markers: Mutex::new(HashMap::new()),
        }
    }

    /// Shares the marker for `key`, creating it for the first claimant.
    pub(crate) fn claim(&self, key: &CacheKey) -> Claim<'_, M> {
        let marker = Arc::clone(self.markers.lock().entry(key.clone()).or_default());
        Claim {
            in_flight: self,
            key: key.clone(),
            marker,
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.markers.lock().len()
    }
}

/// A caller's share of a key's marker. The last claim dropped removes the marker.
pub(crate) struct Claim<'a, M> {
    in_flight: &'a InFlight<M>,
    key: CacheKey,
    marker: Arc<M>,
}

impl<M> Deref for Claim<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.marker
    }
}

impl<M> Drop for Claim<'_, M> {
    fn drop(&mut self) {
        let mut markers = self.in_flight.markers.lock();
        // Map plus this claim: nobody else is waiting
        let last = Arc::strong_count(&self.marker) == 2
            && markers
                .get(&self.key)
                .is_some_and(|marker| Arc::ptr_eq(marker, &self.marker));
        if last {
            markers.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::time::Duration;

    fn engine(ttl: f64) -> (Engine<u32>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap());
        let engine = Engine::new("test", CacheConfig::new(ttl).unwrap())
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (engine, clock)
    }

    #[test]
    fn test_lookup_miss_then_hit() {
        let (engine, clock) = engine(10.0);
        let key = CacheKey::from_canonical("k");

        let now = match engine.lookup(&key) {
            Lookup::Miss(now) => now,
            Lookup::Hit(_) => panic!("empty engine reported a hit"),
        };
        assert_eq!(now, clock.now());
        engine.settle::<()>(key.clone(), now, Ok(7)).unwrap();

        assert!(matches!(engine.lookup(&key), Lookup::Hit(7)));
        let stats = engine.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_lookup_sweeps_expired() {
        let (engine, clock) = engine(1.0);
        let key = CacheKey::from_canonical("k");
        engine.settle::<()>(key.clone(), clock.now(), Ok(1)).unwrap();

        clock.advance(Duration::from_secs(2));
        assert!(matches!(engine.lookup(&key), Lookup::Miss(_)));
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().swept, 1);
    }

    #[test]
    fn test_recheck_leaves_sweeping_to_lookup() {
        let (engine, clock) = engine(1.0);
        let stale = CacheKey::from_canonical("stale");
        let key = CacheKey::from_canonical("k");
        engine.settle::<()>(stale.clone(), clock.now(), Ok(1)).unwrap();

        clock.advance(Duration::from_secs(2));
        assert!(matches!(engine.recheck(&stale), Lookup::Miss(_)));
        assert!(matches!(engine.recheck(&key), Lookup::Miss(_)));
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.stats().swept, 0);

        assert!(matches!(engine.lookup(&key), Lookup::Miss(_)));
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().swept, 1);
    }

    #[test]
    fn test_settle_failure_stores_nothing() {
        let (engine, clock) = engine(10.0);
        let key = CacheKey::from_canonical("k");

        let result = engine.settle(key.clone(), clock.now(), Err("boom"));
        assert!(matches!(result, Err(CallError::Compute("boom"))));
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().failures, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CacheConfig::new(1.0).unwrap();
        config.notify_template = Some("{oops}".to_string());
        assert!(Engine::<u32>::new("bad", config).is_err());
    }

    #[test]
    fn test_claims_share_and_clean_up() {
        let in_flight: InFlight<Mutex<()>> = InFlight::new();
        let key = CacheKey::from_canonical("k");
        {
            let first = in_flight.claim(&key);
            let second = in_flight.claim(&key);
            assert!(Arc::ptr_eq(&first.marker, &second.marker));
            assert_eq!(in_flight.pending(), 1);
        }
        assert_eq!(in_flight.pending(), 0);
    }

    #[test]
    fn test_resolve_blocking_computes_once() {
        let (engine, _clock) = engine(10.0);
        let in_flight = InFlight::new();
        let key = CacheKey::from_canonical("k");

        let first = engine.resolve_blocking::<()>(&in_flight, key.clone(), || Ok(3));
        let second = engine.resolve_blocking::<()>(&in_flight, key, || panic!("recomputed"));
        assert_eq!(first.unwrap(), 3);
        assert_eq!(second.unwrap(), 3);
        assert_eq!(in_flight.pending(), 0);
    }
}
