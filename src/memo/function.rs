//! Memoized free callables.

use std::convert::Infallible;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::{CacheError, CallError, Result};
use crate::key::{KeyDeriver, Scope};
use crate::memo::engine::{Engine, InFlight};
use crate::notify::HitNotifier;

type Target<A, V, E> = Box<dyn Fn(&A) -> std::result::Result<V, E> + Send + Sync>;

/// A callable whose results are reused for `ttl` per distinct argument bundle.
///
/// `A` is the whole argument bundle: use a tuple for positional arguments or a
/// struct for named ones. Each `Memoized` owns its own cache.
///
/// Calling the same wrapper with the same key from inside `target` deadlocks.
///
/// # Example
/// ```
/// use timed_memo::{CacheConfig, Memoized};
///
/// let square = Memoized::new("square", CacheConfig::new(60.0).unwrap(), |n: &u64| n * n).unwrap();
/// assert_eq!(square.get(&12).unwrap(), 144);
/// assert_eq!(square.get(&12).unwrap(), 144);
/// assert_eq!(square.stats().hits, 1);
/// ```
pub struct Memoized<A, V, E = Infallible> {
    engine: Engine<V>,
    in_flight: InFlight<Mutex<()>>,
    target: Target<A, V, E>,
}

impl<A, V, E> Memoized<A, V, E>
where
    A: Serialize,
    V: Clone,
{
    // == Constructors ==
    /// Wraps a target that may fail. Failures are returned and never cached.
    pub fn fallible<F>(identity: impl Into<String>, config: CacheConfig, target: F) -> Result<Self>
    where
        F: Fn(&A) -> std::result::Result<V, E> + Send + Sync + 'static,
    {
        Ok(Self {
            engine: Engine::new(identity, config)?,
            in_flight: InFlight::new(),
            target: Box::new(target),
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
    /// Returns the cached value for `args`, computing it on a miss.
    pub fn call(&self, args: &A) -> std::result::Result<V, CallError<E>> {
        self.call_in(None, args)
    }

    /// Like [`call`](Self::call), but entries are partitioned by `scope`.
    pub fn call_scoped(&self, scope: &Scope, args: &A) -> std::result::Result<V, CallError<E>> {
        self.call_in(Some(scope), args)
    }

    fn call_in(&self, scope: Option<&Scope>, args: &A) -> std::result::Result<V, CallError<E>> {
        let key = KeyDeriver::derive_from(self.engine.identity(), scope, args)?;
        self.engine
            .resolve_blocking(&self.in_flight, key, || (self.target)(args))
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

impl<A, V> Memoized<A, V, Infallible>
where
    A: Serialize,
    V: Clone,
{
    /// Wraps a target that cannot fail.
    pub fn new<F>(identity: impl Into<String>, config: CacheConfig, target: F) -> Result<Self>
    where
        F: Fn(&A) -> V + Send + Sync + 'static,
    {
        Self::fallible(identity, config, move |args: &A| Ok(target(args)))
    }

    /// Wraps `target` using its type name as identity.
    pub fn wrap<F>(config: CacheConfig, target: F) -> Result<Self>
    where
        F: Fn(&A) -> V + Send + Sync + 'static,
    {
        Self::new(std::any::type_name::<F>(), config, target)
    }

    /// Infallible counterpart of [`call`](Self::call).
    pub fn get(&self, args: &A) -> Result<V> {
        self.call(args).map_err(cache_error)
    }

    /// Infallible counterpart of [`call_scoped`](Self::call_scoped).
    pub fn get_scoped(&self, scope: &Scope, args: &A) -> Result<V> {
        self.call_scoped(scope, args).map_err(cache_error)
    }
}

pub(crate) fn cache_error(err: CallError<Infallible>) -> CacheError {
    match err {
        CallError::Cache(err) => err,
        CallError::Compute(never) => match never {},
    }
}
