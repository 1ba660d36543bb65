//! Memoized methods.
//!
//! The owner is passed to the target but only its declared [`Scope`] reaches the
//! key. Owner state that is not part of the arguments is invisible to the cache:
//! mutate the owner and you get the previous result until the entry expires.

use std::convert::Infallible;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::CacheStats;
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::error::{CallError, Result};
use crate::key::{KeyDeriver, Scoped};
use crate::memo::engine::{Engine, InFlight};
use crate::memo::function::cache_error;
use crate::notify::HitNotifier;

type MethodTarget<O, A, V, E> = Box<dyn Fn(&O, &A) -> std::result::Result<V, E> + Send + Sync>;

/// A method memoized per owner scope.
///
/// # Example
/// ```
/// use timed_memo::{CacheConfig, MemoizedMethod, Scope, Scoped};
///
/// struct Multiplier {
///     scope: Scope,
///     factor: u64,
/// }
///
/// impl Scoped for Multiplier {
///     fn scope(&self) -> &Scope {
///         &self.scope
///     }
/// }
///
/// let times = MemoizedMethod::new("times", CacheConfig::new(60.0).unwrap(), |m: &Multiplier, n: &u64| {
///     m.factor * n
/// })
/// .unwrap();
///
/// let ten = Multiplier { scope: Scope::unique(), factor: 10 };
/// let twenty = Multiplier { scope: Scope::unique(), factor: 20 };
/// assert_eq!(times.get(&ten, &5).unwrap(), 50);
/// assert_eq!(times.get(&twenty, &5).unwrap(), 100);
/// ```
pub struct MemoizedMethod<O, A, V, E = Infallible> {
    engine: Engine<V>,
    in_flight: InFlight<Mutex<()>>,
    target: MethodTarget<O, A, V, E>,
}

impl<O, A, V, E> MemoizedMethod<O, A, V, E>
where
    O: Scoped,
    A: Serialize,
    V: Clone,
{
    // == Constructors ==
    /// Wraps a method that may fail. Failures are returned and never cached.
    pub fn fallible<F>(identity: impl Into<String>, config: CacheConfig, target: F) -> Result<Self>
    where
        F: Fn(&O, &A) -> std::result::Result<V, E> + Send + Sync + 'static,
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
    /// Calls the method on `owner`, sharing entries with every owner of the same scope.
    pub fn call(&self, owner: &O, args: &A) -> std::result::Result<V, CallError<E>> {
        let key = KeyDeriver::derive_from(self.engine.identity(), Some(owner.scope()), args)?;
        self.engine
            .resolve_blocking(&self.in_flight, key, || (self.target)(owner, args))
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

    /// Snapshot of hit, miss, failure and sweep counters, across all owners.
    pub fn stats(&self) -> CacheStats {
        self.engine.stats()
    }

    /// Entries currently held for all owners together.
    pub fn len(&self) -> usize {
        self.engine.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<O, A, V> MemoizedMethod<O, A, V, Infallible>
where
    O: Scoped,
    A: Serialize,
    V: Clone,
{
    /// Wraps a method that cannot fail.
    pub fn new<F>(identity: impl Into<String>, config: CacheConfig, target: F) -> Result<Self>
    where
        F: Fn(&O, &A) -> V + Send + Sync + 'static,
    {
        Self::fallible(identity, config, move |owner: &O, args: &A| Ok(target(owner, args)))
    }

    /// Infallible counterpart of [`call`](Self::call).
    pub fn get(&self, owner: &O, args: &A) -> Result<V> {
        self.call(owner, args).map_err(cache_error)
    }
}
