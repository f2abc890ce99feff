use crate::error::BuildError;
use crate::handles::{AsyncTimedCache, TimedCache};
use crate::loader::Getter;
use crate::metrics::Metrics;
use crate::shared::CacheShared;
use crate::store::ShardedStore;
use crate::time::{Clock, SystemClock};

use core::fmt;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

/// A builder for creating `TimedCache` and `AsyncTimedCache` instances.
pub struct CacheBuilder<K, V, E, H = ahash::RandomState> {
  time_to_live: Duration,
  max_staleness: Option<Duration>,
  shards: usize,
  disabled: bool,
  hasher: H,
  clock: Arc<dyn Clock>,
  getter: Option<Getter<K, V, E>>,
}

impl<K, V, E, H> fmt::Debug for CacheBuilder<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("time_to_live", &self.time_to_live)
      .field("max_staleness", &self.max_staleness)
      .field("shards", &self.shards)
      .field("disabled", &self.disabled)
      .field("has_getter", &self.getter.is_some())
      .finish_non_exhaustive()
  }
}

// --- General Configuration Methods ---
impl<K, V, E, H> CacheBuilder<K, V, E, H> {
  /// Sets how long a fetched value counts as fresh.
  pub fn time_to_live(mut self, duration: Duration) -> Self {
    self.time_to_live = duration;
    self
  }

  /// Bounds how stale a value an `Unsafe` read may return. Past this age an
  /// `Unsafe` read behaves like a `Default` one.
  ///
  /// Unbounded if not set.
  pub fn max_staleness(mut self, duration: Duration) -> Self {
    self.max_staleness = Some(duration);
    self
  }

  /// Sets the number of concurrent shards to use.
  pub fn shards(mut self, shards: usize) -> Self {
    // Ensure shards is at least 1 and a power of two for fast bitwise ANDing.
    self.shards = shards.max(1).next_power_of_two();
    self
  }

  /// Turns the cache into a pass-through: every `get` calls the getter and
  /// nothing is stored.
  pub fn disabled(mut self, disabled: bool) -> Self {
    self.disabled = disabled;
    self
  }

  /// Replaces the time source used for freshness checks.
  pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Sets the synchronous getter, used by `build`.
  ///
  /// It returns `Ok(None)` when the upstream has nothing for the key.
  pub fn getter<F>(mut self, f: F) -> Self
  where
    F: Fn(&K) -> Result<Option<V>, E> + Send + Sync + 'static,
  {
    self.getter = Some(Getter::Sync(Arc::new(f)));
    self
  }

  /// Sets the asynchronous getter, used by `build_async`.
  ///
  /// It returns `Ok(None)` when the upstream has nothing for the key.
  pub fn async_getter<F, Fut>(mut self, f: F) -> Self
  where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
  {
    self.getter = Some(Getter::Async(Arc::new(move |key| f(key).boxed())));
    self
  }
}

// --- Constructors ---
impl<K, V, E> CacheBuilder<K, V, E, ahash::RandomState> {
  /// Creates a new `CacheBuilder` with default settings: a 60 second TTL,
  /// unbounded staleness for `Unsafe` reads and `num_cpus * 4` shards.
  pub fn new() -> Self {
    Self::with_hasher(ahash::RandomState::new())
  }
}

impl<K, V, E> Default for CacheBuilder<K, V, E, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V, E, H> CacheBuilder<K, V, E, H> {
  /// Creates a new `CacheBuilder` that hashes keys with `hasher`.
  pub fn with_hasher(hasher: H) -> Self {
    Self {
      time_to_live: Duration::from_secs(60),
      max_staleness: None,
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      disabled: false,
      hasher,
      clock: Arc::new(SystemClock),
      getter: None,
    }
  }
}

// --- Build Methods ---
impl<K, V, E, H> CacheBuilder<K, V, E, H>
where
  K: Eq + Hash + Clone,
  H: BuildHasher + Clone,
{
  /// Builds a synchronous `TimedCache`. Requires a getter set with `getter`.
  pub fn build(mut self) -> Result<TimedCache<K, V, E, H>, BuildError> {
    self.validate()?;
    match self.getter.take() {
      Some(Getter::Sync(getter)) => Ok(TimedCache {
        shared: self.build_shared_core(),
        getter,
      }),
      Some(Getter::Async(_)) => Err(BuildError::GetterMismatch),
      None => Err(BuildError::MissingGetter),
    }
  }

  /// Builds an asynchronous `AsyncTimedCache`. Requires a getter set with
  /// `async_getter`.
  pub fn build_async(mut self) -> Result<AsyncTimedCache<K, V, E, H>, BuildError> {
    self.validate()?;
    match self.getter.take() {
      Some(Getter::Async(getter)) => Ok(AsyncTimedCache {
        shared: self.build_shared_core(),
        getter,
      }),
      Some(Getter::Sync(_)) => Err(BuildError::GetterMismatch),
      None => Err(BuildError::MissingGetter),
    }
  }

  fn build_shared_core(self) -> Arc<CacheShared<K, V, H>> {
    Arc::new(CacheShared {
      store: ShardedStore::new(self.shards, self.hasher),
      metrics: Metrics::new(),
      time_to_live: self.time_to_live,
      max_staleness: self.max_staleness,
      disabled: self.disabled,
      clock: self.clock,
    })
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    if self.getter.is_none() {
      return Err(BuildError::MissingGetter);
    }
    if self.time_to_live.is_zero() && !self.disabled {
      return Err(BuildError::ZeroTimeToLive);
    }
    Ok(())
  }
}
