use crate::entry::StoreEntry;
use crate::loader::{AsyncGetterFn, LoadOutcome};
use crate::metrics::Metrics;
use crate::shared::{CacheShared, Lookup};
use crate::{MetricsSnapshot, ReadType};

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

// --- AsyncTimedCache Implementation ---

/// A thread-safe, asynchronous timed cache.
///
/// A `get` that misses awaits the getter inside the caller's task. Other
/// tasks asking for the same key meanwhile wait on that load without
/// blocking their threads. Dropping a `get` future that leads a load
/// abandons it; the waiters then retry on their own.
pub struct AsyncTimedCache<K, V, E, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
  pub(crate) getter: Arc<AsyncGetterFn<K, V, E>>,
}

impl<K, V, E, H> Clone for AsyncTimedCache<K, V, E, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
      getter: self.getter.clone(),
    }
  }
}

impl<K, V, E, H> fmt::Debug for AsyncTimedCache<K, V, E, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AsyncTimedCache")
      .field("shared", &self.shared)
      .finish_non_exhaustive()
  }
}

impl<K, V, E, H> AsyncTimedCache<K, V, E, H>
where
  K: Eq + Hash + Clone + fmt::Debug,
  E: fmt::Display,
  H: BuildHasher + Clone,
{
  /// Retrieves the value for `key`, going to the getter when `read_type`
  /// requires it.
  ///
  /// Returns `Ok(None)` when the getter reported nothing for the key. A
  /// getter error is returned unchanged and leaves the cached entry, if
  /// any, as it was.
  pub async fn get(&self, key: &K, read_type: ReadType) -> Result<Option<Arc<V>>, E> {
    if self.shared.disabled {
      Metrics::incr(&self.shared.metrics.misses);
      Metrics::incr(&self.shared.metrics.loads);
      let value = (self.getter)(key.clone()).await?;
      return Ok(value.map(Arc::new));
    }

    let mut missed = false;
    loop {
      match self.shared.lookup(key, read_type) {
        Lookup::Hit(value) => return Ok(value),
        Lookup::Lead(guard) => {
          if !missed {
            Metrics::incr(&self.shared.metrics.misses);
          }
          return match (self.getter)(key.clone()).await {
            Ok(value) => Ok(guard.complete(value)),
            Err(err) => {
              warn!(key = ?key, error = %err, "getter failed; cached entry left unchanged");
              guard.fail();
              Err(err)
            }
          };
        }
        Lookup::Wait(load) => {
          if !missed {
            Metrics::incr(&self.shared.metrics.misses);
            missed = true;
          }
          Metrics::incr(&self.shared.metrics.coalesced_waits);
          trace!(key = ?key, "waiting on in-flight load");
          match (&*load).await {
            LoadOutcome::Loaded(value) if read_type != ReadType::ForceRefresh => {
              return Ok(value)
            }
            _ => continue,
          }
        }
      }
    }
  }

  /// Like `get`, but returns an owned copy that the caller may mutate
  /// freely without affecting the cached value.
  pub async fn get_cloned(&self, key: &K, read_type: ReadType) -> Result<Option<V>, E>
  where
    V: Clone,
  {
    let value = self.get(key, read_type).await?;
    Ok(value.map(|arc| V::clone(&arc)))
  }

  /// Writes `value` for `key` without calling the getter and resets its
  /// fetch time. Does nothing on a disabled cache.
  pub fn update(&self, key: K, value: V) {
    self.shared.update(key, value);
  }

  /// Removes the entry for `key`, so the next `get` calls the getter
  /// whatever the TTL. Returns `true` if an entry was present.
  pub fn delete(&self, key: &K) -> bool {
    self.shared.delete(key)
  }

  /// Returns a view of every cached entry, fresh or stale.
  pub fn store(&self) -> Vec<StoreEntry<K, V>> {
    self.shared.store_view()
  }

  pub fn keys(&self) -> Vec<K> {
    self.shared.keys()
  }

  pub fn len(&self) -> usize {
    self.shared.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Removes every entry. Loads in flight finish but are not stored.
  pub fn clear(&self) {
    self.shared.clear();
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  pub fn time_to_live(&self) -> Duration {
    self.shared.time_to_live
  }

  pub fn is_disabled(&self) -> bool {
    self.shared.disabled
  }
}
