use crate::entry::{CacheEntry, StoreEntry};
use crate::loader::{LoadFuture, LoadOutcome};
use crate::metrics::Metrics;
use crate::read_type::ReadType;
use crate::store::ShardedStore;
use crate::time::{self, Clock};

use std::hash::{BuildHasher, Hash};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

/// The internal, thread-safe core shared by `TimedCache` and `AsyncTimedCache`.
///
/// Lock order: a caller may take a shard's `map` read lock while holding
/// the same shard's `pending` lock, never the other way round. Writers take
/// each lock on its own.
pub(crate) struct CacheShared<K, V, H> {
  pub(crate) store: ShardedStore<K, V, H>,
  pub(crate) metrics: Metrics,
  pub(crate) time_to_live: Duration,
  pub(crate) max_staleness: Option<Duration>,
  pub(crate) disabled: bool,
  pub(crate) clock: Arc<dyn Clock>,
}

impl<K, V, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("time_to_live", &self.time_to_live)
      .field("max_staleness", &self.max_staleness)
      .field("disabled", &self.disabled)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

/// The next step for a `get` call.
pub(crate) enum Lookup<'a, K, V, H>
where
  K: Eq + Hash + Clone + fmt::Debug,
  H: BuildHasher + Clone,
{
  /// Answered from the store.
  Hit(Option<Arc<V>>),
  /// The caller is the leader for this key and must run the getter.
  Lead(LoadGuard<'a, K, V, H>),
  /// Another caller's load is in flight.
  Wait(Arc<LoadFuture<V>>),
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone + fmt::Debug,
  H: BuildHasher + Clone,
{
  #[inline]
  pub(crate) fn now_nanos(&self) -> u64 {
    time::as_nanos(self.clock.now())
  }

  /// Tries to answer from a settled entry according to `read_type`.
  fn serve(&self, entry: &CacheEntry<V>, read_type: ReadType, now: u64) -> Option<Option<Arc<V>>> {
    match read_type {
      ReadType::ForceRefresh => None,
      ReadType::Default => {
        if entry.is_fresh(now, self.time_to_live) {
          Metrics::incr(&self.metrics.hits);
          Some(entry.value())
        } else {
          None
        }
      }
      ReadType::Unsafe => {
        if entry.is_fresh(now, self.time_to_live) {
          Metrics::incr(&self.metrics.hits);
          return Some(entry.value());
        }
        match self.max_staleness {
          Some(bound) if entry.age(now) >= bound => None,
          _ => {
            Metrics::incr(&self.metrics.stale_hits);
            Some(entry.value())
          }
        }
      }
    }
  }

  /// Decides whether `key` can be served from the store, must be loaded by
  /// the caller, or is already being loaded by someone else.
  pub(crate) fn lookup(&self, key: &K, read_type: ReadType) -> Lookup<'_, K, V, H> {
    let shard = self.store.get_shard(key);

    // Optimistic path: a shard read lock and nothing else.
    if read_type != ReadType::ForceRefresh {
      let entry = shard.map.read().get(key).cloned();
      if let Some(entry) = entry {
        if let Some(value) = self.serve(&entry, read_type, self.now_nanos()) {
          return Lookup::Hit(value);
        }
      }
    }

    let mut pending = shard.pending.lock();
    if let Some(load) = pending.get(key) {
      return Lookup::Wait(load.clone());
    }

    // A leader stores its result before it leaves `pending`, so with the
    // pending lock held and no load in flight the store is up to date.
    if read_type != ReadType::ForceRefresh {
      let entry = shard.map.read().get(key).cloned();
      if let Some(entry) = entry {
        if let Some(value) = self.serve(&entry, read_type, self.now_nanos()) {
          return Lookup::Hit(value);
        }
      }
    }

    let load = Arc::new(LoadFuture::new());
    pending.insert(key.clone(), load.clone());
    drop(pending);

    Metrics::incr(&self.metrics.loads);
    debug!(key = ?key, read_type = %read_type, "loading entry from getter");
    Lookup::Lead(LoadGuard {
      shared: self,
      key: key.clone(),
      load,
      armed: true,
    })
  }

  /// Removes `load` from the pending table if it is still the registered
  /// load for `key`.
  fn retire(&self, key: &K, load: &Arc<LoadFuture<V>>) {
    let shard = self.store.get_shard(key);
    let mut pending = shard.pending.lock();
    if pending.get(key).is_some_and(|current| Arc::ptr_eq(current, load)) {
      pending.remove(key);
    }
  }

  /// Detaches and forgets any in-flight load for `key`, so its result is
  /// not written over a newer state of the key.
  fn detach_pending(&self, key: &K) {
    let shard = self.store.get_shard(key);
    if let Some(load) = shard.pending.lock().remove(key) {
      load.detach();
      trace!(key = ?key, "detached in-flight load");
    }
  }

  /// Overwrites the entry for `key` and resets its fetch time.
  pub(crate) fn update(&self, key: K, value: V) {
    if self.disabled {
      return;
    }
    let entry = Arc::new(CacheEntry::new(Some(Arc::new(value)), self.now_nanos()));
    self.detach_pending(&key);
    self.store.get_shard(&key).map.write().insert(key, entry);
    Metrics::incr(&self.metrics.updates);
  }

  /// Removes the entry for `key`. Returns whether an entry was present.
  pub(crate) fn delete(&self, key: &K) -> bool {
    if self.disabled {
      return false;
    }
    self.detach_pending(key);
    let removed = self.store.get_shard(key).map.write().remove(key).is_some();
    if removed {
      Metrics::incr(&self.metrics.invalidations);
      debug!(key = ?key, "invalidated entry");
    }
    removed
  }

  pub(crate) fn clear(&self) {
    for shard in self.store.iter_shards() {
      for (_, load) in shard.pending.lock().drain() {
        load.detach();
      }
      shard.map.write().clear();
    }
  }

  pub(crate) fn store_view(&self) -> Vec<StoreEntry<K, V>> {
    let now = self.now_nanos();
    let mut out = Vec::new();
    for shard in self.store.iter_shards() {
      let guard = shard.map.read();
      out.extend(guard.iter().map(|(key, entry)| StoreEntry {
        key: key.clone(),
        value: entry.value(),
        age: entry.age(now),
        fresh: entry.is_fresh(now, self.time_to_live),
      }));
    }
    out
  }

  pub(crate) fn keys(&self) -> Vec<K> {
    self
      .store
      .iter_shards()
      .flat_map(|shard| shard.map.read().keys().cloned().collect::<Vec<_>>())
      .collect()
  }

  pub(crate) fn len(&self) -> usize {
    self.store.iter_shards().map(|shard| shard.map.read().len()).sum()
  }
}

/// Leadership of one in-flight load.
///
/// Dropping the guard without calling `complete` (getter error, panic or a
/// cancelled async caller) settles the load as failed so waiters do not
/// hang; they re-check the store and may lead a new attempt.
pub(crate) struct LoadGuard<'a, K, V, H>
where
  K: Eq + Hash + Clone + fmt::Debug,
  H: BuildHasher + Clone,
{
  shared: &'a CacheShared<K, V, H>,
  key: K,
  load: Arc<LoadFuture<V>>,
  armed: bool,
}

impl<'a, K, V, H> LoadGuard<'a, K, V, H>
where
  K: Eq + Hash + Clone + fmt::Debug,
  H: BuildHasher + Clone,
{
  /// Stores the getter's result (unless the key was deleted or updated in
  /// the meantime) and hands it to every waiter.
  pub(crate) fn complete(mut self, value: Option<V>) -> Option<Arc<V>> {
    self.armed = false;
    let value = value.map(Arc::new);
    let shared = self.shared;

    let entry = Arc::new(CacheEntry::new(value.clone(), shared.now_nanos()));
    // `delete`, `update` and `clear` detach before taking the map write
    // lock, so the flag must be read under that lock.
    let stored = {
      let mut map = shared.store.get_shard(&self.key).map.write();
      if self.load.is_detached() {
        false
      } else {
        map.insert(self.key.clone(), entry);
        true
      }
    };
    if stored {
      debug!(key = ?self.key, found = value.is_some(), "stored loaded entry");
    } else {
      debug!(key = ?self.key, "load finished after invalidation; result not stored");
    }

    shared.retire(&self.key, &self.load);
    self.load.settle(LoadOutcome::Loaded(value.clone()));
    value
  }

  /// Gives up leadership after a getter error. The store is left untouched.
  pub(crate) fn fail(mut self) {
    self.armed = false;
    self.abandon();
  }

  fn abandon(&self) {
    Metrics::incr(&self.shared.metrics.load_failures);
    self.shared.retire(&self.key, &self.load);
    self.load.settle(LoadOutcome::Failed);
  }
}

impl<'a, K, V, H> Drop for LoadGuard<'a, K, V, H>
where
  K: Eq + Hash + Clone + fmt::Debug,
  H: BuildHasher + Clone,
{
  fn drop(&mut self) {
    if self.armed {
      debug!(key = ?self.key, "load abandoned before completion");
      self.abandon();
    }
  }
}
