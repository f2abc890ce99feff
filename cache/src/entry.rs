use std::sync::Arc;
use std::time::Duration;

/// A container for a value in the cache, holding the metadata needed to
/// judge its freshness.
///
/// Entries are immutable once stored. A refresh or an update replaces the
/// whole entry, so a reader holding an old `Arc<CacheEntry<V>>` keeps a
/// consistent view.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  /// The getter's result. `None` records that the upstream had nothing for
  /// this key.
  value: Option<Arc<V>>,
  /// Clock reading (nanoseconds) when the value was fetched or written.
  fetched_at: u64,
}

impl<V> CacheEntry<V> {
  pub(crate) fn new(value: Option<Arc<V>>, fetched_at: u64) -> Self {
    Self { value, fetched_at }
  }

  /// Returns a clone of the `Arc` containing the value.
  #[inline]
  pub(crate) fn value(&self) -> Option<Arc<V>> {
    self.value.clone()
  }

  #[inline]
  pub(crate) fn age(&self, now_nanos: u64) -> Duration {
    Duration::from_nanos(now_nanos.saturating_sub(self.fetched_at))
  }

  /// An entry is fresh while its age is strictly below the TTL.
  #[inline]
  pub(crate) fn is_fresh(&self, now_nanos: u64, ttl: Duration) -> bool {
    self.age(now_nanos) < ttl
  }
}

/// A point-in-time view of one cached entry, as returned by `store()`.
#[derive(Debug, Clone)]
pub struct StoreEntry<K, V> {
  /// The entry's key.
  pub key: K,
  /// The cached value; `None` if the getter reported nothing for the key.
  pub value: Option<Arc<V>>,
  /// Time since the value was fetched or written.
  pub age: Duration,
  /// Whether the entry was still within its TTL when the view was taken.
  pub fresh: bool,
}
