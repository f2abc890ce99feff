use crate::entry::CacheEntry;
use crate::loader::LoadFuture;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, RwLock};

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<K: Hash, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  hasher.hash_one(key)
}

/// One independently locked partition of the store.
pub(crate) struct Shard<K, V, H> {
  /// Settled entries. The write lock is only held for an insert or remove,
  /// never across a getter call.
  pub(crate) map: RwLock<HashMap<K, Arc<CacheEntry<V>>, H>>,
  /// Loads currently in flight for keys of this shard.
  pub(crate) pending: Mutex<HashMap<K, Arc<LoadFuture<V>>, H>>,
}

/// A cache store that is partitioned into multiple, independently locked shards.
///
/// Operations on different keys are unlikely to contend for the same lock.
pub(crate) struct ShardedStore<K, V, H> {
  pub(crate) shards: Box<[CachePadded<Shard<K, V, H>>]>,
  pub(crate) hasher: H,
}

impl<K, V, H> fmt::Debug for ShardedStore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V, H> ShardedStore<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  /// Creates a new `ShardedStore`. `num_shards` must be a power of two.
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    debug_assert!(num_shards.is_power_of_two());
    let shards = (0..num_shards)
      .map(|_| {
        CachePadded::new(Shard {
          map: RwLock::new(HashMap::with_hasher(hasher.clone())),
          pending: Mutex::new(HashMap::with_hasher(hasher.clone())),
        })
      })
      .collect::<Vec<_>>();

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  pub(crate) fn shard_index(&self, key: &K) -> usize {
    let hash = hash_key(&self.hasher, key);
    hash as usize & (self.shards.len() - 1)
  }

  /// Returns the shard responsible for `key`.
  #[inline]
  pub(crate) fn get_shard(&self, key: &K) -> &Shard<K, V, H> {
    &self.shards[self.shard_index(key)]
  }

  /// Iterates over all shards, for whole-cache operations like `clear()`.
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &Shard<K, V, H>> {
    self.shards.iter().map(|padded| &**padded)
  }
}
