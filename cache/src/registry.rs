//! One place that builds the per-resource-kind caches from a `CacheConfig`
//! and can act on all of them at once.
//!
//! `register` hands back the typed cache handle; the registry itself only
//! keeps a type-erased view of each cache for whole-registry operations, so
//! callers never downcast.

use crate::builder::CacheBuilder;
use crate::config::{CacheConfig, ResourceKind};
use crate::error::BuildError;
use crate::handles::{AsyncTimedCache, TimedCache};
use crate::key::ResourceKey;
use crate::time::{Clock, SystemClock};
use crate::MetricsSnapshot;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
  #[error("a cache for {0} is already registered")]
  AlreadyRegistered(ResourceKind),

  #[error("failed to build the {kind} cache: {source}")]
  Build {
    kind: ResourceKind,
    #[source]
    source: BuildError,
  },
}

/// The operations a registry needs from a cache, whatever its value type.
trait CacheControl: Send + Sync {
  fn clear(&self);
  fn len(&self) -> usize;
  fn keys(&self) -> Vec<ResourceKey>;
  fn metrics(&self) -> MetricsSnapshot;
  fn time_to_live(&self) -> Duration;
}

impl<V, E> CacheControl for AsyncTimedCache<ResourceKey, V, E>
where
  V: Send + Sync + 'static,
  E: fmt::Display + 'static,
{
  fn clear(&self) {
    AsyncTimedCache::clear(self)
  }
  fn len(&self) -> usize {
    AsyncTimedCache::len(self)
  }
  fn keys(&self) -> Vec<ResourceKey> {
    AsyncTimedCache::keys(self)
  }
  fn metrics(&self) -> MetricsSnapshot {
    AsyncTimedCache::metrics(self)
  }
  fn time_to_live(&self) -> Duration {
    AsyncTimedCache::time_to_live(self)
  }
}

impl<V, E> CacheControl for TimedCache<ResourceKey, V, E>
where
  V: Send + Sync + 'static,
  E: fmt::Display + 'static,
{
  fn clear(&self) {
    TimedCache::clear(self)
  }
  fn len(&self) -> usize {
    TimedCache::len(self)
  }
  fn keys(&self) -> Vec<ResourceKey> {
    TimedCache::keys(self)
  }
  fn metrics(&self) -> MetricsSnapshot {
    TimedCache::metrics(self)
  }
  fn time_to_live(&self) -> Duration {
    TimedCache::time_to_live(self)
  }
}

/// Builds and tracks one cache per `ResourceKind`.
pub struct CacheRegistry {
  config: CacheConfig,
  clock: Arc<dyn Clock>,
  caches: RwLock<BTreeMap<ResourceKind, Arc<dyn CacheControl>>>,
}

impl fmt::Debug for CacheRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheRegistry")
      .field("config", &self.config)
      .field("registered", &self.registered())
      .finish_non_exhaustive()
  }
}

impl CacheRegistry {
  pub fn new(config: CacheConfig) -> Self {
    Self::with_clock(config, Arc::new(SystemClock))
  }

  /// Creates a registry whose caches all read time from `clock`.
  pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
    Self {
      config,
      clock,
      caches: RwLock::new(BTreeMap::new()),
    }
  }

  pub fn config(&self) -> &CacheConfig {
    &self.config
  }

  fn builder<V, E>(&self, kind: ResourceKind) -> CacheBuilder<ResourceKey, V, E> {
    CacheBuilder::new()
      .time_to_live(self.config.ttl(kind))
      .disabled(self.config.disable_api_call_cache)
      .clock(self.clock.clone())
  }

  fn insert(&self, kind: ResourceKind, cache: Arc<dyn CacheControl>) -> Result<(), RegistryError> {
    let mut caches = self.caches.write();
    if caches.contains_key(&kind) {
      return Err(RegistryError::AlreadyRegistered(kind));
    }
    info!(
      kind = %kind,
      ttl_secs = cache.time_to_live().as_secs(),
      disabled = self.config.disable_api_call_cache,
      "registered resource cache"
    );
    caches.insert(kind, cache);
    Ok(())
  }

  /// Builds the async cache for `kind` with its configured TTL and returns
  /// the handle. Each kind may be registered once.
  pub fn register<V, E, F, Fut>(
    &self,
    kind: ResourceKind,
    getter: F,
  ) -> Result<AsyncTimedCache<ResourceKey, V, E>, RegistryError>
  where
    V: Send + Sync + 'static,
    E: fmt::Display + 'static,
    F: Fn(ResourceKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<V>, E>> + Send + 'static,
  {
    let cache = self
      .builder(kind)
      .async_getter(getter)
      .build_async()
      .map_err(|source| RegistryError::Build { kind, source })?;
    self.insert(kind, Arc::new(cache.clone()))?;
    Ok(cache)
  }

  /// Blocking counterpart of `register`.
  pub fn register_blocking<V, E, F>(
    &self,
    kind: ResourceKind,
    getter: F,
  ) -> Result<TimedCache<ResourceKey, V, E>, RegistryError>
  where
    V: Send + Sync + 'static,
    E: fmt::Display + 'static,
    F: Fn(&ResourceKey) -> Result<Option<V>, E> + Send + Sync + 'static,
  {
    let cache = self
      .builder(kind)
      .getter(getter)
      .build()
      .map_err(|source| RegistryError::Build { kind, source })?;
    self.insert(kind, Arc::new(cache.clone()))?;
    Ok(cache)
  }

  /// Drops every cached entry of every registered cache. Loads in flight
  /// finish but their results are not stored.
  pub fn refresh_caches(&self) {
    let caches = self.caches.read();
    for cache in caches.values() {
      cache.clear();
    }
    info!(caches = caches.len(), "refreshed all resource caches");
  }

  pub fn registered(&self) -> Vec<ResourceKind> {
    self.caches.read().keys().copied().collect()
  }

  /// Keys currently held by the cache for `kind`, fresh or stale. Empty if
  /// nothing is registered for `kind`.
  pub fn cached_keys(&self, kind: ResourceKind) -> Vec<ResourceKey> {
    self
      .caches
      .read()
      .get(&kind)
      .map(|cache| cache.keys())
      .unwrap_or_default()
  }

  /// Number of entries across all registered caches.
  pub fn total_entries(&self) -> usize {
    self.caches.read().values().map(|cache| cache.len()).sum()
  }

  pub fn metrics(&self) -> BTreeMap<ResourceKind, MetricsSnapshot> {
    self
      .caches
      .read()
      .iter()
      .map(|(kind, cache)| (*kind, cache.metrics()))
      .collect()
  }
}
