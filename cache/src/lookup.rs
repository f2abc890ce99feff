//! Read helpers for consumers that treat "getter found nothing" as a reason
//! to invalidate and try once more before giving up.
//!
//! A resource created moments ago may be missing from a listing cached
//! earlier. Rather than wait out the TTL, these helpers drop the entry,
//! read again, and only then report the resource as not found.

use crate::handles::{AsyncTimedCache, TimedCache};
use crate::ReadType;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LookupError<E> {
  /// The resource was absent even after a refresh.
  #[error("resource {0} not found")]
  NotFound(String),

  /// The getter failed; retry policy is the caller's.
  #[error("upstream lookup failed: {0}")]
  Upstream(#[source] E),
}

impl<E> LookupError<E> {
  pub fn is_not_found(&self) -> bool {
    matches!(self, LookupError::NotFound(_))
  }
}

/// Reads `key` and applies `select` to the cached value. If the value is
/// missing or `select` finds nothing in it, the entry is deleted and read
/// again with `ReadType::Default` before reporting `NotFound`.
///
/// `select` suits caches whose single entry holds a whole listing, e.g. all
/// scale sets of a resource group keyed by the group.
pub async fn find_or_refresh<K, V, E, H, T, F>(
  cache: &AsyncTimedCache<K, V, E, H>,
  key: &K,
  read_type: ReadType,
  what: &str,
  select: F,
) -> Result<T, LookupError<E>>
where
  K: Eq + Hash + Clone + fmt::Debug,
  E: fmt::Display,
  H: BuildHasher + Clone,
  F: Fn(&Arc<V>) -> Option<T>,
{
  let first = cache.get(key, read_type).await.map_err(LookupError::Upstream)?;
  if let Some(found) = first.as_ref().and_then(&select) {
    return Ok(found);
  }

  debug!(key = ?key, what, "not found in cached value, refreshing the cache");
  cache.delete(key);
  let second = cache
    .get(key, ReadType::Default)
    .await
    .map_err(LookupError::Upstream)?;
  second.as_ref().and_then(&select).ok_or_else(|| {
    warn!(key = ?key, what, "unable to find resource after refresh");
    LookupError::NotFound(what.to_string())
  })
}

/// `find_or_refresh` for caches holding one resource per key.
pub async fn lookup_or_refresh<K, V, E, H>(
  cache: &AsyncTimedCache<K, V, E, H>,
  key: &K,
  read_type: ReadType,
) -> Result<Arc<V>, LookupError<E>>
where
  K: Eq + Hash + Clone + fmt::Debug + fmt::Display,
  E: fmt::Display,
  H: BuildHasher + Clone,
{
  let what = key.to_string();
  find_or_refresh(cache, key, read_type, &what, |value| Some(value.clone())).await
}

/// Blocking counterpart of `find_or_refresh`.
pub fn find_or_refresh_blocking<K, V, E, H, T, F>(
  cache: &TimedCache<K, V, E, H>,
  key: &K,
  read_type: ReadType,
  what: &str,
  select: F,
) -> Result<T, LookupError<E>>
where
  K: Eq + Hash + Clone + fmt::Debug,
  E: fmt::Display,
  H: BuildHasher + Clone,
  F: Fn(&Arc<V>) -> Option<T>,
{
  let first = cache.get(key, read_type).map_err(LookupError::Upstream)?;
  if let Some(found) = first.as_ref().and_then(&select) {
    return Ok(found);
  }

  debug!(key = ?key, what, "not found in cached value, refreshing the cache");
  cache.delete(key);
  let second = cache
    .get(key, ReadType::Default)
    .map_err(LookupError::Upstream)?;
  second.as_ref().and_then(&select).ok_or_else(|| {
    warn!(key = ?key, what, "unable to find resource after refresh");
    LookupError::NotFound(what.to_string())
  })
}

/// Blocking counterpart of `lookup_or_refresh`.
pub fn lookup_or_refresh_blocking<K, V, E, H>(
  cache: &TimedCache<K, V, E, H>,
  key: &K,
  read_type: ReadType,
) -> Result<Arc<V>, LookupError<E>>
where
  K: Eq + Hash + Clone + fmt::Debug + fmt::Display,
  E: fmt::Display,
  H: BuildHasher + Clone,
{
  let what = key.to_string();
  find_or_refresh_blocking(cache, key, read_type, &what, |value| Some(value.clone()))
}
