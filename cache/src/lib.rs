//! A concurrent, sync/async timed cache for values that are expensive to
//! fetch, such as resource-manager objects behind a rate-limited API.
//!
//! # Features
//! - **Per-key TTL**: Every entry remembers when it was fetched; staleness is
//!   checked lazily on read. Nothing runs in the background.
//! - **Read modes**: `ReadType::Default` refetches stale entries,
//!   `ReadType::Unsafe` tolerates them, `ReadType::ForceRefresh` always calls
//!   the getter.
//! - **Coalesced loads**: Concurrent misses for the same key share a single
//!   getter call, whether callers are threads or async tasks.
//! - **Sync & Async**: `TimedCache` with a blocking getter and
//!   `AsyncTimedCache` with an async one, built from the same `CacheBuilder`.
//! - **Non-Clone Support**: Values are shared as `Arc<V>`; `get_cloned`
//!   hands out an owned copy when `V: Clone`.
//! - **Resource caches**: `ResourceKey`, a YAML-loadable `CacheConfig` and a
//!   `CacheRegistry` that builds one cache per `ResourceKind`.
//!
//! ```
//! use azcache::{CacheBuilder, ReadType};
//! use std::time::Duration;
//!
//! let cache = CacheBuilder::<String, usize, std::io::Error>::new()
//!   .time_to_live(Duration::from_secs(60))
//!   .getter(|key: &String| Ok(Some(key.len())))
//!   .build()
//!   .unwrap();
//!
//! let len = cache.get(&"hello".to_string(), ReadType::Default).unwrap();
//! assert_eq!(len.as_deref(), Some(&5));
//! ```

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod error;
pub mod handles;
pub mod key;
pub mod lookup;
pub mod registry;
pub mod time;

// Internal, crate-only modules
mod entry;
mod loader;
mod metrics;
mod read_type;
mod shared;
mod store;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use config::{CacheConfig, ConfigError, ResourceKind};
pub use entry::StoreEntry;
pub use error::BuildError;
pub use handles::{AsyncTimedCache, TimedCache};
pub use key::{ParseResourceKeyError, ResourceKey};
pub use lookup::{
  find_or_refresh, find_or_refresh_blocking, lookup_or_refresh, lookup_or_refresh_blocking,
  LookupError,
};
pub use metrics::MetricsSnapshot;
pub use read_type::ReadType;
pub use registry::{CacheRegistry, RegistryError};
pub use time::{Clock, ManualClock, SystemClock};
