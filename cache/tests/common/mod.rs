#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use azcache::{AsyncTimedCache, CacheBuilder, ManualClock, TimedCache};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct UpstreamError(pub String);

// A stand-in for a rate-limited resource API. Every successful fetch of
// `key` returns "<key>#<n>", where n counts all calls so far, so a test can
// tell which fetch produced a value.
#[derive(Default)]
pub struct FakeUpstream {
  calls: AtomicUsize,
  failing: AtomicBool,
  absent: AtomicBool,
  delay: Option<Duration>,
}

impl FakeUpstream {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn slow(delay: Duration) -> Arc<Self> {
    Arc::new(Self {
      delay: Some(delay),
      ..Self::default()
    })
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn set_absent(&self, absent: bool) {
    self.absent.store(absent, Ordering::SeqCst);
  }

  fn respond(&self, key: &str, n: usize) -> Result<Option<String>, UpstreamError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(UpstreamError(format!("throttled while fetching {key}")));
    }
    if self.absent.load(Ordering::SeqCst) {
      return Ok(None);
    }
    Ok(Some(format!("{key}#{n}")))
  }

  pub fn fetch(&self, key: &str) -> Result<Option<String>, UpstreamError> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(delay) = self.delay {
      std::thread::sleep(delay);
    }
    self.respond(key, n)
  }

  pub async fn fetch_async(&self, key: &str) -> Result<Option<String>, UpstreamError> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    self.respond(key, n)
  }
}

pub fn build_sync_cache(
  upstream: &Arc<FakeUpstream>,
  clock: &Arc<ManualClock>,
  ttl: Duration,
) -> TimedCache<String, String, UpstreamError> {
  let upstream = upstream.clone();
  CacheBuilder::new()
    .time_to_live(ttl)
    .shards(4)
    .clock(clock.clone())
    .getter(move |key: &String| upstream.fetch(key))
    .build()
    .unwrap()
}

pub fn build_async_cache(
  upstream: &Arc<FakeUpstream>,
  clock: &Arc<ManualClock>,
  ttl: Duration,
) -> AsyncTimedCache<String, String, UpstreamError> {
  let upstream = upstream.clone();
  CacheBuilder::new()
    .time_to_live(ttl)
    .shards(4)
    .clock(clock.clone())
    .async_getter(move |key: String| {
      let upstream = upstream.clone();
      async move { upstream.fetch_async(&key).await }
    })
    .build_async()
    .unwrap()
}

pub fn key(s: &str) -> String {
  s.to_string()
}
