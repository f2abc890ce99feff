mod common;

use azcache::{CacheBuilder, Clock, ManualClock, ReadType, TimedCache};
use common::{build_sync_cache, key, FakeUpstream, UpstreamError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_sync_loader_thundering_herd() {
  let upstream = FakeUpstream::slow(Duration::from_millis(100));
  let clock = Arc::new(ManualClock::new());
  let cache = build_sync_cache(&upstream, &clock, Duration::from_secs(60));
  let num_threads = 20;

  let barrier = Arc::new(Barrier::new(num_threads));
  let mut handles = vec![];

  for _ in 0..num_threads {
    let cache_clone = cache.clone();
    let barrier_clone = barrier.clone();
    handles.push(thread::spawn(move || {
      // All threads request the same missing key at once
      barrier_clone.wait();
      cache_clone.get(&key("vmss-0"), ReadType::Default).unwrap()
    }));
  }

  let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

  assert_eq!(upstream.calls(), 1, "Getter should be called exactly once");
  let first = results[0].clone().unwrap();
  for value in &results {
    // Every caller shares the very same allocation.
    assert!(Arc::ptr_eq(&first, value.as_ref().unwrap()));
  }
  assert_eq!(*first, "vmss-0#1");

  let metrics = cache.metrics();
  assert_eq!(metrics.loads, 1);
  assert_eq!(metrics.misses + metrics.hits, num_threads as u64);
}

#[test]
fn test_different_keys_load_in_parallel() {
  let in_flight = Arc::new(AtomicUsize::new(0));
  let peak = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::new()
    .getter({
      let in_flight = in_flight.clone();
      let peak = peak.clone();
      move |k: &u32| {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok::<_, UpstreamError>(Some(*k))
      }
    })
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(4));
  let handles: Vec<_> = (0..4u32)
    .map(|k| {
      let cache = cache.clone();
      let barrier = barrier.clone();
      thread::spawn(move || {
        barrier.wait();
        cache.get(&k, ReadType::Default).unwrap()
      })
    })
    .collect();
  for h in handles {
    h.join().unwrap();
  }

  assert!(
    peak.load(Ordering::SeqCst) > 1,
    "Loads for distinct keys should not be serialized"
  );
}

#[test]
fn test_waiters_retry_after_leader_error() {
  let calls = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::new()
    .getter({
      let calls = calls.clone();
      move |k: &u32| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        if n == 0 {
          Err(UpstreamError("first call fails".into()))
        } else {
          Ok(Some(*k * 10))
        }
      }
    })
    .build()
    .unwrap();

  let barrier = Arc::new(Barrier::new(2));
  let leader = {
    let cache = cache.clone();
    let barrier = barrier.clone();
    thread::spawn(move || {
      barrier.wait();
      cache.get(&7, ReadType::Default)
    })
  };
  let waiter = {
    let cache = cache.clone();
    let barrier = barrier.clone();
    thread::spawn(move || {
      barrier.wait();
      // Let the other thread become the leader.
      thread::sleep(Duration::from_millis(30));
      cache.get(&7, ReadType::Default)
    })
  };

  let leader = leader.join().unwrap();
  let waiter = waiter.join().unwrap();

  assert_eq!(leader.unwrap_err().0, "first call fails");
  assert_eq!(waiter.unwrap().as_deref(), Some(&70));
  assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_force_refresh_does_not_reuse_in_flight_load() {
  let upstream = FakeUpstream::slow(Duration::from_millis(150));
  let clock = Arc::new(ManualClock::new());
  let cache = build_sync_cache(&upstream, &clock, Duration::from_secs(60));

  let first = {
    let cache = cache.clone();
    thread::spawn(move || cache.get(&key("vm"), ReadType::Default).unwrap())
  };
  thread::sleep(Duration::from_millis(30));
  let forced = cache.get(&key("vm"), ReadType::ForceRefresh).unwrap();

  assert_eq!(first.join().unwrap().as_deref().map(String::as_str), Some("vm#1"));
  assert_eq!(forced.as_deref().map(String::as_str), Some("vm#2"));
  assert_eq!(upstream.calls(), 2);
  let cached = cache.get(&key("vm"), ReadType::Default).unwrap();
  assert_eq!(cached.as_deref().map(String::as_str), Some("vm#2"));
}

#[test]
fn test_delete_during_load_discards_result() {
  let upstream = FakeUpstream::slow(Duration::from_millis(150));
  let clock = Arc::new(ManualClock::new());
  let cache = build_sync_cache(&upstream, &clock, Duration::from_secs(60));

  let loader = {
    let cache = cache.clone();
    thread::spawn(move || cache.get(&key("lb"), ReadType::Default).unwrap())
  };
  thread::sleep(Duration::from_millis(30));
  cache.delete(&key("lb"));

  // The caller still gets what it asked for...
  assert_eq!(loader.join().unwrap().as_deref().map(String::as_str), Some("lb#1"));
  // ...but the invalidated result never reaches the store.
  assert!(cache.is_empty());
  let value = cache.get(&key("lb"), ReadType::Default).unwrap();
  assert_eq!(value.as_deref().map(String::as_str), Some("lb#2"));
}

#[test]
fn test_update_during_load_wins() {
  let upstream = FakeUpstream::slow(Duration::from_millis(150));
  let clock = Arc::new(ManualClock::new());
  let cache = build_sync_cache(&upstream, &clock, Duration::from_secs(60));

  let loader = {
    let cache = cache.clone();
    thread::spawn(move || cache.get(&key("pip"), ReadType::Default).unwrap())
  };
  thread::sleep(Duration::from_millis(30));
  cache.update(key("pip"), "written".to_string());
  loader.join().unwrap();

  let value = cache.get(&key("pip"), ReadType::Unsafe).unwrap();
  assert_eq!(value.as_deref().map(String::as_str), Some("written"));
  assert_eq!(upstream.calls(), 1);
}

// Stalls every reading taken on the thread named "leader". On an empty cache
// the leader's only reading happens while it stores the getter's result.
struct StallingClock {
  inner: ManualClock,
  stall: Duration,
}

impl Clock for StallingClock {
  fn now(&self) -> Duration {
    if thread::current().name() == Some("leader") {
      thread::sleep(self.stall);
    }
    self.inner.now()
  }
}

fn build_stalling_cache(upstream: &Arc<FakeUpstream>) -> TimedCache<String, String, UpstreamError> {
  let upstream = upstream.clone();
  CacheBuilder::new()
    .clock(Arc::new(StallingClock {
      inner: ManualClock::new(),
      stall: Duration::from_millis(200),
    }))
    .getter(move |k: &String| upstream.fetch(k))
    .build()
    .unwrap()
}

fn spawn_leader(
  cache: &TimedCache<String, String, UpstreamError>,
  name: &str,
) -> thread::JoinHandle<Option<Arc<String>>> {
  let cache = cache.clone();
  let name = key(name);
  thread::Builder::new()
    .name("leader".into())
    .spawn(move || cache.get(&name, ReadType::Default).unwrap())
    .unwrap()
}

#[test]
fn test_delete_while_result_is_being_stored() {
  let upstream = FakeUpstream::new();
  let cache = build_stalling_cache(&upstream);

  let leader = spawn_leader(&cache, "vm");
  // The getter has returned; the leader is about to write its entry.
  thread::sleep(Duration::from_millis(50));
  assert_eq!(upstream.calls(), 1);
  cache.delete(&key("vm"));

  assert_eq!(leader.join().unwrap().as_deref().map(String::as_str), Some("vm#1"));
  assert!(cache.is_empty(), "An invalidated load must not be stored");
}

#[test]
fn test_update_while_result_is_being_stored() {
  let upstream = FakeUpstream::new();
  let cache = build_stalling_cache(&upstream);

  let leader = spawn_leader(&cache, "vm");
  thread::sleep(Duration::from_millis(50));
  cache.update(key("vm"), "written-by-update".to_string());
  leader.join().unwrap();

  let value = cache.get(&key("vm"), ReadType::Unsafe).unwrap();
  assert_eq!(value.as_deref().map(String::as_str), Some("written-by-update"));
  assert_eq!(upstream.calls(), 1);
}

#[test]
fn test_clear_while_result_is_being_stored() {
  let upstream = FakeUpstream::new();
  let cache = build_stalling_cache(&upstream);

  let leader = spawn_leader(&cache, "vm");
  thread::sleep(Duration::from_millis(50));
  cache.clear();
  leader.join().unwrap();

  assert!(cache.is_empty());
}
