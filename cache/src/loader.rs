use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};

/// Represents a waiter in the queue for a `LoadFuture`.
pub(crate) enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

/// The internal state of a value being loaded.
pub(crate) enum State<V> {
  Loading,
  Loaded(Option<Arc<V>>),
  /// The getter returned an error or the leader was dropped mid-load.
  Failed,
}

/// What a waiter observes once the load it joined has settled.
pub(crate) enum LoadOutcome<V> {
  Loaded(Option<Arc<V>>),
  Failed,
}

/// The internal, mutex-protected core of the LoadFuture.
pub(crate) struct Inner<V> {
  pub(crate) state: State<V>,
  pub(crate) waiters: VecDeque<Waiter>,
}

/// A single in-flight getter call for one key.
///
/// The leader that created it runs the getter; every other caller for the
/// same key waits on it, either by parking its thread or by awaiting it.
pub(crate) struct LoadFuture<V> {
  inner: Mutex<Inner<V>>,
  /// Set when the key is deleted or overwritten while the load runs. A
  /// detached load still hands its result to its waiters but must not
  /// write it into the store.
  detached: AtomicBool,
}

impl<V> LoadFuture<V> {
  /// Creates a new `LoadFuture` in the "Loading" state.
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: State::Loading,
        waiters: VecDeque::new(),
      }),
      detached: AtomicBool::new(false),
    }
  }

  pub(crate) fn detach(&self) {
    self.detached.store(true, Ordering::Release);
  }

  pub(crate) fn is_detached(&self) -> bool {
    self.detached.load(Ordering::Acquire)
  }

  /// Settles the future, waking all waiters. Only the first call has an effect.
  pub(crate) fn settle(&self, outcome: LoadOutcome<V>) {
    let mut inner = self.inner.lock();
    if !matches!(inner.state, State::Loading) {
      return;
    }
    inner.state = match outcome {
      LoadOutcome::Loaded(value) => State::Loaded(value),
      LoadOutcome::Failed => State::Failed,
    };
    for waiter in inner.waiters.drain(..) {
      waiter.wake();
    }
  }

  /// Blocks the current thread until the load settles.
  pub(crate) fn wait(&self) -> LoadOutcome<V> {
    let mut inner = self.inner.lock();
    loop {
      match &inner.state {
        State::Loaded(value) => return LoadOutcome::Loaded(value.clone()),
        State::Failed => return LoadOutcome::Failed,
        State::Loading => {
          inner.waiters.push_back(Waiter::Sync(thread::current()));
          drop(inner); // Unlock before parking.
          thread::park();
          inner = self.inner.lock();
        }
      }
    }
  }
}

impl<V> Future for &LoadFuture<V> {
  type Output = LoadOutcome<V>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut inner = self.inner.lock();
    match &inner.state {
      State::Loaded(value) => Poll::Ready(LoadOutcome::Loaded(value.clone())),
      State::Failed => Poll::Ready(LoadOutcome::Failed),
      State::Loading => {
        let already_queued = inner.waiters.iter().any(|w| match w {
          Waiter::Async(waker) => waker.will_wake(cx.waker()),
          Waiter::Sync(_) => false,
        });
        if !already_queued {
          inner.waiters.push_back(Waiter::Async(cx.waker().clone()));
        }
        Poll::Pending
      }
    }
  }
}

pub(crate) type SyncGetterFn<K, V, E> = dyn Fn(&K) -> Result<Option<V>, E> + Send + Sync;
pub(crate) type AsyncGetterFn<K, V, E> =
  dyn Fn(K) -> BoxFuture<'static, Result<Option<V>, E>> + Send + Sync;

/// Holds either a synchronous or an asynchronous getter.
///
/// The getter returns `Ok(None)` when the upstream has nothing for the key;
/// that answer is cached like any other value.
pub(crate) enum Getter<K, V, E> {
  Sync(Arc<SyncGetterFn<K, V, E>>),
  Async(Arc<AsyncGetterFn<K, V, E>>),
}

impl<K, V, E> Clone for Getter<K, V, E> {
  fn clone(&self) -> Self {
    match self {
      Getter::Sync(f) => Getter::Sync(f.clone()),
      Getter::Async(f) => Getter::Async(f.clone()),
    }
  }
}
