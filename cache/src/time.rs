use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};

// The single, static reference point for all system-clock readings.
// It is initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// A source of monotonic time for freshness checks.
///
/// Readings are durations since an arbitrary, fixed epoch. Only differences
/// between two readings of the same clock are meaningful.
pub trait Clock: Send + Sync + 'static {
  /// Returns the time elapsed since this clock's epoch.
  fn now(&self) -> Duration;
}

/// The default clock, backed by `Instant::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  #[inline]
  fn now(&self) -> Duration {
    Instant::now().saturating_duration_since(*CACHE_EPOCH)
  }
}

/// A clock that only moves when told to.
///
/// Useful to drive TTL expiry deterministically in tests.
#[derive(Default)]
pub struct ManualClock {
  now: Mutex<Duration>,
}

impl ManualClock {
  /// Creates a clock that starts at zero.
  pub fn new() -> Self {
    Self::default()
  }

  /// Moves the clock forward by `by`.
  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock();
    *now += by;
  }

  /// Sets the clock to an absolute reading. Moving backwards is allowed;
  /// entries fetched "in the future" are then treated as age zero.
  pub fn set(&self, to: Duration) {
    *self.now.lock() = to;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Duration {
    *self.now.lock()
  }
}

impl fmt::Debug for ManualClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManualClock").field("now", &self.now()).finish()
  }
}

/// Converts a clock reading into the nanosecond form stored in entries.
#[inline]
pub(crate) fn as_nanos(d: Duration) -> u64 {
  d.as_nanos().min(u64::MAX as u128) as u64
}
