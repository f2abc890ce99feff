use std::fmt;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// Neither `getter` nor `async_getter` was set.
  MissingGetter,
  /// A synchronous getter was given to `build_async`, or an asynchronous
  /// getter to `build`.
  GetterMismatch,
  /// The time-to-live was zero on a cache that is not disabled. Every read
  /// would miss; use `disabled(true)` for a pass-through cache instead.
  ZeroTimeToLive,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::MissingGetter => write!(f, "a getter is required to build the cache"),
      BuildError::GetterMismatch => write!(
        f,
        "getter kind does not match the handle (sync getter for `build`, async getter for `build_async`)"
      ),
      BuildError::ZeroTimeToLive => write!(
        f,
        "time-to-live cannot be zero unless the cache is disabled"
      ),
    }
  }
}

impl std::error::Error for BuildError {}
