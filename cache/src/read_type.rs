use std::fmt;

/// Controls how a `get` treats an entry that is already cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadType {
  /// Returns the cached value if it is younger than the TTL, otherwise
  /// calls the getter and stores the result.
  #[default]
  Default,
  /// Returns the cached value even if it has outlived the TTL. The getter
  /// is only called when the key has no entry at all.
  Unsafe,
  /// Always calls the getter and overwrites the cached value.
  ForceRefresh,
}

impl fmt::Display for ReadType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReadType::Default => write!(f, "default"),
      ReadType::Unsafe => write!(f, "unsafe"),
      ReadType::ForceRefresh => write!(f, "force-refresh"),
    }
  }
}
