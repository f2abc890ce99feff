use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Identifies one resource by resource group and name.
///
/// Resource-manager names compare case-insensitively, so both parts are
/// stored lower-cased. This single composite key replaces nested
/// group → name maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
  resource_group: String,
  name: String,
}

impl ResourceKey {
  /// Builds a key without validation. Neither part may be empty or contain
  /// `/`, or the `Display` form will not parse back; use `try_new` for
  /// untrusted input.
  pub fn new(resource_group: impl AsRef<str>, name: impl AsRef<str>) -> Self {
    Self {
      resource_group: resource_group.as_ref().to_ascii_lowercase(),
      name: name.as_ref().to_ascii_lowercase(),
    }
  }

  /// Builds a key, rejecting parts that are empty or contain `/`.
  pub fn try_new(
    resource_group: impl AsRef<str>,
    name: impl AsRef<str>,
  ) -> Result<Self, ParseResourceKeyError> {
    let (group, name) = (resource_group.as_ref(), name.as_ref());
    let valid = |part: &str| !part.is_empty() && !part.contains('/');
    if valid(group) && valid(name) {
      Ok(Self::new(group, name))
    } else {
      Err(ParseResourceKeyError(format!("{group}/{name}")))
    }
  }

  pub fn resource_group(&self) -> &str {
    &self.resource_group
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.resource_group, self.name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid resource key {0:?}: expected `<resource group>/<name>`")]
pub struct ParseResourceKeyError(String);

impl FromStr for ResourceKey {
  type Err = ParseResourceKeyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.split_once('/') {
      Some((group, name)) => Self::try_new(group, name),
      None => Err(ParseResourceKeyError(s.to_string())),
    }
  }
}
