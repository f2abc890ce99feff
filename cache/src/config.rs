//! Cache TTL configuration, loadable from YAML.
//!
//! Every field is optional. A TTL of `0` (or an absent field) selects the
//! default for that resource kind. Field names are snake_case; the
//! camelCase names of the cloud-provider config file are accepted as
//! aliases so an existing file can be read as-is.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kinds of resource-manager objects the provider caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
  VirtualMachine,
  VirtualMachineScaleSet,
  VmssVirtualMachines,
  LoadBalancer,
  PublicIp,
  RouteTable,
  SecurityGroup,
  PrivateLinkService,
}

impl ResourceKind {
  pub const ALL: [ResourceKind; 8] = [
    ResourceKind::VirtualMachine,
    ResourceKind::VirtualMachineScaleSet,
    ResourceKind::VmssVirtualMachines,
    ResourceKind::LoadBalancer,
    ResourceKind::PublicIp,
    ResourceKind::RouteTable,
    ResourceKind::SecurityGroup,
    ResourceKind::PrivateLinkService,
  ];

  /// The TTL used when the configuration leaves this kind unset.
  pub fn default_ttl(self) -> Duration {
    let secs = match self {
      ResourceKind::VirtualMachine => 60,
      ResourceKind::VirtualMachineScaleSet | ResourceKind::VmssVirtualMachines => 600,
      ResourceKind::LoadBalancer
      | ResourceKind::PublicIp
      | ResourceKind::RouteTable
      | ResourceKind::SecurityGroup
      | ResourceKind::PrivateLinkService => 120,
    };
    Duration::from_secs(secs)
  }
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ResourceKind::VirtualMachine => "virtual_machine",
      ResourceKind::VirtualMachineScaleSet => "virtual_machine_scale_set",
      ResourceKind::VmssVirtualMachines => "vmss_virtual_machines",
      ResourceKind::LoadBalancer => "load_balancer",
      ResourceKind::PublicIp => "public_ip",
      ResourceKind::RouteTable => "route_table",
      ResourceKind::SecurityGroup => "security_group",
      ResourceKind::PrivateLinkService => "private_link_service",
    };
    f.write_str(name)
  }
}

/// Errors raised while loading a `CacheConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Failed to read cache configuration file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to parse cache configuration: {0}")]
  Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  #[serde(alias = "vmCacheTTLInSeconds")]
  pub vm_cache_ttl_in_seconds: u64,
  #[serde(alias = "vmssCacheTTLInSeconds")]
  pub vmss_cache_ttl_in_seconds: u64,
  #[serde(alias = "vmssVirtualMachinesCacheTTLInSeconds")]
  pub vmss_virtual_machines_cache_ttl_in_seconds: u64,
  #[serde(alias = "loadBalancerCacheTTLInSeconds")]
  pub load_balancer_cache_ttl_in_seconds: u64,
  #[serde(alias = "publicIPCacheTTLInSeconds")]
  pub public_ip_cache_ttl_in_seconds: u64,
  #[serde(alias = "routeTableCacheTTLInSeconds")]
  pub route_table_cache_ttl_in_seconds: u64,
  #[serde(alias = "nsgCacheTTLInSeconds")]
  pub nsg_cache_ttl_in_seconds: u64,
  #[serde(alias = "plsCacheTTLInSeconds")]
  pub pls_cache_ttl_in_seconds: u64,
  /// Turns every cache into a pass-through to the getter.
  #[serde(alias = "disableAPICallCache")]
  pub disable_api_call_cache: bool,
}

impl CacheConfig {
  pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
    // An empty document deserializes to unit, not to a map.
    if yaml.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_yaml_str(&raw)
  }

  /// The effective TTL for `kind`.
  pub fn ttl(&self, kind: ResourceKind) -> Duration {
    let secs = match kind {
      ResourceKind::VirtualMachine => self.vm_cache_ttl_in_seconds,
      ResourceKind::VirtualMachineScaleSet => self.vmss_cache_ttl_in_seconds,
      ResourceKind::VmssVirtualMachines => self.vmss_virtual_machines_cache_ttl_in_seconds,
      ResourceKind::LoadBalancer => self.load_balancer_cache_ttl_in_seconds,
      ResourceKind::PublicIp => self.public_ip_cache_ttl_in_seconds,
      ResourceKind::RouteTable => self.route_table_cache_ttl_in_seconds,
      ResourceKind::SecurityGroup => self.nsg_cache_ttl_in_seconds,
      ResourceKind::PrivateLinkService => self.pls_cache_ttl_in_seconds,
    };
    if secs == 0 {
      kind.default_ttl()
    } else {
      Duration::from_secs(secs)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::io::Write;

  #[test]
  fn unset_fields_fall_back_to_defaults() {
    let config = CacheConfig::from_yaml_str("").unwrap();
    assert_eq!(config, CacheConfig::default());
    for kind in ResourceKind::ALL {
      assert_eq!(config.ttl(kind), kind.default_ttl());
    }
    assert_eq!(config.ttl(ResourceKind::VirtualMachine), Duration::from_secs(60));
    assert_eq!(config.ttl(ResourceKind::VmssVirtualMachines), Duration::from_secs(600));
  }

  #[test]
  fn reads_snake_case_and_provider_names() {
    let yaml = "\
vm_cache_ttl_in_seconds: 30
loadBalancerCacheTTLInSeconds: 45
disableAPICallCache: true
";
    let config = CacheConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(
      config,
      CacheConfig {
        vm_cache_ttl_in_seconds: 30,
        load_balancer_cache_ttl_in_seconds: 45,
        disable_api_call_cache: true,
        ..CacheConfig::default()
      }
    );
    assert_eq!(config.ttl(ResourceKind::VirtualMachine), Duration::from_secs(30));
    assert_eq!(config.ttl(ResourceKind::LoadBalancer), Duration::from_secs(45));
    assert_eq!(config.ttl(ResourceKind::PublicIp), Duration::from_secs(120));
  }

  #[test]
  fn zero_means_default() {
    let config = CacheConfig::from_yaml_str("vmss_cache_ttl_in_seconds: 0").unwrap();
    assert_eq!(config.ttl(ResourceKind::VirtualMachineScaleSet), Duration::from_secs(600));
  }

  #[test]
  fn malformed_yaml_is_a_parse_error() {
    let err = CacheConfig::from_yaml_str("vm_cache_ttl_in_seconds: soon").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
  }

  #[test]
  fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "route_table_cache_ttl_in_seconds: 5").unwrap();
    let config = CacheConfig::from_file(file.path()).unwrap();
    assert_eq!(config.ttl(ResourceKind::RouteTable), Duration::from_secs(5));
  }

  #[test]
  fn missing_file_reports_path() {
    let err = CacheConfig::from_file("/nonexistent/azcache.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    assert!(err.to_string().contains("/nonexistent/azcache.yaml"));
  }
}
