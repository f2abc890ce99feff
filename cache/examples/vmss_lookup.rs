use azcache::{find_or_refresh, CacheConfig, CacheRegistry, ReadType, ResourceKey, ResourceKind};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("resource manager returned {0}")]
struct ArmError(u16);

// Pretends to list every scale set of a resource group; the second listing
// contains a scale set created in the meantime.
async fn list_scale_sets(calls: Arc<AtomicUsize>, group: ResourceKey) -> Result<Option<BTreeMap<String, u32>>, ArmError> {
  let n = calls.fetch_add(1, Ordering::SeqCst);
  tokio::time::sleep(Duration::from_millis(50)).await;
  let mut sets = BTreeMap::new();
  sets.insert(format!("{}-agents", group.resource_group()), 3);
  if n > 0 {
    sets.insert(format!("{}-gpu", group.resource_group()), 1);
  }
  Ok(Some(sets))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let config = CacheConfig::from_yaml_str("vmssCacheTTLInSeconds: 300")?;
  let registry = CacheRegistry::new(config);

  let calls = Arc::new(AtomicUsize::new(0));
  let vmss = registry.register(ResourceKind::VirtualMachineScaleSet, {
    let calls = calls.clone();
    move |group: ResourceKey| list_scale_sets(calls.clone(), group)
  })?;

  let group = ResourceKey::new("prod", "*");
  let capacity = find_or_refresh(&vmss, &group, ReadType::Unsafe, "prod-agents", |sets| {
    sets.get("prod-agents").copied()
  })
  .await?;
  println!("prod-agents capacity: {capacity}");

  // Not in the cached listing yet; the helper refreshes it once.
  let capacity = find_or_refresh(&vmss, &group, ReadType::Unsafe, "prod-gpu", |sets| {
    sets.get("prod-gpu").copied()
  })
  .await?;
  println!("prod-gpu capacity: {capacity}");

  println!("listing calls: {}", calls.load(Ordering::SeqCst));
  println!("\nCache metrics: {:#?}", registry.metrics());
  Ok(())
}
