//! The process-wide role cache takes its capacity from the configuration of the first resolver
//! built without an injected cache. Kept in its own test binary so nothing else initializes it.

use anyhow::Result;
use std::sync::Arc;

use vfsguard::config::EffectiveConfig;
use vfsguard::roles::global_role_cache;
use vfsguard::store::{MemoryPrincipals, MemoryRepository};
use vfsguard::SecurityManager;

#[test]
fn first_resolver_sizes_the_process_cache() -> Result<()> {
    let small = EffectiveConfig::from_json_layers("", r#"{"role_cache_max_entries": 64}"#)?;
    let _first = SecurityManager::new(Arc::new(MemoryRepository::new()), Arc::new(MemoryPrincipals::new()), small);
    assert_eq!(global_role_cache().max_entries(), 64);

    let large = EffectiveConfig::from_json_layers("", r#"{"role_cache_max_entries": 5000}"#)?;
    let _second = SecurityManager::new(Arc::new(MemoryRepository::new()), Arc::new(MemoryPrincipals::new()), large);
    assert_eq!(global_role_cache().max_entries(), 64);
    Ok(())
}
