//! Role decision cache.
//!
//! Decisions are pure functions of membership, role assignment and OU structure, so an entry
//! stays valid until one of those changes. Writers of that state report the change as a
//! [`CacheEvent`]; [`ProcessRoleCache`] turns events into epoch bumps and drops stale entries
//! lazily on read.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::epochs::{EpochStamp, Epochs};
use super::role::Role;
use crate::identity::PrincipalId;

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleScope {
    /// Role check against the role's own OU (`None` = any OU)
    OrgUnit(Option<String>),
    /// Role check for a single resource path
    Resource(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleCacheKey {
    pub principal: PrincipalId,
    pub group_name: String,
    pub scope: RoleScope,
}

impl RoleCacheKey {
    pub fn for_role(principal: PrincipalId, role: &Role) -> Self {
        Self { principal, group_name: role.kind().group_name().to_string(), scope: RoleScope::OrgUnit(role.ou_fqn().map(str::to_string)) }
    }

    pub fn for_resource(principal: PrincipalId, role: &Role, root_path: &str) -> Self {
        Self { principal, group_name: role.kind().group_name().to_string(), scope: RoleScope::Resource(root_path.to_string()) }
    }
}

/// State changes that can alter role decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Group membership changed; `None` when the affected principals are unknown
    MembershipChanged { principal: Option<PrincipalId> },
    RoleAssignmentChanged { principal: Option<PrincipalId> },
    /// An OU or the resources it claims changed
    OrgUnitChanged { ou_fqn: String },
    Flush,
}

pub trait RoleCache: Send + Sync {
    fn get(&self, key: &RoleCacheKey) -> Option<bool>;
    /// Epochs a decision is stored under. Take it before reading the memberships the decision
    /// is computed from.
    fn stamp(&self, principal: PrincipalId) -> EpochStamp;
    /// Store `value` under `stamp`; an invalidation after `stamp` was taken makes it a no-op.
    fn put(&self, key: RoleCacheKey, value: bool, stamp: EpochStamp);
    fn invalidate(&self, event: &CacheEvent);
}

/// Cache that never remembers anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRoleCache;

impl RoleCache for NoopRoleCache {
    fn get(&self, _key: &RoleCacheKey) -> Option<bool> { None }
    fn stamp(&self, _principal: PrincipalId) -> EpochStamp { EpochStamp::default() }
    fn put(&self, _key: RoleCacheKey, _value: bool, _stamp: EpochStamp) {}
    fn invalidate(&self, _event: &CacheEvent) {}
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: bool,
    stamp: EpochStamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded in-process cache shared by every resolver in the process.
#[derive(Debug)]
pub struct ProcessRoleCache {
    entries: RwLock<HashMap<RoleCacheKey, CacheEntry>>,
    epochs: Epochs,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for ProcessRoleCache {
    fn default() -> Self { Self::with_capacity(DEFAULT_MAX_ENTRIES) }
}

impl ProcessRoleCache {
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            epochs: Epochs::new(),
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> RoleCacheStats {
        RoleCacheStats {
            entries: self.entries.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    pub fn max_entries(&self) -> usize { self.max_entries }

    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }

    fn miss(&self) -> Option<bool> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }
}

impl RoleCache for ProcessRoleCache {
    fn get(&self, key: &RoleCacheKey) -> Option<bool> {
        let hit = self.entries.read().get(key).copied();
        let Some(entry) = hit else { return self.miss() };
        if self.epochs.is_current(key.principal, entry.stamp) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            crate::tprintln!("role cache hit: {:?} -> {}", key, entry.value);
            return Some(entry.value);
        }
        self.entries.write().remove(key);
        self.miss()
    }

    fn stamp(&self, principal: PrincipalId) -> EpochStamp { self.epochs.stamp(principal) }

    fn put(&self, key: RoleCacheKey, value: bool, stamp: EpochStamp) {
        if !self.epochs.is_current(key.principal, stamp) {
            debug!(target: "vfsguard::roles", "role cache dropped decision computed before an invalidation: {:?}", key);
            return;
        }
        let mut w = self.entries.write();
        if w.len() >= self.max_entries && !w.contains_key(&key) {
            // Sweep stale entries first, then evict up to 5% of capacity
            let stale: Vec<RoleCacheKey> = w.iter().filter(|(k, v)| !self.epochs.is_current(k.principal, v.stamp)).map(|(k, _)| k.clone()).collect();
            for k in stale { w.remove(&k); }
            if w.len() >= self.max_entries {
                let evict_n = ((self.max_entries as f64) * 0.05) as usize + 1;
                let victims: Vec<RoleCacheKey> = w.keys().take(evict_n).cloned().collect();
                let removed = victims.into_iter().filter(|k| w.remove(k).is_some()).count();
                let total = self.evictions.fetch_add(removed as u64, Ordering::Relaxed) + removed as u64;
                debug!(target: "vfsguard::roles", "role cache evicted {} entries (max={}, evictions={})", removed, self.max_entries, total);
            }
        }
        w.insert(key, CacheEntry { value, stamp });
    }

    fn invalidate(&self, event: &CacheEvent) {
        match event {
            CacheEvent::MembershipChanged { principal: Some(p) } | CacheEvent::RoleAssignmentChanged { principal: Some(p) } => {
                self.epochs.bump_principal(*p);
            }
            CacheEvent::MembershipChanged { principal: None }
            | CacheEvent::RoleAssignmentChanged { principal: None }
            | CacheEvent::OrgUnitChanged { .. } => {
                self.epochs.bump_global();
            }
            CacheEvent::Flush => {
                self.epochs.bump_global();
                self.entries.write().clear();
            }
        }
        debug!(target: "vfsguard::roles", "role cache invalidated: {:?}", event);
    }
}

static GLOBAL_ROLE_CACHE: OnceCell<Arc<ProcessRoleCache>> = OnceCell::new();

/// The process-wide role cache. The first caller decides its capacity; later sizes are ignored.
pub fn global_role_cache_sized(max_entries: usize) -> Arc<ProcessRoleCache> {
    GLOBAL_ROLE_CACHE.get_or_init(|| {
        debug!(target: "vfsguard::roles", "process role cache created (max={})", max_entries);
        Arc::new(ProcessRoleCache::with_capacity(max_entries))
    }).clone()
}

pub fn global_role_cache() -> Arc<ProcessRoleCache> { global_role_cache_sized(DEFAULT_MAX_ENTRIES) }

#[cfg(test)]
mod tests {
    use super::*;

    fn key(p: PrincipalId, role: &Role) -> RoleCacheKey { RoleCacheKey::for_role(p, role) }

    fn store(cache: &dyn RoleCache, k: RoleCacheKey, value: bool) {
        let stamp = cache.stamp(k.principal);
        cache.put(k, value, stamp);
    }

    #[test]
    fn put_then_get() {
        let cache = ProcessRoleCache::with_capacity(16);
        let p = PrincipalId::new();
        assert_eq!(cache.get(&key(p, &Role::DEVELOPER)), None);
        store(&cache, key(p, &Role::DEVELOPER), true);
        assert_eq!(cache.get(&key(p, &Role::DEVELOPER)), Some(true));
        let scoped = Role::DEVELOPER.for_org_unit(Some("town"));
        assert_eq!(cache.get(&key(p, &scoped)), None);
        let s = cache.stats();
        assert_eq!((s.hits, s.misses, s.entries), (1, 2, 1));
    }

    #[test]
    fn resource_scope_is_distinct_from_ou_scope() {
        let p = PrincipalId::new();
        let a = RoleCacheKey::for_resource(p, &Role::VFS_MANAGER, "/town/");
        let b = RoleCacheKey::for_role(p, &Role::VFS_MANAGER.for_org_unit(Some("/town/")));
        assert_ne!(a, b);
    }

    #[test]
    fn membership_change_only_hits_that_principal() {
        let cache = ProcessRoleCache::with_capacity(16);
        let a = PrincipalId::new();
        let b = PrincipalId::new();
        store(&cache, key(a, &Role::EDITOR), true);
        store(&cache, key(b, &Role::EDITOR), false);
        cache.invalidate(&CacheEvent::MembershipChanged { principal: Some(a) });
        assert_eq!(cache.get(&key(a, &Role::EDITOR)), None);
        assert_eq!(cache.get(&key(b, &Role::EDITOR)), Some(false));
        cache.invalidate(&CacheEvent::OrgUnitChanged { ou_fqn: "town/".into() });
        assert_eq!(cache.get(&key(b, &Role::EDITOR)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn decision_older_than_an_invalidation_is_not_stored() {
        let cache = ProcessRoleCache::with_capacity(16);
        let a = PrincipalId::new();
        let before = cache.stamp(a);
        cache.invalidate(&CacheEvent::MembershipChanged { principal: Some(a) });
        cache.put(key(a, &Role::EDITOR), true, before);
        assert_eq!(cache.get(&key(a, &Role::EDITOR)), None);
        assert!(cache.is_empty());

        let before = cache.stamp(a);
        cache.invalidate(&CacheEvent::OrgUnitChanged { ou_fqn: "town/".into() });
        cache.put(key(a, &Role::EDITOR), true, before);
        assert!(cache.is_empty());
    }

    #[test]
    fn flush_clears_everything() {
        let cache = ProcessRoleCache::with_capacity(16);
        let a = PrincipalId::new();
        store(&cache, key(a, &Role::EDITOR), true);
        cache.invalidate(&CacheEvent::Flush);
        assert_eq!(cache.len(), 0);
        store(&cache, key(a, &Role::EDITOR), false);
        assert_eq!(cache.get(&key(a, &Role::EDITOR)), Some(false));
    }

    #[test]
    fn capacity_is_enforced() {
        let cache = ProcessRoleCache::with_capacity(20);
        let p = PrincipalId::new();
        for i in 0..50 {
            store(&cache, RoleCacheKey::for_resource(p, &Role::EDITOR, &format!("/r{}", i)), true);
        }
        assert!(cache.len() <= 20);
        assert!(cache.stats().evictions > 0);
    }

    #[test]
    fn noop_cache_never_hits() {
        let p = PrincipalId::new();
        store(&NoopRoleCache, key(p, &Role::EDITOR), true);
        assert_eq!(NoopRoleCache.get(&key(p, &Role::EDITOR)), None);
    }
}
