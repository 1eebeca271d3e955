//! ACL resolution. The gate asks a [`PermissionHandler`] for the aggregated list of a resource and
//! applies its own rules on top.

use anyhow::Result;

use crate::model::{AccessControlEntry, AccessControlList, AceFlags, Resource};
use crate::paths;
use crate::store::ResourceStore;

pub trait PermissionHandler: Send + Sync {
    /// Aggregated ACL of `resource`, inherited entries included.
    fn resolve_acl(&self, store: &dyn ResourceStore, resource: &Resource) -> Result<AccessControlList>;
}

/// Walks from the root folder down to the resource. At each ancestor only inheritable entries
/// apply; at the resource itself every entry applies. An overwrite-all marker drops everything
/// accumulated above it.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclPermissionHandler;

impl AclPermissionHandler {
    fn apply_level(acl: &mut AccessControlList, entries: &[AccessControlEntry], inherited: bool) {
        let applicable: Vec<&AccessControlEntry> = entries.iter().filter(|e| !inherited || e.is_inheritable()).collect();
        if applicable.iter().any(|e| e.is_overwrite_all()) {
            acl.clear();
        }
        for e in applicable {
            if inherited {
                acl.add(&e.clone().with_flags(AceFlags::INHERITED));
            } else {
                acl.add(e);
            }
        }
    }
}

impl PermissionHandler for AclPermissionHandler {
    fn resolve_acl(&self, store: &dyn ResourceStore, resource: &Resource) -> Result<AccessControlList> {
        let mut acl = AccessControlList::new();
        for folder in paths::ancestor_folders(&resource.root_path) {
            let Some(ancestor) = store.read_resource(&folder)? else { continue };
            let entries = store.read_access_control_entries(&ancestor)?;
            Self::apply_level(&mut acl, &entries, true);
        }
        let own = store.read_access_control_entries(resource)?;
        Self::apply_level(&mut acl, &own, false);
        Ok(acl)
    }
}
