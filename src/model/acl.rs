//! Access control entries and the per-principal list they resolve into.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::permissions::PermissionSet;
use crate::identity::PrincipalId;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AceFlags: u32 {
        /// Entry applies to descendants of the resource it is set on
        const INHERIT     = 0b0001;
        /// Entry replaces what was accumulated for its principal instead of merging
        const OVERWRITE   = 0b0010;
        /// Entry reached the resource through inheritance (set during resolution)
        const INHERITED   = 0b0100;
        const RESPONSIBLE = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum AcePrincipal {
    User(PrincipalId),
    Group(PrincipalId),
    /// Applies to every principal without an entry of their own
    AllOthers,
    /// Marker: discard everything inherited so far
    OverwriteAll,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessControlEntry {
    /// Resource id (shared between siblings)
    pub resource_id: Uuid,
    pub principal: AcePrincipal,
    pub permissions: PermissionSet,
    #[serde(default = "AceFlags::empty")]
    pub flags: AceFlags,
}

impl AccessControlEntry {
    pub fn new(resource_id: Uuid, principal: AcePrincipal, permissions: PermissionSet) -> Self {
        Self { resource_id, principal, permissions, flags: AceFlags::empty() }
    }

    pub fn with_flags(mut self, flags: AceFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn is_inheritable(&self) -> bool { self.flags.contains(AceFlags::INHERIT) }

    pub fn is_inherited(&self) -> bool { self.flags.contains(AceFlags::INHERITED) }

    pub fn is_overwrite_all(&self) -> bool { self.principal == AcePrincipal::OverwriteAll }
}

/// Aggregated permissions per principal after inheritance has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessControlList {
    permissions: HashMap<AcePrincipal, PermissionSet>,
}

impl AccessControlList {
    pub fn new() -> Self { Self::default() }

    /// Add an entry: OVERWRITE entries replace the principal's set, others merge into it.
    pub fn add(&mut self, entry: &AccessControlEntry) {
        if entry.is_overwrite_all() { return; }
        if entry.flags.contains(AceFlags::OVERWRITE) {
            self.permissions.insert(entry.principal, entry.permissions);
        } else {
            self.permissions.entry(entry.principal).or_default().add(&entry.permissions);
        }
    }

    pub fn clear(&mut self) { self.permissions.clear(); }

    pub fn permissions_of(&self, principal: &AcePrincipal) -> Option<&PermissionSet> {
        self.permissions.get(principal)
    }

    /// Permissions of a user: union of the user's own entry and every group entry. Without
    /// any matching entry the `AllOthers` entry applies.
    pub fn permissions_for(&self, user: PrincipalId, groups: &[PrincipalId]) -> PermissionSet {
        let mut sum = PermissionSet::empty();
        let mut matched = false;
        if let Some(p) = self.permissions.get(&AcePrincipal::User(user)) {
            sum.add(p);
            matched = true;
        }
        for g in groups {
            if let Some(p) = self.permissions.get(&AcePrincipal::Group(*g)) {
                sum.add(p);
                matched = true;
            }
        }
        if !matched {
            if let Some(p) = self.permissions.get(&AcePrincipal::AllOthers) {
                sum.add(p);
            }
        }
        sum
    }

    pub fn len(&self) -> usize { self.permissions.len() }

    pub fn is_empty(&self) -> bool { self.permissions.is_empty() }
}
