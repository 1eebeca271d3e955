//! Lock ownership checks.
//!
//! A lock recorded on a folder is inherited by everything below it. System locks belong to
//! nobody and block every mutation, including the caller's own locked resources.

use std::sync::Arc;
use tracing::debug;

use crate::error::{LockFailure, SecurityError, SecurityResult};
use crate::identity::{PrincipalId, User};
use crate::model::{Lock, LockKind, Resource};
use crate::paths;
use crate::store::{PrincipalStore, ResourceStore};

#[derive(Clone)]
pub struct LockGate {
    resources: Arc<dyn ResourceStore>,
    principals: Arc<dyn PrincipalStore>,
}

impl LockGate {
    pub fn new(resources: Arc<dyn ResourceStore>, principals: Arc<dyn PrincipalStore>) -> Self {
        Self { resources, principals }
    }

    /// Direct lock on the path, else the lock inherited from the nearest locked ancestor folder.
    pub fn current_lock(&self, root_path: &str) -> SecurityResult<Option<Lock>> {
        if let Some(lock) = self.resources.read_lock(root_path)? {
            return Ok(Some(lock));
        }
        for folder in paths::ancestor_folders(root_path).iter().rev() {
            if let Some(lock) = self.resources.read_lock(folder)? {
                if lock.kind == LockKind::Shared { continue; }
                return Ok(Some(lock.inherited_at(root_path)));
            }
        }
        Ok(None)
    }

    /// True if the resource or any descendant carries a system lock.
    pub fn has_system_locks(&self, resource: &Resource) -> SecurityResult<bool> {
        let locks = if resource.is_folder() {
            self.resources.read_locks_under(&resource.root_path)?
        } else {
            self.resources.read_lock(&resource.root_path)?.into_iter().collect()
        };
        Ok(locks.iter().any(Lock::is_system))
    }

    pub fn check_system_locks(&self, resource: &Resource) -> SecurityResult<()> {
        if self.has_system_locks(resource)? {
            debug!(target: "vfsguard::locks", "system lock blocks {}", resource.root_path);
            return Err(SecurityError::lock(resource.root_path.as_str(), LockFailure::SystemLocked));
        }
        Ok(())
    }

    /// True when the principal holds a write-enabling lock on the resource.
    pub fn is_locked_for_principal(&self, principal: PrincipalId, resource: &Resource) -> SecurityResult<bool> {
        Ok(match self.current_lock(&resource.root_path)? {
            Some(lock) => !lock.is_system() && lock.is_owned_by(principal) && lock.permits_write(),
            None => false,
        })
    }

    pub fn lock_holder(&self, resource: &Resource) -> SecurityResult<Option<PrincipalId>> {
        Ok(self.current_lock(&resource.root_path)?.and_then(|l| l.owner))
    }

    /// Display name for a lock holder; falls back to the id when the user is gone.
    pub fn holder_name(&self, holder: PrincipalId) -> SecurityResult<String> {
        Ok(self.principals.read_user(holder)?.map(|u| u.fqn()).unwrap_or_else(|| holder.to_string()))
    }

    fn conflict(&self, resource: &Resource, lock: &Lock) -> SecurityResult<SecurityError> {
        let kind = match lock.owner {
            _ if lock.is_system() => LockFailure::SystemLocked,
            Some(owner) => LockFailure::LockedByOther { holder: self.holder_name(owner)? },
            None => LockFailure::SystemLocked,
        };
        Ok(SecurityError::lock(resource.root_path.as_str(), kind))
    }

    /// Lock a resource for `user`. Fails when someone else holds the resource (or, for folders, a
    /// resource below it) or a system lock is present.
    pub fn lock_resource(&self, user: &User, resource: &Resource, kind: LockKind) -> SecurityResult<Lock> {
        self.check_system_locks(resource)?;
        if let Some(existing) = self.current_lock(&resource.root_path)? {
            if !existing.is_owned_by(user.id) {
                return Err(self.conflict(resource, &existing)?);
            }
        }
        if resource.is_folder() {
            for below in self.resources.read_locks_under(&resource.root_path)? {
                if below.root_path != resource.root_path && !below.is_owned_by(user.id) {
                    return Err(self.conflict(resource, &below)?);
                }
            }
        }
        let lock = match kind {
            LockKind::Temporary => Lock::temporary(&resource.root_path, user.id),
            LockKind::Shared => Lock::shared(&resource.root_path, user.id),
            LockKind::System => Lock::system(&resource.root_path),
            LockKind::Exclusive | LockKind::Inherited => Lock::exclusive(&resource.root_path, user.id),
        };
        self.resources.write_lock(lock.clone())?;
        debug!(target: "vfsguard::locks", "locked {} ({:?}) for {}", resource.root_path, lock.kind, user.fqn());
        Ok(lock)
    }

    /// Release the user's lock on a resource; for folders the user's locks below it go too.
    pub fn unlock_resource(&self, user: &User, resource: &Resource) -> SecurityResult<()> {
        let Some(lock) = self.current_lock(&resource.root_path)? else {
            return Err(SecurityError::lock(resource.root_path.as_str(), LockFailure::NotLocked { holder: None }));
        };
        if !lock.is_owned_by(user.id) {
            return Err(self.conflict(resource, &lock)?);
        }
        if lock.is_inherited() {
            let holder = Some(self.holder_name(user.id)?);
            return Err(SecurityError::lock(resource.root_path.as_str(), LockFailure::NotLocked { holder }));
        }
        self.resources.remove_lock(&resource.root_path)?;
        if resource.is_folder() {
            for below in self.resources.read_locks_under(&resource.root_path)? {
                if below.is_owned_by(user.id) {
                    self.resources.remove_lock(&below.root_path)?;
                }
            }
        }
        debug!(target: "vfsguard::locks", "unlocked {} for {}", resource.root_path, user.fqn());
        Ok(())
    }

    /// Carry the lock record of a moved resource over to its new path.
    pub fn move_lock(&self, from: &str, to: &str) -> SecurityResult<Option<Lock>> {
        let Some(lock) = self.resources.remove_lock(from)? else { return Ok(None) };
        let moved = lock.moved_to(to);
        self.resources.write_lock(moved.clone())?;
        Ok(Some(moved))
    }
}
