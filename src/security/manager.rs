use std::sync::Arc;
use tracing::debug;

use super::publish::{PublishList, PublishPermissionValidator};
use super::resolver::{CheckResult, PermissionResolver};
use super::tree_ops::{TreeOperationCoordinator, TreeOutcome, UndoMode};
use crate::config::EffectiveConfig;
use crate::error::SecurityResult;
use crate::identity::{RequestContext, User};
use crate::model::permissions::ACCESS_WRITE;
use crate::model::{Lock, LockKind, PermissionSet, Project, Resource, ResourceFilter, SiblingMode};
use crate::roles::{CacheEvent, Role, RoleCache};
use crate::store::{PrincipalStore, ResourceStore};

/// Entry point for embedding services. Every mutating operation checks the project state first.
pub struct SecurityManager {
    resolver: PermissionResolver,
}

impl SecurityManager {
    pub fn new(resources: Arc<dyn ResourceStore>, principals: Arc<dyn PrincipalStore>, config: EffectiveConfig) -> Self {
        Self { resolver: PermissionResolver::new(resources, principals, config) }
    }

    pub fn with_role_cache(self, cache: Arc<dyn RoleCache>) -> Self {
        Self { resolver: self.resolver.with_role_cache(cache) }
    }

    pub fn from_resolver(resolver: PermissionResolver) -> Self { Self { resolver } }

    pub fn resolver(&self) -> &PermissionResolver { &self.resolver }

    /// Forward a membership, role or OU change to the role cache.
    pub fn notify(&self, event: CacheEvent) {
        debug!(target: "vfsguard::roles", "cache event {:?}", event);
        self.resolver.role_cache().invalidate(&event);
    }

    pub fn has_permissions(&self, ctx: &RequestContext, resource: &Resource, required: &PermissionSet, check_lock: bool, filter: &ResourceFilter) -> SecurityResult<CheckResult> {
        self.resolver.has_permissions(ctx, resource, required, check_lock, filter)
    }

    pub fn check_permissions(&self, ctx: &RequestContext, resource: &Resource, required: &PermissionSet, check_lock: bool, filter: &ResourceFilter) -> SecurityResult<()> {
        self.resolver.check_permissions(ctx, resource, required, check_lock, filter)
    }

    pub fn read_resource(&self, ctx: &RequestContext, root_path: &str, filter: &ResourceFilter) -> SecurityResult<Resource> {
        self.resolver.read_resource(ctx, root_path, filter)
    }

    pub fn has_role(&self, user: &User, role: &Role) -> SecurityResult<bool> { self.resolver.has_role(user, role) }

    pub fn has_role_for_resource(&self, user: &User, role: &Role, resource: &Resource) -> SecurityResult<bool> {
        self.resolver.has_role_for_resource(user, role, resource)
    }

    pub fn check_role(&self, user: &User, role: &Role) -> SecurityResult<()> { self.resolver.check_role(user, role) }

    pub fn check_role_for_resource(&self, user: &User, role: &Role, resource: &Resource) -> SecurityResult<()> {
        self.resolver.check_role_for_resource(user, role, resource)
    }

    pub fn check_offline_project(&self, project: &Project) -> SecurityResult<()> { self.resolver.check_offline_project(project) }

    pub fn is_manager_of_project(&self, ctx: &RequestContext) -> SecurityResult<bool> { self.resolver.is_manager_of_project(ctx) }

    pub fn check_publish_permissions(&self, ctx: &RequestContext, list: &PublishList) -> SecurityResult<()> {
        PublishPermissionValidator::new(&self.resolver).validate(ctx, list)
    }

    pub fn delete_resource(&self, ctx: &RequestContext, resource: &Resource, mode: SiblingMode) -> SecurityResult<TreeOutcome> {
        TreeOperationCoordinator::new(&self.resolver).delete_resource(ctx, resource, mode)
    }

    pub fn move_resource(&self, ctx: &RequestContext, resource: &Resource, destination: &str) -> SecurityResult<TreeOutcome> {
        TreeOperationCoordinator::new(&self.resolver).move_resource(ctx, resource, destination)
    }

    pub fn undo_changes(&self, ctx: &RequestContext, resource: &Resource, mode: UndoMode) -> SecurityResult<TreeOutcome> {
        TreeOperationCoordinator::new(&self.resolver).undo_changes(ctx, resource, mode)
    }

    /// Lock a resource for the acting user; needs write permission in an offline project.
    pub fn lock_resource(&self, ctx: &RequestContext, resource: &Resource, kind: LockKind) -> SecurityResult<Lock> {
        self.resolver.check_offline_project(&ctx.project)?;
        self.resolver.check_permissions(ctx, resource, &ACCESS_WRITE, false, &ResourceFilter::ALL)?;
        self.resolver.lock_gate().lock_resource(&ctx.user, resource, kind)
    }

    pub fn unlock_resource(&self, ctx: &RequestContext, resource: &Resource) -> SecurityResult<()> {
        self.resolver.check_offline_project(&ctx.project)?;
        self.resolver.lock_gate().unlock_resource(&ctx.user, resource)
    }
}
