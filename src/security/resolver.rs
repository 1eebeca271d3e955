//! Permission and role resolution.
//!
//! [`PermissionResolver::has_permissions`] is the non-blocking decision; the `check_*` methods
//! are the blocking counterparts that turn a negative decision into a [`SecurityError`].
//! Outcome precedence is Filtered, then Denied, then NotLocked, then Allowed.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::hooks::{emit_post_auth, AuthEvent};
use super::lock_gate::LockGate;
use super::permission_handler::{AclPermissionHandler, PermissionHandler};
use crate::config::EffectiveConfig;
use crate::error::{LockFailure, SecurityError, SecurityResult, StateFailure};
use crate::identity::{Group, PrincipalId, RequestContext, User};
use crate::model::{Permission, PermissionSet, Project, Resource, ResourceFilter};
use crate::paths;
use crate::roles::{global_role_cache_sized, Role, RoleCache, RoleCacheKey};
use crate::store::{GroupQuery, PrincipalStore, ResourceStore};

/// Outcome of a non-blocking permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CheckResult {
    Allowed,
    Denied { missing: PermissionSet },
    /// The resource exists but must look absent to this principal
    Filtered,
    /// Permissions suffice but the principal does not hold the lock
    NotLocked { holder: Option<PrincipalId> },
}

impl CheckResult {
    pub fn is_allowed(&self) -> bool { matches!(self, CheckResult::Allowed) }
}

pub struct PermissionResolver {
    resources: Arc<dyn ResourceStore>,
    principals: Arc<dyn PrincipalStore>,
    role_cache: Arc<dyn RoleCache>,
    handler: Arc<dyn PermissionHandler>,
    locks: LockGate,
    config: EffectiveConfig,
}

impl PermissionResolver {
    /// Resolver backed by the process-wide role cache, sized by `config` if this is its first use.
    pub fn new(resources: Arc<dyn ResourceStore>, principals: Arc<dyn PrincipalStore>, config: EffectiveConfig) -> Self {
        let locks = LockGate::new(resources.clone(), principals.clone());
        let role_cache = global_role_cache_sized(config.role_cache_max_entries);
        Self { resources, principals, role_cache, handler: Arc::new(AclPermissionHandler), locks, config }
    }

    pub fn with_role_cache(mut self, cache: Arc<dyn RoleCache>) -> Self {
        self.role_cache = cache;
        self
    }

    pub fn with_permission_handler(mut self, handler: Arc<dyn PermissionHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn config(&self) -> &EffectiveConfig { &self.config }

    pub fn lock_gate(&self) -> &LockGate { &self.locks }

    pub fn role_cache(&self) -> &Arc<dyn RoleCache> { &self.role_cache }

    pub(crate) fn resources(&self) -> &Arc<dyn ResourceStore> { &self.resources }

    pub(crate) fn principals(&self) -> &Arc<dyn PrincipalStore> { &self.principals }

    fn role_groups(&self, user: &User) -> SecurityResult<Vec<Group>> {
        Ok(self.principals.groups_of_user(user, &GroupQuery::roles())?)
    }

    /// True when one of the user's role groups implies `role`.
    pub fn has_role(&self, user: &User, role: &Role) -> SecurityResult<bool> {
        let key = RoleCacheKey::for_role(user.id, role);
        if let Some(cached) = self.role_cache.get(&key) {
            return Ok(cached);
        }
        let stamp = self.role_cache.stamp(user.id);
        let groups = self.role_groups(user)?;
        let fqns: Vec<String> = groups.iter().map(Group::fqn).collect();
        let result = role.is_held_by(fqns.iter().map(String::as_str));
        self.role_cache.put(key, result, stamp);
        debug!(target: "vfsguard::roles", "has_role user={} role={} -> {}", user.fqn(), role, result);
        Ok(result)
    }

    /// Like [`Self::has_role`] but additionally requires an OU granting the role to claim the
    /// resource. Guests never hold roles for resources.
    pub fn has_role_for_resource(&self, user: &User, role: &Role, resource: &Resource) -> SecurityResult<bool> {
        if user.is_guest() {
            return Ok(false);
        }
        let key = RoleCacheKey::for_resource(user.id, role, &resource.root_path);
        if let Some(cached) = self.role_cache.get(&key) {
            return Ok(cached);
        }
        let stamp = self.role_cache.stamp(user.id);
        let unscoped = role.for_org_unit(None);
        let groups = self.role_groups(user)?;
        let mut result = false;
        for group in groups.iter() {
            let fqn = group.fqn();
            if !unscoped.matches(&fqn) { continue; }
            let Some(given) = Role::value_of(&fqn) else { continue };
            if given.is_ou_independent() {
                result = true;
                break;
            }
            let claimed = self.principals.resources_for_org_unit(&group.ou_fqn)?;
            if claimed.iter().any(|p| paths::is_under(&resource.root_path, p)) {
                result = true;
                break;
            }
        }
        self.role_cache.put(key, result, stamp);
        debug!(target: "vfsguard::roles", "has_role_for_resource user={} role={} path={} -> {}", user.fqn(), role, resource.root_path, result);
        Ok(result)
    }

    pub fn check_role(&self, user: &User, role: &Role) -> SecurityResult<()> {
        if self.has_role(user, role)? {
            return Ok(());
        }
        Err(SecurityError::role(user.fqn(), role.name().to_string(), role.ou_fqn().map(str::to_string)))
    }

    pub fn check_role_for_resource(&self, user: &User, role: &Role, resource: &Resource) -> SecurityResult<()> {
        if self.has_role_for_resource(user, role, resource)? {
            return Ok(());
        }
        Err(SecurityError::role(user.fqn(), role.name().to_string(), Some(resource.root_path.clone())))
    }

    /// Project managers of the project's OU and members of its manager group manage the
    /// current project; nobody manages the online project.
    pub fn is_manager_of_project(&self, ctx: &RequestContext) -> SecurityResult<bool> {
        let project = &ctx.project;
        if project.is_online() {
            return Ok(false);
        }
        if self.has_role(&ctx.user, &Role::PROJECT_MANAGER.for_org_unit(Some(project.ou_fqn.as_str())))? {
            return Ok(true);
        }
        let Some(manager_group) = project.manager_group else { return Ok(false) };
        let groups = self.principals.groups_of_user(&ctx.user, &GroupQuery::all_groups())?;
        Ok(groups.iter().any(|g| g.id == manager_group))
    }

    pub fn check_manager_of_project_role(&self, ctx: &RequestContext) -> SecurityResult<()> {
        if self.is_manager_of_project(ctx)? {
            return Ok(());
        }
        Err(SecurityError::role(ctx.user.fqn(), Role::PROJECT_MANAGER.name().to_string(), Some(ctx.project.name.clone())))
    }

    /// Fails when the current project is the online project.
    pub fn check_offline_project(&self, project: &Project) -> SecurityResult<()> {
        if project.is_online() {
            return Err(SecurityError::state(StateFailure::OnlineProject { project: project.name.clone() }));
        }
        Ok(())
    }

    /// Permissions the user effectively holds on the resource, before lock and filter rules.
    pub fn effective_permissions(&self, user: &User, resource: &Resource) -> SecurityResult<PermissionSet> {
        if self.config.vfs_manager_bypass && self.has_role_for_resource(user, &Role::VFS_MANAGER, resource)? {
            return Ok(PermissionSet::all());
        }
        let acl = self.handler.resolve_acl(self.resources.as_ref(), resource)?;
        let groups: Vec<PrincipalId> = self.principals.groups_of_user(user, &GroupQuery::all_groups())?.iter().map(|g| g.id).collect();
        Ok(acl.permissions_for(user.id, &groups))
    }

    fn decide(&self, ctx: &RequestContext, resource: &Resource, required: &PermissionSet, check_lock: bool, filter: &ResourceFilter) -> SecurityResult<CheckResult> {
        if !filter.is_valid(ctx.request_time, resource) {
            return Ok(CheckResult::Filtered);
        }
        if !self.config.security_check_enabled {
            crate::tprintln!("security check bypass enabled; allowing {} on {} [corr={}]", required, resource.root_path, ctx.corr());
            return Ok(CheckResult::Allowed);
        }
        let writes = required.requires_write() || required.requires_control();
        if writes && self.config.online_project_denies_write && ctx.project.is_online() {
            let missing = required.effective() & (Permission::WRITE | Permission::CONTROL);
            return Ok(CheckResult::Denied { missing: PermissionSet::new(missing) });
        }

        let mut granted = self.effective_permissions(&ctx.user, resource)?;
        if writes && self.config.jsp_write_requires_developer && resource.is_jsp() && !self.has_role_for_resource(&ctx.user, &Role::DEVELOPER, resource)? {
            granted.deny(Permission::WRITE);
        }

        let mut required = *required;
        if !granted.effective().contains(Permission::VIEW) {
            if filter.require_visible() {
                required.grant(Permission::VIEW);
            } else {
                granted.grant(Permission::VIEW);
            }
        }
        let missing = granted.missing(&required);
        if !missing.is_empty() {
            return Ok(CheckResult::Denied { missing: PermissionSet::new(missing) });
        }

        if check_lock && writes && !self.locks.is_locked_for_principal(ctx.user.id, resource)? {
            let holder = self.locks.lock_holder(resource)?;
            return Ok(CheckResult::NotLocked { holder });
        }
        Ok(CheckResult::Allowed)
    }

    /// Non-blocking permission decision.
    pub fn has_permissions(&self, ctx: &RequestContext, resource: &Resource, required: &PermissionSet, check_lock: bool, filter: &ResourceFilter) -> SecurityResult<CheckResult> {
        let result = self.decide(ctx, resource, required, check_lock, filter)?;
        debug!(
            target: "vfsguard::resolver",
            "has_permissions user={} path={} required={} lock={} -> {:?} [corr={}]",
            ctx.user.fqn(), resource.root_path, required, check_lock, result, ctx.corr()
        );
        emit_post_auth(&AuthEvent {
            principal: ctx.user.id,
            principal_name: ctx.user.fqn(),
            operation: "has_permissions",
            path: resource.root_path.clone(),
            required: required.to_string(),
            result,
            request_id: ctx.request_id.clone(),
        });
        Ok(result)
    }

    /// Blocking permission check.
    pub fn check_permissions(&self, ctx: &RequestContext, resource: &Resource, required: &PermissionSet, check_lock: bool, filter: &ResourceFilter) -> SecurityResult<()> {
        match self.has_permissions(ctx, resource, required, check_lock, filter)? {
            CheckResult::Allowed => Ok(()),
            CheckResult::Denied { missing } => Err(SecurityError::permission(resource.root_path.clone(), missing.permission_string())),
            CheckResult::Filtered => Err(SecurityError::not_found(resource.root_path.as_str())),
            CheckResult::NotLocked { holder } => {
                let holder = match holder {
                    Some(id) => Some(self.locks.holder_name(id)?),
                    None => None,
                };
                Err(SecurityError::lock(resource.root_path.as_str(), LockFailure::NotLocked { holder }))
            }
        }
    }

    /// Read a resource through the gate: absent and filtered resources are both `NotFound`,
    /// and the caller needs read permission.
    pub fn read_resource(&self, ctx: &RequestContext, root_path: &str, filter: &ResourceFilter) -> SecurityResult<Resource> {
        let path = paths::normalize_nfc(root_path);
        paths::validate_root_path(&path).map_err(|e| SecurityError::invalid_path(path.clone(), e.to_string()))?;
        let Some(resource) = self.resources.read_resource(&path)? else {
            return Err(SecurityError::not_found(path));
        };
        self.check_permissions(ctx, &resource, &crate::model::permissions::ACCESS_READ, true, filter)?;
        Ok(resource)
    }
}
