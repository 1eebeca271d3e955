//! Shared test setup: in-memory stores, a private role cache and a few helpers.

use std::sync::Arc;

use super::resolver::PermissionResolver;
use crate::config::EffectiveConfig;
use crate::identity::{Group, OrgUnit, RequestContext, User};
use crate::model::{AccessControlEntry, AceFlags, AcePrincipal, Project, Resource};
use crate::roles::{ProcessRoleCache, RoleKind};
use crate::store::{MemoryPrincipals, MemoryRepository};

pub(crate) struct Fixture {
    pub repo: Arc<MemoryRepository>,
    pub principals: Arc<MemoryPrincipals>,
    pub cache: Arc<ProcessRoleCache>,
    pub resolver: PermissionResolver,
}

impl Fixture {
    pub fn new() -> Self { Self::with_config(EffectiveConfig::default()) }

    pub fn with_config(config: EffectiveConfig) -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let principals = Arc::new(MemoryPrincipals::new());
        let cache = Arc::new(ProcessRoleCache::with_capacity(1_000));
        let resolver = PermissionResolver::new(repo.clone(), principals.clone(), config).with_role_cache(cache.clone());
        Self { repo, principals, cache, resolver }
    }

    pub fn org_unit(&self, fqn: &str, resources: &[&str]) -> OrgUnit {
        self.principals.add_org_unit(OrgUnit::new(fqn, resources))
    }

    pub fn group(&self, ou: &str, name: &str) -> Group {
        self.principals.add_group(Group::new(ou, name))
    }

    pub fn role_group(&self, ou: &str, kind: RoleKind) -> Group {
        self.principals.add_group(Group::role_group(ou, kind.group_name()))
    }

    pub fn user(&self, ou: &str, name: &str, groups: &[&Group]) -> User {
        let user = groups.iter().fold(User::new(ou, name), |u, g| u.with_group(g));
        self.principals.add_user(user)
    }

    pub fn folder(&self, path: &str) -> Resource { self.repo.add_published(Resource::folder(path)) }

    pub fn file(&self, path: &str) -> Resource { self.repo.add_published(Resource::file(path)) }

    pub fn grant(&self, resource: &Resource, principal: AcePrincipal, perms: &str, inherit: bool) {
        let flags = if inherit { AceFlags::INHERIT } else { AceFlags::empty() };
        let ace = AccessControlEntry::new(resource.resource_id, principal, perms.parse().expect("permission string")).with_flags(flags);
        self.repo.add_ace(ace);
    }

    /// Everyone may read and view everything; write comes from explicit grants.
    pub fn open_read(&self) {
        let Some(root) = self.repo.resource("/") else { return };
        self.grant(&root, AcePrincipal::AllOthers, "+r+v", true);
    }

    pub fn ctx(&self, user: &User) -> RequestContext {
        RequestContext::new(user.clone(), Project::offline("Offline", ""))
    }

    pub fn online_ctx(&self, user: &User) -> RequestContext {
        RequestContext::new(user.clone(), Project::online())
    }
}
