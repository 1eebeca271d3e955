//! Publish permission validation. Direct publishes report every violation at once.

use std::collections::HashSet;
use tracing::debug;

use super::resolver::PermissionResolver;
use crate::error::{SecurityError, SecurityResult, StateFailure};
use crate::identity::RequestContext;
use crate::model::permissions::ACCESS_DIRECT_PUBLISH;
use crate::model::{Resource, ResourceFilter};

/// Resources selected for publishing.
#[derive(Debug, Clone, Default)]
pub struct PublishList {
    /// Explicit selection rather than the whole project
    pub direct_publish: bool,
    /// Selection built from one user's changes; its own folders need no parent check
    pub user_publish_list: bool,
    pub resources: Vec<Resource>,
}

impl PublishList {
    pub fn project() -> Self { Self::default() }

    pub fn direct(resources: Vec<Resource>) -> Self {
        Self { direct_publish: true, user_publish_list: false, resources }
    }

    pub fn user_list(resources: Vec<Resource>) -> Self {
        Self { direct_publish: true, user_publish_list: true, resources }
    }

    pub fn contains_path(&self, root_path: &str) -> bool {
        self.resources.iter().any(|r| r.root_path == root_path)
    }
}

pub struct PublishPermissionValidator<'a> {
    resolver: &'a PermissionResolver,
}

impl<'a> PublishPermissionValidator<'a> {
    pub fn new(resolver: &'a PermissionResolver) -> Self { Self { resolver } }

    pub fn validate(&self, ctx: &RequestContext, list: &PublishList) -> SecurityResult<()> {
        self.resolver.check_offline_project(&ctx.project)?;
        if !list.direct_publish {
            return self.resolver.check_manager_of_project_role(ctx);
        }

        let mut violations: Vec<SecurityError> = Vec::new();
        let mut checked_parents: HashSet<String> = HashSet::new();
        for resource in &list.resources {
            if let Some(parent_path) = resource.parent_folder() {
                if checked_parents.insert(parent_path.clone()) && !(list.user_publish_list && list.contains_path(&parent_path)) {
                    if let Some(v) = self.parent_violation(&parent_path, resource)? {
                        violations.push(v);
                    }
                }
            }
            match self.resolver.check_permissions(ctx, resource, &ACCESS_DIRECT_PUBLISH, false, &ResourceFilter::ALL) {
                Ok(()) => {}
                Err(e) if e.is_store() => return Err(e),
                Err(e) => violations.push(e),
            }
        }

        if violations.is_empty() {
            return Ok(());
        }
        debug!(target: "vfsguard::publish", "direct publish by {} rejected with {} violations [corr={}]", ctx.user.fqn(), violations.len(), ctx.corr());
        Err(SecurityError::Aggregate(violations))
    }

    fn parent_violation(&self, parent_path: &str, resource: &Resource) -> SecurityResult<Option<SecurityError>> {
        let Some(parent) = self.resolver.resources().read_resource(parent_path)? else {
            return Ok(Some(SecurityError::not_found(parent_path.to_string())));
        };
        let failure = if parent.state.is_new() {
            StateFailure::ParentFolderNew { parent: parent_path.to_string(), resource: resource.root_path.clone() }
        } else if parent.state.is_deleted() {
            StateFailure::ParentFolderDeleted { parent: parent_path.to_string(), resource: resource.root_path.clone() }
        } else {
            return Ok(None);
        };
        Ok(Some(SecurityError::state(failure)))
    }
}
