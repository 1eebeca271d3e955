//! Recursive, permission-gated tree operations.
//!
//! Each operation checks the root, then walks the subtree depth first. Delete checks and applies
//! node by node, children before their folder. Move and undo check the whole subtree before the
//! first write because paths change as they go. None of the operations is transactional: a
//! store failure halfway through leaves the subtree partially changed.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use super::resolver::PermissionResolver;
use crate::error::{SecurityError, SecurityResult, StateFailure};
use crate::identity::RequestContext;
use crate::model::permissions::{ACCESS_READ_WRITE, ACCESS_WRITE};
use crate::model::{LockKind, PermissionSet, Resource, ResourceFilter, ResourceState, SiblingMode};
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TreePhase {
    Start,
    PermissionCheck,
    Recurse,
    Apply,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoMode {
    Content,
    ContentRecursive,
    MoveContent,
    MoveContentRecursive,
}

impl UndoMode {
    pub fn is_recursive(self) -> bool { matches!(self, UndoMode::ContentRecursive | UndoMode::MoveContentRecursive) }

    pub fn undo_move(self) -> bool { matches!(self, UndoMode::MoveContent | UndoMode::MoveContentRecursive) }
}

/// What a finished tree operation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeOutcome {
    pub phase: TreePhase,
    /// Paths written, in order
    pub touched: Vec<String>,
    /// Paths skipped because a sibling was already handled
    pub skipped_siblings: Vec<String>,
    /// Paths skipped because there was nothing to do
    pub skipped: Vec<String>,
    /// Moved paths that could not be re-locked
    pub relock_failures: Vec<String>,
}

impl TreeOutcome {
    fn new() -> Self {
        Self { phase: TreePhase::Start, touched: vec![], skipped_siblings: vec![], skipped: vec![], relock_failures: vec![] }
    }

    fn enter(&mut self, phase: TreePhase, path: &str) {
        self.phase = phase;
        crate::tprintln!("tree phase {:?} at {}", phase, path);
    }

    fn finish(mut self) -> Self {
        self.phase = TreePhase::Done;
        self
    }
}

/// Records the failed phase before handing the error back.
fn failed<T>(op: &str, root: &str, outcome: &mut TreeOutcome, err: SecurityError) -> SecurityResult<T> {
    let at = outcome.phase;
    outcome.phase = TreePhase::Failed;
    debug!(target: "vfsguard::tree", "{} of {} failed during {:?} after {} writes: {}", op, root, at, outcome.touched.len(), err);
    Err(err)
}

pub struct TreeOperationCoordinator<'a> {
    resolver: &'a PermissionResolver,
}

fn children_filter() -> ResourceFilter { ResourceFilter::ALL.add_exclude_state(ResourceState::Deleted) }

impl<'a> TreeOperationCoordinator<'a> {
    pub fn new(resolver: &'a PermissionResolver) -> Self { Self { resolver } }

    /// Check `required` (with lock) on the resource and, when `check_child_permissions` is set,
    /// on every non-deleted descendant.
    pub fn check_tree_permissions(&self, ctx: &RequestContext, resource: &Resource, required: &PermissionSet, check_child_permissions: bool) -> SecurityResult<()> {
        self.resolver.check_permissions(ctx, resource, required, true, &ResourceFilter::ALL)?;
        if !check_child_permissions || !resource.is_folder() {
            return Ok(());
        }
        for child in self.children(ctx, resource)? {
            self.check_tree_permissions(ctx, &child, required, true)?;
        }
        Ok(())
    }

    fn children(&self, ctx: &RequestContext, folder: &Resource) -> SecurityResult<Vec<Resource>> {
        let filter = children_filter();
        let all = self.resolver.resources().read_child_resources(folder)?;
        Ok(all.into_iter().filter(|r| filter.is_valid(ctx.request_time, r)).collect())
    }

    // ---- delete ----

    pub fn delete_resource(&self, ctx: &RequestContext, resource: &Resource, mode: SiblingMode) -> SecurityResult<TreeOutcome> {
        let mut outcome = TreeOutcome::new();
        match self.delete_checked(ctx, resource, mode, &mut outcome) {
            Ok(()) => {
                debug!(target: "vfsguard::tree", "deleted {} ({} nodes, {} siblings skipped) [corr={}]", resource.root_path, outcome.touched.len(), outcome.skipped_siblings.len(), ctx.corr());
                Ok(outcome.finish())
            }
            Err(e) => failed("delete", &resource.root_path, &mut outcome, e),
        }
    }

    fn delete_checked(&self, ctx: &RequestContext, resource: &Resource, mode: SiblingMode, outcome: &mut TreeOutcome) -> SecurityResult<()> {
        self.resolver.check_offline_project(&ctx.project)?;
        outcome.enter(TreePhase::PermissionCheck, &resource.root_path);
        self.resolver.check_permissions(ctx, resource, &ACCESS_WRITE, true, &ResourceFilter::ALL)?;
        // The whole subtree must be free of system locks before anything is deleted
        self.resolver.lock_gate().check_system_locks(resource)?;
        let mut visited: HashSet<Uuid> = HashSet::new();
        self.delete_node(ctx, resource, mode, false, &mut visited, outcome)
    }

    fn delete_node(&self, ctx: &RequestContext, resource: &Resource, mode: SiblingMode, check_child_permissions: bool, visited: &mut HashSet<Uuid>, outcome: &mut TreeOutcome) -> SecurityResult<()> {
        if check_child_permissions {
            outcome.enter(TreePhase::PermissionCheck, &resource.root_path);
            self.resolver.check_permissions(ctx, resource, &ACCESS_WRITE, true, &ResourceFilter::ALL)?;
        }
        if resource.is_folder() {
            outcome.enter(TreePhase::Recurse, &resource.root_path);
            for child in self.children(ctx, resource)? {
                if mode == SiblingMode::RemoveSiblings && visited.contains(&child.resource_id) {
                    outcome.skipped_siblings.push(child.root_path.clone());
                    continue;
                }
                self.delete_node(ctx, &child, mode, true, visited, outcome)?;
            }
        }
        outcome.enter(TreePhase::Apply, &resource.root_path);
        self.resolver.resources().delete_resource(&ctx.project, resource, mode)?;
        if mode == SiblingMode::RemoveSiblings {
            visited.insert(resource.resource_id);
        }
        outcome.touched.push(resource.root_path.clone());
        Ok(())
    }

    // ---- move ----

    pub fn move_resource(&self, ctx: &RequestContext, resource: &Resource, destination: &str) -> SecurityResult<TreeOutcome> {
        let mut outcome = TreeOutcome::new();
        match self.move_checked(ctx, resource, destination, &mut outcome) {
            Ok(()) => {
                debug!(target: "vfsguard::tree", "moved {} -> {} ({} nodes) [corr={}]", resource.root_path, destination, outcome.touched.len(), ctx.corr());
                Ok(outcome.finish())
            }
            Err(e) => failed("move", &resource.root_path, &mut outcome, e),
        }
    }

    fn move_destination(resource: &Resource, destination: &str) -> SecurityResult<String> {
        let mut dest = paths::normalize_nfc(destination);
        if resource.is_folder() && !paths::is_folder_path(&dest) {
            dest.push('/');
        }
        if resource.is_file() && paths::is_folder_path(&dest) {
            dest = paths::join(&dest, resource.name());
        }
        paths::validate_root_path(&dest).map_err(|e| SecurityError::invalid_path(dest.clone(), e.to_string()))?;
        if resource.is_folder() && paths::is_under(&dest, &resource.root_path) {
            return Err(SecurityError::invalid_path(dest, "cannot move a folder into itself".to_string()));
        }
        Ok(dest)
    }

    fn move_checked(&self, ctx: &RequestContext, resource: &Resource, destination: &str, outcome: &mut TreeOutcome) -> SecurityResult<()> {
        self.resolver.check_offline_project(&ctx.project)?;
        let dest = Self::move_destination(resource, destination)?;
        let store = self.resolver.resources();
        if store.read_resource(&dest)?.is_some() {
            return Err(SecurityError::state(StateFailure::DestinationExists { path: dest }));
        }
        let parent_path = paths::parent_folder(&dest).ok_or_else(|| SecurityError::invalid_path(dest.clone(), "destination has no parent folder".to_string()))?;
        let Some(parent) = store.read_resource(&parent_path)? else {
            return Err(SecurityError::not_found(parent_path));
        };
        if parent.state.is_deleted() {
            return Err(SecurityError::state(StateFailure::ParentFolderDeleted { parent: parent_path, resource: dest }));
        }

        outcome.enter(TreePhase::PermissionCheck, &resource.root_path);
        self.resolver.check_permissions(ctx, resource, &ACCESS_READ_WRITE, true, &ResourceFilter::ALL)?;
        self.resolver.check_permissions(ctx, &parent, &ACCESS_WRITE, false, &ResourceFilter::ALL)?;
        self.resolver.lock_gate().check_system_locks(resource)?;
        if resource.is_folder() {
            self.check_movable_children(ctx, resource)?;
        }
        self.move_node(ctx, resource, &dest, outcome)
    }

    /// WRITE with lock on every descendant, deleted ones included, since all of them move.
    fn check_movable_children(&self, ctx: &RequestContext, folder: &Resource) -> SecurityResult<()> {
        for child in self.resolver.resources().read_child_resources(folder)? {
            self.resolver.check_permissions(ctx, &child, &ACCESS_WRITE, true, &ResourceFilter::ALL)?;
            if child.is_folder() {
                self.check_movable_children(ctx, &child)?;
            }
        }
        Ok(())
    }

    fn move_node(&self, ctx: &RequestContext, resource: &Resource, dest: &str, outcome: &mut TreeOutcome) -> SecurityResult<()> {
        // Children come from the tree as it was before this node moved
        let children = if resource.is_folder() { self.resolver.resources().read_child_resources(resource)? } else { vec![] };

        outcome.enter(TreePhase::Apply, &resource.root_path);
        let moved = self.resolver.resources().move_resource(&ctx.project, resource, dest)?;
        self.resolver.lock_gate().move_lock(&resource.root_path, dest)?;
        outcome.touched.push(dest.to_string());
        if self.resolver.config().relock_after_move {
            if let Err(e) = self.resolver.lock_gate().lock_resource(&ctx.user, &moved, LockKind::Exclusive) {
                warn!(target: "vfsguard::tree", "could not re-lock {} after move: {} [corr={}]", dest, e, ctx.corr());
                outcome.relock_failures.push(dest.to_string());
            }
        }

        if !children.is_empty() {
            outcome.enter(TreePhase::Recurse, dest);
        }
        for child in children {
            let child_dest = paths::join(dest, child.name());
            self.move_node(ctx, &child, &child_dest, outcome)?;
        }
        Ok(())
    }

    // ---- undo ----

    pub fn undo_changes(&self, ctx: &RequestContext, resource: &Resource, mode: UndoMode) -> SecurityResult<TreeOutcome> {
        let mut outcome = TreeOutcome::new();
        match self.undo_checked(ctx, resource, mode, &mut outcome) {
            Ok(()) => {
                debug!(target: "vfsguard::tree", "undid {} ({:?}, {} nodes) [corr={}]", resource.root_path, mode, outcome.touched.len(), ctx.corr());
                Ok(outcome.finish())
            }
            Err(e) => failed("undo", &resource.root_path, &mut outcome, e),
        }
    }

    fn descendants(&self, folder: &Resource, out: &mut Vec<Resource>) -> SecurityResult<()> {
        for child in self.resolver.resources().read_child_resources(folder)? {
            let is_folder = child.is_folder();
            out.push(child.clone());
            if is_folder {
                self.descendants(&child, out)?;
            }
        }
        Ok(())
    }

    fn undo_checked(&self, ctx: &RequestContext, resource: &Resource, mode: UndoMode, outcome: &mut TreeOutcome) -> SecurityResult<()> {
        self.resolver.check_offline_project(&ctx.project)?;
        outcome.enter(TreePhase::PermissionCheck, &resource.root_path);
        self.resolver.check_permissions(ctx, resource, &ACCESS_WRITE, true, &ResourceFilter::ALL)?;
        if resource.state.is_new() {
            return Err(SecurityError::state(StateFailure::NewResourceUndo { path: resource.root_path.clone() }));
        }
        self.resolver.lock_gate().check_system_locks(resource)?;

        let mut visited: HashSet<Uuid> = HashSet::new();
        visited.insert(resource.resource_id);
        let mut pending: Vec<Resource> = Vec::new();
        if mode.is_recursive() && resource.is_folder() {
            outcome.enter(TreePhase::Recurse, &resource.root_path);
            let mut all = Vec::new();
            self.descendants(resource, &mut all)?;
            for d in all {
                if d.state.is_new() || d.state.is_unchanged() {
                    outcome.skipped.push(d.root_path.clone());
                    continue;
                }
                if !visited.insert(d.resource_id) {
                    outcome.skipped_siblings.push(d.root_path.clone());
                    continue;
                }
                self.resolver.check_permissions(ctx, &d, &ACCESS_WRITE, true, &ResourceFilter::ALL)?;
                pending.push(d);
            }
        }

        outcome.enter(TreePhase::Apply, &resource.root_path);
        self.undo_node(ctx, resource, mode, outcome)?;
        for d in pending {
            self.undo_node(ctx, &d, mode, outcome)?;
        }
        Ok(())
    }

    fn undo_node(&self, ctx: &RequestContext, resource: &Resource, mode: UndoMode, outcome: &mut TreeOutcome) -> SecurityResult<()> {
        let restored = self.resolver.resources().undo_resource(&ctx.project, resource, mode.undo_move())?;
        if restored.root_path != resource.root_path {
            self.resolver.lock_gate().move_lock(&resource.root_path, &restored.root_path)?;
        }
        outcome.touched.push(restored.root_path);
        Ok(())
    }
}
