//! Collaborator interfaces the gate consumes.
//! Persistence is out of scope; implementations only need to answer these reads and apply the
//! structural writes the tree operations request. All methods return `anyhow::Result` so that
//! infrastructure failures stay opaque to the gate.

use anyhow::Result;

use crate::identity::{Group, OrgUnit, PrincipalId, User};
use crate::model::{AccessControlEntry, Lock, Project, Resource, SiblingMode};

pub mod memory;
pub mod snapshot;

pub use memory::{MemoryPrincipals, MemoryRepository};
pub use snapshot::{load_snapshot, RepositorySnapshot};

pub trait ResourceStore: Send + Sync {
    /// Resource at a root path regardless of state or filter.
    fn read_resource(&self, root_path: &str) -> Result<Option<Resource>>;

    fn read_resource_by_id(&self, structure_id: uuid::Uuid) -> Result<Option<Resource>>;

    /// Direct children of a folder, deleted ones included.
    fn read_child_resources(&self, folder: &Resource) -> Result<Vec<Resource>>;

    /// Every path sharing the resource id, the resource itself included.
    fn read_siblings(&self, resource: &Resource) -> Result<Vec<Resource>>;

    /// Entries set directly on the resource (keyed by resource id).
    fn read_access_control_entries(&self, resource: &Resource) -> Result<Vec<AccessControlEntry>>;

    /// Lock recorded exactly at `root_path`.
    fn read_lock(&self, root_path: &str) -> Result<Option<Lock>>;

    /// Locks at `root_path` or below it.
    fn read_locks_under(&self, root_path: &str) -> Result<Vec<Lock>>;

    fn write_lock(&self, lock: Lock) -> Result<()>;

    fn remove_lock(&self, root_path: &str) -> Result<Option<Lock>>;

    /// Delete a single node. New resources vanish, others are marked deleted; with
    /// [`SiblingMode::RemoveSiblings`] every sibling is deleted too.
    fn delete_resource(&self, project: &Project, resource: &Resource, mode: SiblingMode) -> Result<()>;

    /// Move a single node to `destination`, children are not touched.
    fn move_resource(&self, project: &Project, resource: &Resource, destination: &str) -> Result<Resource>;

    /// Restore the online version of a node. With `undo_move` the online path is restored as well.
    fn undo_resource(&self, project: &Project, resource: &Resource, undo_move: bool) -> Result<Resource>;
}

/// Group lookup options for [`PrincipalStore::groups_of_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuery {
    /// Restrict to groups in this OU (canonical fqn, "" = root)
    pub ou_fqn: String,
    pub include_sub_ous: bool,
    pub roles_only: bool,
    /// Skip groups reached only through group parents
    pub direct_only: bool,
}

impl GroupQuery {
    /// Role groups across every OU, whether joined directly or through a group parent.
    pub fn roles() -> Self {
        Self { ou_fqn: String::new(), include_sub_ous: true, roles_only: true, direct_only: false }
    }

    /// Every group, transitive parents included.
    pub fn all_groups() -> Self {
        Self { ou_fqn: String::new(), include_sub_ous: true, roles_only: false, direct_only: false }
    }
}

pub trait PrincipalStore: Send + Sync {
    fn groups_of_user(&self, user: &User, query: &GroupQuery) -> Result<Vec<Group>>;

    fn read_user(&self, id: PrincipalId) -> Result<Option<User>>;

    fn read_user_by_name(&self, fqn: &str) -> Result<Option<User>>;

    fn read_group(&self, id: PrincipalId) -> Result<Option<Group>>;

    fn read_org_unit(&self, ou_fqn: &str) -> Result<Option<OrgUnit>>;

    /// Root paths forming the OU's administrative view; empty for unknown units.
    fn resources_for_org_unit(&self, ou_fqn: &str) -> Result<Vec<String>>;
}
