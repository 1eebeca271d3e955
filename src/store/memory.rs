//! In-memory collaborators. Used by tests, benches and the snapshot tool.
//! Both stores record the calls the gate makes so traversal properties can be asserted.

use anyhow::{anyhow, bail, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use super::{GroupQuery, PrincipalStore, ResourceStore};
use crate::identity::org_unit::{is_nested_under, normalize_fqn};
use crate::identity::{Group, OrgUnit, PrincipalId, User};
use crate::model::{AccessControlEntry, Lock, Project, Resource, ResourceState, SiblingMode};
use crate::paths;

#[derive(Debug, Default)]
struct RepoState {
    /// Offline view keyed by root path
    resources: BTreeMap<String, Resource>,
    /// Online versions keyed by structure id
    online: HashMap<Uuid, Resource>,
    aces: HashMap<Uuid, Vec<AccessControlEntry>>,
    locks: BTreeMap<String, Lock>,
}

#[derive(Debug, Default)]
struct CallLog {
    deletes: HashMap<Uuid, usize>,
    deleted_paths: Vec<String>,
    moves: Vec<(String, String)>,
    undos: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: RwLock<RepoState>,
    calls: RwLock<CallLog>,
}

impl MemoryRepository {
    /// Repository holding only the root folder.
    pub fn new() -> Self {
        let repo = Self::default();
        repo.add_resource(Resource::folder("/"));
        repo
    }

    pub fn add_resource(&self, resource: Resource) -> Resource {
        self.state.write().resources.insert(resource.root_path.clone(), resource.clone());
        resource
    }

    /// Add a resource and record it as published unchanged.
    pub fn add_published(&self, resource: Resource) -> Resource {
        let mut st = self.state.write();
        st.online.insert(resource.structure_id, resource.clone().with_state(ResourceState::Unchanged));
        st.resources.insert(resource.root_path.clone(), resource.clone());
        resource
    }

    pub fn set_online_version(&self, online: Resource) {
        self.state.write().online.insert(online.structure_id, online);
    }

    pub fn add_ace(&self, ace: AccessControlEntry) {
        self.state.write().aces.entry(ace.resource_id).or_default().push(ace);
    }

    pub fn add_lock(&self, lock: Lock) {
        self.state.write().locks.insert(lock.root_path.clone(), lock);
    }

    pub fn resource(&self, root_path: &str) -> Option<Resource> {
        self.state.read().resources.get(root_path).cloned()
    }

    pub fn lock_at(&self, root_path: &str) -> Option<Lock> {
        self.state.read().locks.get(root_path).cloned()
    }

    pub fn delete_calls(&self, resource_id: Uuid) -> usize {
        self.calls.read().deletes.get(&resource_id).copied().unwrap_or(0)
    }

    pub fn total_delete_calls(&self) -> usize {
        self.calls.read().deletes.values().sum()
    }

    /// Paths passed to `delete_resource`, in call order.
    pub fn deleted_paths(&self) -> Vec<String> {
        self.calls.read().deleted_paths.clone()
    }

    /// (source, destination) pairs passed to `move_resource`, in call order.
    pub fn moves(&self) -> Vec<(String, String)> {
        self.calls.read().moves.clone()
    }

    pub fn undos(&self) -> Vec<String> {
        self.calls.read().undos.clone()
    }

    fn apply_delete(st: &mut RepoState, root_path: &str) {
        let Some(existing) = st.resources.get(root_path).cloned() else { return };
        if existing.state.is_new() {
            st.resources.remove(root_path);
            st.locks.remove(root_path);
        } else if let Some(r) = st.resources.get_mut(root_path) {
            r.state = ResourceState::Deleted;
        }
    }
}

impl ResourceStore for MemoryRepository {
    fn read_resource(&self, root_path: &str) -> Result<Option<Resource>> {
        Ok(self.state.read().resources.get(root_path).cloned())
    }

    fn read_resource_by_id(&self, structure_id: Uuid) -> Result<Option<Resource>> {
        Ok(self.state.read().resources.values().find(|r| r.structure_id == structure_id).cloned())
    }

    fn read_child_resources(&self, folder: &Resource) -> Result<Vec<Resource>> {
        if !folder.is_folder() { return Ok(vec![]); }
        let st = self.state.read();
        Ok(st
            .resources
            .range(folder.root_path.clone()..)
            .take_while(|(p, _)| paths::is_under(p, &folder.root_path))
            .filter(|(p, _)| paths::parent_folder(p).as_deref() == Some(folder.root_path.as_str()))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn read_siblings(&self, resource: &Resource) -> Result<Vec<Resource>> {
        let st = self.state.read();
        Ok(st.resources.values().filter(|r| r.resource_id == resource.resource_id).cloned().collect())
    }

    fn read_access_control_entries(&self, resource: &Resource) -> Result<Vec<AccessControlEntry>> {
        Ok(self.state.read().aces.get(&resource.resource_id).cloned().unwrap_or_default())
    }

    fn read_lock(&self, root_path: &str) -> Result<Option<Lock>> {
        Ok(self.state.read().locks.get(root_path).cloned())
    }

    fn read_locks_under(&self, root_path: &str) -> Result<Vec<Lock>> {
        let st = self.state.read();
        Ok(st.locks.range(root_path.to_string()..).take_while(|(p, _)| paths::is_under(p, root_path)).map(|(_, l)| l.clone()).collect())
    }

    fn write_lock(&self, lock: Lock) -> Result<()> {
        self.state.write().locks.insert(lock.root_path.clone(), lock);
        Ok(())
    }

    fn remove_lock(&self, root_path: &str) -> Result<Option<Lock>> {
        Ok(self.state.write().locks.remove(root_path))
    }

    fn delete_resource(&self, _project: &Project, resource: &Resource, mode: SiblingMode) -> Result<()> {
        let mut st = self.state.write();
        if !st.resources.contains_key(&resource.root_path) {
            bail!("no resource at {}", resource.root_path);
        }
        let targets: Vec<String> = match mode {
            SiblingMode::PreserveSiblings => vec![resource.root_path.clone()],
            SiblingMode::RemoveSiblings => st.resources.values().filter(|r| r.resource_id == resource.resource_id).map(|r| r.root_path.clone()).collect(),
        };
        for path in &targets {
            Self::apply_delete(&mut st, path);
        }
        let mut calls = self.calls.write();
        *calls.deletes.entry(resource.resource_id).or_insert(0) += 1;
        calls.deleted_paths.push(resource.root_path.clone());
        Ok(())
    }

    fn move_resource(&self, _project: &Project, resource: &Resource, destination: &str) -> Result<Resource> {
        let mut st = self.state.write();
        if st.resources.contains_key(destination) {
            bail!("destination {} already exists", destination);
        }
        let mut moved = st.resources.remove(&resource.root_path).ok_or_else(|| anyhow!("no resource at {}", resource.root_path))?;
        moved.root_path = destination.to_string();
        if !moved.state.is_new() && !moved.state.is_deleted() {
            moved.state = ResourceState::Changed;
        }
        st.resources.insert(destination.to_string(), moved.clone());
        self.calls.write().moves.push((resource.root_path.clone(), destination.to_string()));
        Ok(moved)
    }

    fn undo_resource(&self, _project: &Project, resource: &Resource, undo_move: bool) -> Result<Resource> {
        let mut st = self.state.write();
        let online = st.online.get(&resource.structure_id).cloned().ok_or_else(|| anyhow!("no online version of {}", resource.root_path))?;
        let current = st.resources.remove(&resource.root_path).ok_or_else(|| anyhow!("no resource at {}", resource.root_path))?;
        let path = if undo_move { online.root_path.clone() } else { current.root_path.clone() };
        let restored = Resource { root_path: path.clone(), state: ResourceState::Unchanged, ..online };
        st.resources.insert(path, restored.clone());
        self.calls.write().undos.push(resource.root_path.clone());
        Ok(restored)
    }
}

#[derive(Debug, Default)]
struct PrincipalState {
    users: HashMap<PrincipalId, User>,
    groups: HashMap<PrincipalId, Group>,
    org_units: BTreeMap<String, OrgUnit>,
}

#[derive(Debug)]
pub struct MemoryPrincipals {
    state: RwLock<PrincipalState>,
    membership_reads: AtomicUsize,
}

impl Default for MemoryPrincipals {
    fn default() -> Self {
        let p = Self { state: RwLock::new(PrincipalState::default()), membership_reads: AtomicUsize::new(0) };
        p.add_org_unit(OrgUnit::root());
        p
    }
}

impl MemoryPrincipals {
    pub fn new() -> Self { Self::default() }

    pub fn add_user(&self, user: User) -> User {
        self.state.write().users.insert(user.id, user.clone());
        user
    }

    pub fn add_group(&self, group: Group) -> Group {
        self.state.write().groups.insert(group.id, group.clone());
        group
    }

    pub fn add_org_unit(&self, ou: OrgUnit) -> OrgUnit {
        self.state.write().org_units.insert(ou.fqn.clone(), ou.clone());
        ou
    }

    /// Add a direct membership. Callers must report the change to the role cache.
    pub fn add_user_to_group(&self, user: PrincipalId, group: PrincipalId) -> Result<()> {
        let mut st = self.state.write();
        if !st.groups.contains_key(&group) { bail!("unknown group {}", group); }
        let u = st.users.get_mut(&user).ok_or_else(|| anyhow!("unknown user {}", user))?;
        if !u.groups.contains(&group) { u.groups.push(group); }
        Ok(())
    }

    pub fn remove_user_from_group(&self, user: PrincipalId, group: PrincipalId) -> Result<()> {
        let mut st = self.state.write();
        let u = st.users.get_mut(&user).ok_or_else(|| anyhow!("unknown user {}", user))?;
        u.groups.retain(|g| *g != group);
        Ok(())
    }

    pub fn group_by_name(&self, fqn: &str) -> Option<Group> {
        self.state.read().groups.values().find(|g| g.fqn() == fqn).cloned()
    }

    /// Number of `groups_of_user` calls served so far.
    pub fn membership_reads(&self) -> usize { self.membership_reads.load(Ordering::Relaxed) }
}

impl PrincipalStore for MemoryPrincipals {
    fn groups_of_user(&self, user: &User, query: &GroupQuery) -> Result<Vec<Group>> {
        self.membership_reads.fetch_add(1, Ordering::Relaxed);
        let st = self.state.read();
        // Memberships are read from the stored user so that changes are visible
        let direct = st.users.get(&user.id).map(|u| u.groups.clone()).unwrap_or_else(|| user.groups.clone());
        let mut seen: HashSet<PrincipalId> = HashSet::new();
        let mut out = Vec::new();
        let mut pending = direct;
        while let Some(id) = pending.pop() {
            if !seen.insert(id) { continue; }
            let Some(g) = st.groups.get(&id) else { continue };
            if !query.direct_only {
                if let Some(parent) = g.parent { pending.push(parent); }
            }
            if !g.enabled { continue; }
            if query.roles_only && !g.role_group { continue; }
            let in_scope = if query.include_sub_ous { is_nested_under(&g.ou_fqn, &query.ou_fqn) } else { g.ou_fqn == normalize_fqn(&query.ou_fqn) };
            if in_scope { out.push(g.clone()); }
        }
        out.sort_by_key(|g| g.fqn());
        Ok(out)
    }

    fn read_user(&self, id: PrincipalId) -> Result<Option<User>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    fn read_user_by_name(&self, fqn: &str) -> Result<Option<User>> {
        Ok(self.state.read().users.values().find(|u| u.fqn() == fqn).cloned())
    }

    fn read_group(&self, id: PrincipalId) -> Result<Option<Group>> {
        Ok(self.state.read().groups.get(&id).cloned())
    }

    fn read_org_unit(&self, ou_fqn: &str) -> Result<Option<OrgUnit>> {
        Ok(self.state.read().org_units.get(&normalize_fqn(ou_fqn)).cloned())
    }

    fn resources_for_org_unit(&self, ou_fqn: &str) -> Result<Vec<String>> {
        Ok(self.state.read().org_units.get(&normalize_fqn(ou_fqn)).map(|ou| ou.resources.clone()).unwrap_or_default())
    }
}
