//! JSON repository snapshots. Principals and resources are referenced by name so snapshots can be
//! written by hand; loading resolves the names into the in-memory collaborators.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::memory::{MemoryPrincipals, MemoryRepository};
use crate::identity::org_unit::split_fqn;
use crate::identity::{Group, OrgUnit, PrincipalId, User};
use crate::model::{AccessControlEntry, AceFlags, AcePrincipal, Lock, LockKind, PermissionSet, Project, Resource, ResourceState};
use crate::model::resource::{TYPE_FOLDER, TYPE_JSP, TYPE_PLAIN};
use crate::roles::RoleKind;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RepositorySnapshot {
    #[serde(default)]
    pub project: SnapshotProject,
    #[serde(default)]
    pub org_units: Vec<OrgUnit>,
    #[serde(default)]
    pub groups: Vec<SnapshotGroup>,
    #[serde(default)]
    pub users: Vec<SnapshotUser>,
    #[serde(default)]
    pub resources: Vec<SnapshotResource>,
    #[serde(default)]
    pub aces: Vec<SnapshotAce>,
    #[serde(default)]
    pub locks: Vec<SnapshotLock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotProject {
    pub name: String,
    #[serde(default)]
    pub ou: String,
    #[serde(default)]
    pub online: bool,
    /// Fully qualified name of the manager group
    #[serde(default)]
    pub manager_group: Option<String>,
}

impl Default for SnapshotProject {
    fn default() -> Self { Self { name: "Offline".into(), ou: String::new(), online: false, manager_group: None } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotGroup {
    /// Fully qualified, e.g. `town/Editors`
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotUser {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub guest: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResource {
    pub path: String,
    /// `folder`, `jsp` or any file type name; folders are also inferred from a trailing '/'
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default = "unchanged")]
    pub state: ResourceState,
    /// Path of an earlier resource this one shares content with
    #[serde(default)]
    pub sibling_of: Option<String>,
}

fn unchanged() -> ResourceState { ResourceState::Unchanged }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAce {
    pub path: String,
    /// `user:<fqn>`, `group:<fqn>`, `all_others` or `overwrite_all`
    pub principal: String,
    pub permissions: String,
    #[serde(default)]
    pub inherit: bool,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLock {
    pub path: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default = "exclusive")]
    pub kind: LockKind,
}

fn exclusive() -> LockKind { LockKind::Exclusive }

/// Resolved snapshot contents.
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub repository: MemoryRepository,
    pub principals: MemoryPrincipals,
    pub project: Project,
}

impl LoadedSnapshot {
    pub fn user(&self, fqn: &str) -> Result<User> {
        use super::PrincipalStore;
        self.principals.read_user_by_name(fqn)?.ok_or_else(|| anyhow!("unknown user '{}'", fqn))
    }
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<LoadedSnapshot> {
    let p = path.as_ref();
    let text = std::fs::read_to_string(p).with_context(|| format!("reading snapshot {}", p.display()))?;
    let snap: RepositorySnapshot = serde_json::from_str(&text).with_context(|| format!("parsing snapshot {}", p.display()))?;
    snap.load()
}

impl RepositorySnapshot {
    pub fn load(&self) -> Result<LoadedSnapshot> {
        let principals = MemoryPrincipals::new();
        for ou in &self.org_units {
            principals.add_org_unit(OrgUnit { fqn: crate::identity::org_unit::normalize_fqn(&ou.fqn), ..ou.clone() });
        }

        let mut groups: HashMap<String, Group> = HashMap::new();
        for g in &self.groups {
            let (ou, local) = split_fqn(&g.name);
            let group = if RoleKind::from_group_name(local).is_some() { Group::role_group(&ou, local) } else { Group::new(&ou, local) };
            groups.insert(group.fqn(), group);
        }
        for g in &self.groups {
            let Some(parent_name) = &g.parent else { continue };
            let parent_id = groups.get(parent_name.as_str()).map(|p| p.id).ok_or_else(|| anyhow!("group '{}' has unknown parent '{}'", g.name, parent_name))?;
            let key = split_fqn(&g.name);
            let fqn = format!("{}{}", key.0, key.1);
            if let Some(child) = groups.get_mut(&fqn) { child.parent = Some(parent_id); }
        }
        for g in groups.values() {
            principals.add_group(g.clone());
        }

        let mut users: HashMap<String, PrincipalId> = HashMap::new();
        for u in &self.users {
            let (ou, local) = split_fqn(&u.name);
            let mut user = User::new(&ou, local);
            user.guest = u.guest;
            for gname in &u.groups {
                let g = groups.get(gname.as_str()).ok_or_else(|| anyhow!("user '{}' is in unknown group '{}'", u.name, gname))?;
                user = user.with_group(g);
            }
            users.insert(user.fqn(), user.id);
            principals.add_user(user);
        }

        let repository = MemoryRepository::new();
        for r in &self.resources {
            crate::paths::validate_root_path(&r.path)?;
            let type_name = r.type_name.clone().unwrap_or_else(|| if r.path.ends_with('/') { TYPE_FOLDER.to_string() } else { TYPE_PLAIN.to_string() });
            let base = match &r.sibling_of {
                Some(other) => repository.resource(other).ok_or_else(|| anyhow!("'{}' is a sibling of unknown '{}'", r.path, other))?.sibling(&r.path),
                None if type_name == TYPE_FOLDER => Resource::folder(&r.path),
                None if type_name == TYPE_JSP => Resource::jsp(&r.path),
                None => Resource { type_name: type_name.clone(), ..Resource::file(&r.path) },
            };
            let resource = base.with_state(r.state);
            if r.state.is_new() {
                repository.add_resource(resource);
            } else {
                repository.set_online_version(resource.clone().with_state(ResourceState::Unchanged));
                repository.add_resource(resource);
            }
        }

        for a in &self.aces {
            let target = repository.resource(&a.path).ok_or_else(|| anyhow!("ACE on unknown resource '{}'", a.path))?;
            let principal = parse_ace_principal(&a.principal, &users, &groups)?;
            let permissions: PermissionSet = a.permissions.parse()?;
            let mut flags = AceFlags::empty();
            if a.inherit { flags |= AceFlags::INHERIT; }
            if a.overwrite { flags |= AceFlags::OVERWRITE; }
            repository.add_ace(AccessControlEntry::new(target.resource_id, principal, permissions).with_flags(flags));
        }

        for l in &self.locks {
            let owner = match &l.owner {
                Some(name) => Some(*users.get(name.as_str()).ok_or_else(|| anyhow!("lock owner '{}' is unknown", name))?),
                None => None,
            };
            if owner.is_none() && l.kind != LockKind::System {
                bail!("lock on '{}' needs an owner", l.path);
            }
            repository.add_lock(Lock { root_path: l.path.clone(), owner, kind: l.kind, acquired_at: chrono::Utc::now() });
        }

        let mut project = if self.project.online { Project::online() } else { Project::offline(&self.project.name, &self.project.ou) };
        if let Some(mg) = &self.project.manager_group {
            let g = groups.get(mg.as_str()).ok_or_else(|| anyhow!("unknown manager group '{}'", mg))?;
            project = project.with_manager_group(g.id);
        }

        Ok(LoadedSnapshot { repository, principals, project })
    }
}

fn parse_ace_principal(raw: &str, users: &HashMap<String, PrincipalId>, groups: &HashMap<String, Group>) -> Result<AcePrincipal> {
    match raw {
        "all_others" => return Ok(AcePrincipal::AllOthers),
        "overwrite_all" => return Ok(AcePrincipal::OverwriteAll),
        _ => {}
    }
    if let Some(name) = raw.strip_prefix("user:") {
        return users.get(name).map(|id| AcePrincipal::User(*id)).ok_or_else(|| anyhow!("unknown user '{}'", name));
    }
    if let Some(name) = raw.strip_prefix("group:") {
        return groups.get(name).map(|g| AcePrincipal::Group(g.id)).ok_or_else(|| anyhow!("unknown group '{}'", name));
    }
    bail!("unrecognized ACE principal '{}'", raw)
}
