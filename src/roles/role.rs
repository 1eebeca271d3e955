//! Built-in roles as an explicit tree.
//!
//! Each [`RoleKind`] has a parent; holding a role implies holding every role below it. A role is
//! held through membership in its role group (e.g. `town/RoleEditors`) or in the role group of
//! any ancestor. Roles marked OU-independent live in the root OU and match only by exact group
//! name; all others match by local name and OU-prefix.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::identity::org_unit::{normalize_fqn, split_fqn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    RootAdmin,
    WorkplaceManager,
    DatabaseManager,
    Administrator,
    ProjectManager,
    AccountManager,
    VfsManager,
    Developer,
    Editor,
    WorkplaceUser,
}

pub const ALL_ROLE_KINDS: [RoleKind; 10] = [
    RoleKind::RootAdmin,
    RoleKind::WorkplaceManager,
    RoleKind::DatabaseManager,
    RoleKind::Administrator,
    RoleKind::ProjectManager,
    RoleKind::AccountManager,
    RoleKind::VfsManager,
    RoleKind::Developer,
    RoleKind::Editor,
    RoleKind::WorkplaceUser,
];

impl RoleKind {
    pub fn parent(self) -> Option<RoleKind> {
        use RoleKind::*;
        match self {
            RootAdmin => None,
            WorkplaceManager | DatabaseManager | Administrator => Some(RootAdmin),
            ProjectManager | AccountManager | VfsManager => Some(Administrator),
            Developer => Some(VfsManager),
            Editor => Some(ProjectManager),
            WorkplaceUser => Some(Editor),
        }
    }

    /// Local name of the group that carries this role.
    pub fn group_name(self) -> &'static str {
        use RoleKind::*;
        match self {
            RootAdmin => "RoleRootAdmins",
            WorkplaceManager => "RoleWorkplaceManager",
            DatabaseManager => "RoleDatabaseManager",
            Administrator => "RoleAdministrators",
            ProjectManager => "RoleProjectmanagers",
            AccountManager => "RoleAccountManagers",
            VfsManager => "RoleVfsManagers",
            Developer => "RoleDevelopers",
            Editor => "RoleEditors",
            WorkplaceUser => "RoleWorkplaceUsers",
        }
    }

    pub fn is_ou_independent(self) -> bool {
        matches!(self, RoleKind::RootAdmin | RoleKind::WorkplaceManager | RoleKind::DatabaseManager)
    }

    /// Self followed by every ancestor up to the root.
    pub fn chain(self) -> Vec<RoleKind> {
        let mut out = vec![self];
        let mut cur = self.parent();
        while let Some(k) = cur {
            out.push(k);
            cur = k.parent();
        }
        out
    }

    pub fn from_group_name(local: &str) -> Option<RoleKind> {
        ALL_ROLE_KINDS.iter().copied().find(|k| k.group_name() == local)
    }

    pub fn name(self) -> &'static str {
        use RoleKind::*;
        match self {
            RootAdmin => "ROOT_ADMIN",
            WorkplaceManager => "WORKPLACE_MANAGER",
            DatabaseManager => "DATABASE_MANAGER",
            Administrator => "ADMINISTRATOR",
            ProjectManager => "PROJECT_MANAGER",
            AccountManager => "ACCOUNT_MANAGER",
            VfsManager => "VFS_MANAGER",
            Developer => "DEVELOPER",
            Editor => "EDITOR",
            WorkplaceUser => "WORKPLACE_USER",
        }
    }
}

/// A role, optionally bound to an organizational unit. `ou_fqn == None` means any OU.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    kind: RoleKind,
    ou_fqn: Option<String>,
}

impl Role {
    pub const ROOT_ADMIN: Role = Role::unscoped(RoleKind::RootAdmin);
    pub const WORKPLACE_MANAGER: Role = Role::unscoped(RoleKind::WorkplaceManager);
    pub const DATABASE_MANAGER: Role = Role::unscoped(RoleKind::DatabaseManager);
    pub const ADMINISTRATOR: Role = Role::unscoped(RoleKind::Administrator);
    pub const PROJECT_MANAGER: Role = Role::unscoped(RoleKind::ProjectManager);
    pub const ACCOUNT_MANAGER: Role = Role::unscoped(RoleKind::AccountManager);
    pub const VFS_MANAGER: Role = Role::unscoped(RoleKind::VfsManager);
    pub const DEVELOPER: Role = Role::unscoped(RoleKind::Developer);
    pub const EDITOR: Role = Role::unscoped(RoleKind::Editor);
    pub const WORKPLACE_USER: Role = Role::unscoped(RoleKind::WorkplaceUser);

    pub const fn unscoped(kind: RoleKind) -> Self { Self { kind, ou_fqn: None } }

    /// Same role bound to `ou_fqn`; `None` yields the unscoped role.
    pub fn for_org_unit(&self, ou_fqn: Option<&str>) -> Role {
        Role { kind: self.kind, ou_fqn: ou_fqn.map(normalize_fqn) }
    }

    pub fn kind(&self) -> RoleKind { self.kind }

    pub fn ou_fqn(&self) -> Option<&str> { self.ou_fqn.as_deref() }

    pub fn is_ou_independent(&self) -> bool { self.kind.is_ou_independent() }

    /// Group name carrying this role, qualified by the role's OU (root OU when unscoped or
    /// OU-independent).
    pub fn group_name(&self) -> String {
        if self.kind.is_ou_independent() {
            return self.kind.group_name().to_string();
        }
        format!("{}{}", self.ou_fqn.as_deref().unwrap_or(""), self.kind.group_name())
    }

    /// Group names of self and ancestors, most specific first.
    pub fn distinct_group_names(&self) -> Vec<&'static str> {
        self.kind.chain().into_iter().map(RoleKind::group_name).collect()
    }

    /// True when membership in the group named `group_fqn` implies this role.
    pub fn matches(&self, group_fqn: &str) -> bool {
        let (group_ou, local) = split_fqn(group_fqn);
        self.kind.chain().into_iter().any(|k| {
            if k.group_name() != local { return false; }
            if k.is_ou_independent() {
                return group_ou.is_empty();
            }
            match &self.ou_fqn {
                None => true,
                Some(role_ou) => role_ou.starts_with(group_ou.as_str()),
            }
        })
    }

    pub fn is_held_by<'a, I: IntoIterator<Item = &'a str>>(&self, group_fqns: I) -> bool {
        group_fqns.into_iter().any(|g| self.matches(g))
    }

    /// The role carried by a role group, scoped to the group's OU.
    pub fn value_of(group_fqn: &str) -> Option<Role> {
        let (ou, local) = split_fqn(group_fqn);
        let kind = RoleKind::from_group_name(local)?;
        if kind.is_ou_independent() {
            return if ou.is_empty() { Some(Role::unscoped(kind)) } else { None };
        }
        Some(Role { kind, ou_fqn: Some(ou) })
    }

    pub fn name(&self) -> &'static str { self.kind.name() }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.ou_fqn {
            Some(ou) if !self.kind.is_ou_independent() => write!(f, "{}@{}", self.name(), ou),
            _ => write!(f, "{}", self.name()),
        }
    }
}
