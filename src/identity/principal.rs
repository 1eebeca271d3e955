use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use super::org_unit::{join_fqn, normalize_fqn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    pub fn new() -> Self { PrincipalId(Uuid::new_v4()) }
}

impl Default for PrincipalId {
    fn default() -> Self { Self::new() }
}

impl Display for PrincipalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

fn default_true() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: PrincipalId,
    /// Local name inside the organizational unit
    pub name: String,
    #[serde(default)]
    pub ou_fqn: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub guest: bool,
    /// Direct group memberships; transitive closure is resolved by the principal store
    #[serde(default)]
    pub groups: Vec<PrincipalId>,
}

impl User {
    pub fn new(ou_fqn: &str, name: &str) -> Self {
        Self { id: PrincipalId::new(), name: name.to_string(), ou_fqn: normalize_fqn(ou_fqn), enabled: true, guest: false, groups: vec![] }
    }

    pub fn guest() -> Self {
        Self { guest: true, ..Self::new("", "Guest") }
    }

    pub fn with_group(mut self, group: &Group) -> Self {
        if !self.groups.contains(&group.id) { self.groups.push(group.id); }
        self
    }

    /// OU-qualified name, e.g. `town/jane`.
    pub fn fqn(&self) -> String { join_fqn(&self.ou_fqn, &self.name) }

    pub fn is_guest(&self) -> bool { self.guest }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: PrincipalId,
    pub name: String,
    #[serde(default)]
    pub ou_fqn: String,
    /// Membership in this group implies membership in the parent group
    #[serde(default)]
    pub parent: Option<PrincipalId>,
    /// Role groups carry role assignments rather than plain memberships
    #[serde(default)]
    pub role_group: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Group {
    pub fn new(ou_fqn: &str, name: &str) -> Self {
        Self { id: PrincipalId::new(), name: name.to_string(), ou_fqn: normalize_fqn(ou_fqn), parent: None, role_group: false, enabled: true }
    }

    pub fn role_group(ou_fqn: &str, name: &str) -> Self {
        Self { role_group: true, ..Self::new(ou_fqn, name) }
    }

    pub fn with_parent(mut self, parent: &Group) -> Self {
        self.parent = Some(parent.id);
        self
    }

    pub fn fqn(&self) -> String { join_fqn(&self.ou_fqn, &self.name) }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Principal {
    User(User),
    Group(Group),
}

impl Principal {
    pub fn id(&self) -> PrincipalId {
        match self {
            Principal::User(u) => u.id,
            Principal::Group(g) => g.id,
        }
    }

    pub fn fqn(&self) -> String {
        match self {
            Principal::User(u) => u.fqn(),
            Principal::Group(g) => g.fqn(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fqn_joins_ou_and_name() {
        let u = User::new("/town", "jane");
        assert_eq!(u.ou_fqn, "town/");
        assert_eq!(u.fqn(), "town/jane");
        let g = Group::new("", "Users");
        assert_eq!(g.fqn(), "Users");
        assert_eq!(Principal::Group(g.clone()).id(), g.id);
    }

    #[test]
    fn with_group_is_idempotent() {
        let g = Group::new("town", "Editors");
        let u = User::new("town", "jane").with_group(&g).with_group(&g);
        assert_eq!(u.groups, vec![g.id]);
        assert!(User::guest().is_guest());
    }
}
