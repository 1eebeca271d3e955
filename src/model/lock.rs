use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::PrincipalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    Exclusive,
    /// Exclusive lock dropped at the end of the holder's session
    Temporary,
    /// Lock on a sibling of a resource locked elsewhere
    Shared,
    /// Lock implied by an exclusive lock on a parent folder
    Inherited,
    /// Held by the system during publishing; blocks everyone
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lock {
    pub root_path: String,
    /// `None` only for system locks
    #[serde(default)]
    pub owner: Option<PrincipalId>,
    pub kind: LockKind,
    #[serde(default = "Utc::now")]
    pub acquired_at: DateTime<Utc>,
}

impl Lock {
    fn build(root_path: &str, owner: Option<PrincipalId>, kind: LockKind) -> Self {
        Self { root_path: root_path.to_string(), owner, kind, acquired_at: Utc::now() }
    }

    pub fn exclusive(root_path: &str, owner: PrincipalId) -> Self { Self::build(root_path, Some(owner), LockKind::Exclusive) }

    pub fn temporary(root_path: &str, owner: PrincipalId) -> Self { Self::build(root_path, Some(owner), LockKind::Temporary) }

    pub fn shared(root_path: &str, owner: PrincipalId) -> Self { Self::build(root_path, Some(owner), LockKind::Shared) }

    pub fn system(root_path: &str) -> Self { Self::build(root_path, None, LockKind::System) }

    /// The lock a descendant inherits from this one.
    pub fn inherited_at(&self, root_path: &str) -> Self {
        Self { root_path: root_path.to_string(), kind: LockKind::Inherited, ..self.clone() }
    }

    pub fn is_system(&self) -> bool { self.kind == LockKind::System }

    pub fn is_inherited(&self) -> bool { self.kind == LockKind::Inherited }

    /// Exclusive-style locks let the owner write; shared locks do not.
    pub fn permits_write(&self) -> bool {
        matches!(self.kind, LockKind::Exclusive | LockKind::Temporary | LockKind::Inherited)
    }

    pub fn is_owned_by(&self, principal: PrincipalId) -> bool { self.owner == Some(principal) }

    pub fn moved_to(&self, root_path: &str) -> Self {
        Self { root_path: root_path.to_string(), ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_and_kinds() {
        let me = PrincipalId::new();
        let l = Lock::exclusive("/a/", me);
        assert!(l.is_owned_by(me));
        assert!(!l.is_owned_by(PrincipalId::new()));
        assert!(l.permits_write());
        let child = l.inherited_at("/a/b.txt");
        assert!(child.is_inherited());
        assert!(child.is_owned_by(me));
        assert!(!Lock::shared("/x", me).permits_write());
        let sys = Lock::system("/a/");
        assert!(sys.is_system());
        assert_eq!(sys.owner, None);
        assert_eq!(l.moved_to("/b/").root_path, "/b/");
    }
}
