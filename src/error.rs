//! Unified security error model.
//! Every violation kind the gate can raise is one variant of [`SecurityError`]; blocking call
//! sites build these from a [`crate::security::CheckResult`] and embedding services map them to
//! their own protocol via [`SecurityError::http_status`].

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Why a lock precondition failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LockFailure {
    /// The resource is not locked by the acting principal. `holder` names whoever holds it, if anyone.
    NotLocked { holder: Option<String> },
    /// The resource is locked by someone else and cannot be locked.
    LockedByOther { holder: String },
    /// A system lock sits on the resource or somewhere below it.
    SystemLocked,
}

impl Display for LockFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LockFailure::NotLocked { holder: Some(h) } => write!(f, "not locked by the current user (held by {})", h),
            LockFailure::NotLocked { holder: None } => write!(f, "not locked"),
            LockFailure::LockedByOther { holder } => write!(f, "locked by {}", holder),
            LockFailure::SystemLocked => write!(f, "system locked"),
        }
    }
}

/// Project or resource state that forbids the requested operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateFailure {
    OnlineProject { project: String },
    ParentFolderNew { parent: String, resource: String },
    ParentFolderDeleted { parent: String, resource: String },
    NewResourceUndo { path: String },
    DestinationExists { path: String },
}

impl Display for StateFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StateFailure::OnlineProject { project } => write!(f, "project '{}' is the online project", project),
            StateFailure::ParentFolderNew { parent, resource } => write!(f, "parent folder {} of {} is new", parent, resource),
            StateFailure::ParentFolderDeleted { parent, resource } => write!(f, "parent folder {} of {} is deleted", parent, resource),
            StateFailure::NewResourceUndo { path } => write!(f, "cannot undo changes of new resource {}", path),
            StateFailure::DestinationExists { path } => write!(f, "destination {} already exists", path),
        }
    }
}

fn scope_suffix(scope: &Option<String>) -> String {
    match scope {
        Some(s) => format!(" for {}", s),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("permission denied on {path}: missing {missing}")]
    PermissionViolation { path: String, missing: String },
    #[error("resource not found: {path}")]
    NotFound { path: String },
    #[error("lock violation on {path}: {kind}")]
    LockViolation { path: String, kind: LockFailure },
    #[error("'{principal}' lacks role {role}{}", scope_suffix(.scope))]
    RoleViolation { principal: String, role: String, scope: Option<String> },
    #[error("state violation: {0}")]
    StateViolation(StateFailure),
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("{} security violations", .0.len())]
    Aggregate(Vec<SecurityError>),
    /// Opaque failure from a storage collaborator; never an authorization decision.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SecurityError {
    pub fn permission<S: Into<String>>(path: S, missing: S) -> Self { SecurityError::PermissionViolation { path: path.into(), missing: missing.into() } }
    pub fn not_found<S: Into<String>>(path: S) -> Self { SecurityError::NotFound { path: path.into() } }
    pub fn lock<S: Into<String>>(path: S, kind: LockFailure) -> Self { SecurityError::LockViolation { path: path.into(), kind } }
    pub fn role<S: Into<String>>(principal: S, role: S, scope: Option<String>) -> Self { SecurityError::RoleViolation { principal: principal.into(), role: role.into(), scope } }
    pub fn state(kind: StateFailure) -> Self { SecurityError::StateViolation(kind) }
    pub fn invalid_path<S: Into<String>>(path: S, reason: S) -> Self { SecurityError::InvalidPath { path: path.into(), reason: reason.into() } }

    pub fn code_str(&self) -> &'static str {
        match self {
            SecurityError::PermissionViolation { .. } => "permission_violation",
            SecurityError::NotFound { .. } => "not_found",
            SecurityError::LockViolation { .. } => "lock_violation",
            SecurityError::RoleViolation { .. } => "role_violation",
            SecurityError::StateViolation(_) => "state_violation",
            SecurityError::InvalidPath { .. } => "invalid_path",
            SecurityError::Aggregate(_) => "aggregate_violation",
            SecurityError::Store(_) => "store_error",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            SecurityError::PermissionViolation { .. } | SecurityError::RoleViolation { .. } => 403,
            SecurityError::NotFound { .. } => 404,
            SecurityError::LockViolation { .. } => 423,
            SecurityError::StateViolation(_) | SecurityError::Aggregate(_) => 409,
            SecurityError::InvalidPath { .. } => 400,
            SecurityError::Store(_) => 500,
        }
    }

    /// Leaf violations, with aggregates flattened.
    pub fn violations(&self) -> Vec<&SecurityError> {
        match self {
            SecurityError::Aggregate(inner) => inner.iter().flat_map(|e| e.violations()).collect(),
            other => vec![other],
        }
    }

    pub fn is_store(&self) -> bool { matches!(self, SecurityError::Store(_)) }
}

pub type SecurityResult<T> = Result<T, SecurityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(SecurityError::permission("/a", "+w").http_status(), 403);
        assert_eq!(SecurityError::not_found("/a").http_status(), 404);
        assert_eq!(SecurityError::lock("/a", LockFailure::SystemLocked).http_status(), 423);
        assert_eq!(SecurityError::role("u", "ADMINISTRATOR", None).http_status(), 403);
        assert_eq!(SecurityError::state(StateFailure::OnlineProject { project: "Online".into() }).http_status(), 409);
        assert_eq!(SecurityError::Aggregate(vec![]).http_status(), 409);
        assert_eq!(SecurityError::from(anyhow::anyhow!("disk gone")).http_status(), 500);
    }

    #[test]
    fn messages_name_the_context() {
        let e = SecurityError::lock("/a/b", LockFailure::NotLocked { holder: Some("Admin".into()) });
        assert_eq!(e.to_string(), "lock violation on /a/b: not locked by the current user (held by Admin)");
        let e = SecurityError::role("town/jane", "DEVELOPER", Some("town/".into()));
        assert_eq!(e.to_string(), "'town/jane' lacks role DEVELOPER for town/");
        let e = SecurityError::role("town/jane", "DEVELOPER", None);
        assert_eq!(e.to_string(), "'town/jane' lacks role DEVELOPER");
    }

    #[test]
    fn aggregate_flattens_violations() {
        let agg = SecurityError::Aggregate(vec![
            SecurityError::permission("/a", "+d"),
            SecurityError::Aggregate(vec![SecurityError::not_found("/b")]),
        ]);
        let codes: Vec<&str> = agg.violations().iter().map(|e| e.code_str()).collect();
        assert_eq!(codes, vec!["permission_violation", "not_found"]);
        assert_eq!(agg.to_string(), "2 security violations");
    }

    #[test]
    fn store_errors_stay_opaque() {
        let e: SecurityError = anyhow::anyhow!("connection reset").into();
        assert!(e.is_store());
        assert_eq!(e.to_string(), "connection reset");
    }
}
