//! Organizational units: a tree of administrative scopes named by fully qualified names.
//! Canonical form is `a/b/` (no leading separator, trailing separator); the root OU is "".

use serde::{Deserialize, Serialize};

pub const OU_SEPARATOR: char = '/';

/// Canonicalize an OU name: `"/town"`, `"town"` and `"town/"` all become `"town/"`.
pub fn normalize_fqn(fqn: &str) -> String {
    let trimmed = fqn.trim_matches(OU_SEPARATOR);
    if trimmed.is_empty() { String::new() } else { format!("{}{}", trimmed, OU_SEPARATOR) }
}

/// Join a canonical OU name and a local principal name.
pub fn join_fqn(ou_fqn: &str, name: &str) -> String {
    format!("{}{}", normalize_fqn(ou_fqn), name)
}

/// Split a principal fqn such as `town/Editors` into (`town/`, `Editors`).
pub fn split_fqn(fqn: &str) -> (String, &str) {
    let fqn = fqn.trim_start_matches(OU_SEPARATOR);
    match fqn.rfind(OU_SEPARATOR) {
        Some(idx) => (fqn[..=idx].to_string(), &fqn[idx + 1..]),
        None => (String::new(), fqn),
    }
}

/// Parent of a canonical OU name; `None` for the root OU.
pub fn parent_fqn(ou_fqn: &str) -> Option<String> {
    let ou = normalize_fqn(ou_fqn);
    if ou.is_empty() { return None; }
    let inner = &ou[..ou.len() - 1];
    Some(match inner.rfind(OU_SEPARATOR) {
        Some(idx) => inner[..=idx].to_string(),
        None => String::new(),
    })
}

/// True when `ou` equals `ancestor` or is nested below it.
pub fn is_nested_under(ou: &str, ancestor: &str) -> bool {
    normalize_fqn(ou).starts_with(&normalize_fqn(ancestor))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrgUnit {
    pub fqn: String,
    #[serde(default)]
    pub description: String,
    /// Root paths forming the administrative view of this unit
    #[serde(default)]
    pub resources: Vec<String>,
}

impl OrgUnit {
    pub fn new(fqn: &str, resources: &[&str]) -> Self {
        Self { fqn: normalize_fqn(fqn), description: String::new(), resources: resources.iter().map(|s| s.to_string()).collect() }
    }

    pub fn root() -> Self { Self::new("", &["/"]) }

    pub fn is_root(&self) -> bool { self.fqn.is_empty() }

    pub fn parent_fqn(&self) -> Option<String> { parent_fqn(&self.fqn) }

    /// True when the root path falls inside one of this unit's resources.
    pub fn claims(&self, root_path: &str) -> bool {
        self.resources.iter().any(|r| root_path.starts_with(r.as_str()))
    }
}
