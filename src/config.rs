use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Global gate settings applied to every repository unless overridden.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalSecurityConfig {
    /// Upper bound for the process-wide role cache before eviction kicks in
    pub role_cache_max_entries: usize,
    /// Writing a JSP resource requires the developer role for that resource
    pub jsp_write_requires_developer: bool,
    /// VFS managers for a resource get every permission on it
    pub vfs_manager_bypass: bool,
    /// Re-lock the destination of a move under the acting principal
    pub relock_after_move: bool,
    /// Revoke write/control whenever the current project is the online project
    pub online_project_denies_write: bool,
}

impl Default for GlobalSecurityConfig {
    fn default() -> Self {
        Self {
            role_cache_max_entries: 10_000,
            jsp_write_requires_developer: true,
            vfs_manager_bypass: true,
            relock_after_move: true,
            online_project_denies_write: true,
        }
    }
}

/// Per-repository configuration. Unspecified values inherit from Global.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepositorySecurityConfig {
    /// Enable/disable permission evaluation entirely (dev bypass)
    pub security_check_enabled: bool,
    pub role_cache_max_entries: Option<usize>,
    pub jsp_write_requires_developer: Option<bool>,
    pub vfs_manager_bypass: Option<bool>,
    pub relock_after_move: Option<bool>,
    pub online_project_denies_write: Option<bool>,
}

impl Default for RepositorySecurityConfig {
    fn default() -> Self {
        Self {
            security_check_enabled: true,
            role_cache_max_entries: None,
            jsp_write_requires_developer: None,
            vfs_manager_bypass: None,
            relock_after_move: None,
            online_project_denies_write: None,
        }
    }
}

/// Fully resolved effective config used during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectiveConfig {
    pub security_check_enabled: bool,
    pub role_cache_max_entries: usize,
    pub jsp_write_requires_developer: bool,
    pub vfs_manager_bypass: bool,
    pub relock_after_move: bool,
    pub online_project_denies_write: bool,
}

impl EffectiveConfig {
    /// Build an effective config from Global + Repository layers; repository overrides win.
    pub fn from_layers(global: &GlobalSecurityConfig, repo: &RepositorySecurityConfig) -> Self {
        Self {
            security_check_enabled: repo.security_check_enabled,
            role_cache_max_entries: repo.role_cache_max_entries.unwrap_or(global.role_cache_max_entries),
            jsp_write_requires_developer: repo.jsp_write_requires_developer.unwrap_or(global.jsp_write_requires_developer),
            vfs_manager_bypass: repo.vfs_manager_bypass.unwrap_or(global.vfs_manager_bypass),
            relock_after_move: repo.relock_after_move.unwrap_or(global.relock_after_move),
            online_project_denies_write: repo.online_project_denies_write.unwrap_or(global.online_project_denies_write),
        }
    }

    /// Parse both layers from JSON documents. Missing keys fall back to defaults.
    pub fn from_json_layers(global_json: &str, repo_json: &str) -> Result<Self> {
        let global: GlobalSecurityConfig = if global_json.trim().is_empty() { GlobalSecurityConfig::default() } else { serde_json::from_str(global_json)? };
        let repo: RepositorySecurityConfig = if repo_json.trim().is_empty() { RepositorySecurityConfig::default() } else { serde_json::from_str(repo_json)? };
        Ok(Self::from_layers(&global, &repo))
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self::from_layers(&GlobalSecurityConfig::default(), &RepositorySecurityConfig::default())
    }
}
