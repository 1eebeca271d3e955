//! Resource filters decide which existing resources a read may see. A resource that exists but
//! fails the filter is reported as absent, never as forbidden.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resource::{Resource, ResourceKind, ResourceState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "state", rename_all = "snake_case")]
pub enum StateMatch {
    Any,
    Only(ResourceState),
    Exclude(ResourceState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
    state: StateMatch,
    require_visible: bool,
    kind: Option<ResourceKind>,
    check_release: bool,
    check_expire: bool,
}

impl ResourceFilter {
    /// Everything, including deleted, invisible, unreleased and expired resources.
    pub const ALL: Self = Self { state: StateMatch::Any, require_visible: false, kind: None, check_release: false, check_expire: false };
    /// Everything that differs from the online project.
    pub const ALL_MODIFIED: Self = Self { state: StateMatch::Exclude(ResourceState::Unchanged), ..Self::ALL };
    /// Visible, not deleted, inside the release window.
    pub const DEFAULT: Self = Self { state: StateMatch::Exclude(ResourceState::Deleted), require_visible: true, kind: None, check_release: true, check_expire: true };
    /// Like [`Self::DEFAULT`] without the release window.
    pub const IGNORE_EXPIRATION: Self = Self { check_release: false, check_expire: false, ..Self::DEFAULT };
    pub const ONLY_VISIBLE: Self = Self { require_visible: true, ..Self::ALL };
    pub const ONLY_VISIBLE_NO_DELETED: Self = Self { state: StateMatch::Exclude(ResourceState::Deleted), ..Self::ONLY_VISIBLE };

    pub fn add_require_visible(mut self) -> Self {
        self.require_visible = true;
        self
    }

    pub fn add_exclude_state(mut self, state: ResourceState) -> Self {
        self.state = StateMatch::Exclude(state);
        self
    }

    pub fn add_require_state(mut self, state: ResourceState) -> Self {
        self.state = StateMatch::Only(state);
        self
    }

    pub fn add_require_folder(mut self) -> Self {
        self.kind = Some(ResourceKind::Folder);
        self
    }

    pub fn add_require_file(mut self) -> Self {
        self.kind = Some(ResourceKind::File);
        self
    }

    pub fn add_exclude_time_range(mut self) -> Self {
        self.check_release = true;
        self.check_expire = true;
        self
    }

    pub fn require_visible(&self) -> bool { self.require_visible }

    pub fn excludes_time_range(&self) -> bool { self.check_release || self.check_expire }

    /// True when the resource passes this filter at the given request time.
    pub fn is_valid(&self, now: DateTime<Utc>, resource: &Resource) -> bool {
        let state_ok = match self.state {
            StateMatch::Any => true,
            StateMatch::Only(s) => resource.state == s,
            StateMatch::Exclude(s) => resource.state != s,
        };
        if !state_ok { return false; }
        if let Some(kind) = self.kind {
            if resource.kind != kind { return false; }
        }
        if self.check_release && !resource.is_released_at(now) { return false; }
        if self.check_expire && resource.is_expired_at(now) { return false; }
        true
    }
}

impl Default for ResourceFilter {
    fn default() -> Self { Self::DEFAULT }
}
