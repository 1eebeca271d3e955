use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::org_unit::normalize_fqn;
use crate::identity::PrincipalId;

pub const ONLINE_PROJECT_NAME: &str = "Online";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectState {
    Online,
    Offline,
    /// Offline project deleted after its first publish
    Temporary,
}

/// A workspace: the single online project or an offline editing project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub ou_fqn: String,
    pub state: ProjectState,
    /// Members of this group manage the project
    #[serde(default)]
    pub manager_group: Option<PrincipalId>,
    #[serde(default)]
    pub user_group: Option<PrincipalId>,
}

impl Project {
    pub fn online() -> Self {
        Self { id: Uuid::nil(), name: ONLINE_PROJECT_NAME.to_string(), ou_fqn: String::new(), state: ProjectState::Online, manager_group: None, user_group: None }
    }

    pub fn offline(name: &str, ou_fqn: &str) -> Self {
        Self { id: Uuid::new_v4(), name: name.to_string(), ou_fqn: normalize_fqn(ou_fqn), state: ProjectState::Offline, manager_group: None, user_group: None }
    }

    pub fn with_manager_group(mut self, group: PrincipalId) -> Self {
        self.manager_group = Some(group);
        self
    }

    pub fn is_online(&self) -> bool { self.state == ProjectState::Online }
}
