use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    Unchanged,
    Changed,
    New,
    Deleted,
}

impl ResourceState {
    pub fn is_new(self) -> bool { self == ResourceState::New }
    pub fn is_deleted(self) -> bool { self == ResourceState::Deleted }
    pub fn is_unchanged(self) -> bool { self == ResourceState::Unchanged }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Folder,
    File,
}

/// How deleting a resource treats the other paths that share its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingMode {
    PreserveSiblings,
    RemoveSiblings,
}

pub const TYPE_FOLDER: &str = "folder";
pub const TYPE_PLAIN: &str = "plain";
pub const TYPE_JSP: &str = "jsp";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    /// Identity of this path entry
    #[serde(default = "Uuid::new_v4")]
    pub structure_id: Uuid,
    /// Identity of the content; siblings share it
    #[serde(default = "Uuid::new_v4")]
    pub resource_id: Uuid,
    pub root_path: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub type_name: String,
    pub state: ResourceState,
    #[serde(default)]
    pub date_released: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_expired: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn folder(root_path: &str) -> Self {
        let path = if root_path.ends_with('/') { root_path.to_string() } else { format!("{}/", root_path) };
        Self::build(&path, ResourceKind::Folder, TYPE_FOLDER)
    }

    pub fn file(root_path: &str) -> Self {
        Self::build(root_path, ResourceKind::File, TYPE_PLAIN)
    }

    pub fn jsp(root_path: &str) -> Self {
        Self::build(root_path, ResourceKind::File, TYPE_JSP)
    }

    fn build(root_path: &str, kind: ResourceKind, type_name: &str) -> Self {
        Self {
            structure_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            root_path: paths::normalize_nfc(root_path),
            kind,
            type_name: type_name.to_string(),
            state: ResourceState::Unchanged,
            date_released: None,
            date_expired: None,
        }
    }

    /// A new path entry sharing this resource's content.
    pub fn sibling(&self, root_path: &str) -> Self {
        Self { structure_id: Uuid::new_v4(), root_path: paths::normalize_nfc(root_path), ..self.clone() }
    }

    pub fn with_state(mut self, state: ResourceState) -> Self {
        self.state = state;
        self
    }

    pub fn with_release_window(mut self, released: Option<DateTime<Utc>>, expired: Option<DateTime<Utc>>) -> Self {
        self.date_released = released;
        self.date_expired = expired;
        self
    }

    pub fn is_folder(&self) -> bool { self.kind == ResourceKind::Folder }

    pub fn is_file(&self) -> bool { self.kind == ResourceKind::File }

    pub fn is_jsp(&self) -> bool { self.type_name == TYPE_JSP }

    pub fn name(&self) -> &str { paths::resource_name(&self.root_path) }

    pub fn parent_folder(&self) -> Option<String> { paths::parent_folder(&self.root_path) }

    pub fn is_released_at(&self, at: DateTime<Utc>) -> bool {
        self.date_released.map(|d| d <= at).unwrap_or(true)
    }

    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.date_expired.map(|d| d <= at).unwrap_or(false)
    }
}
