//! Repository data model: permissions, ACLs, resources, filters, locks and projects.

pub mod acl;
pub mod filter;
pub mod lock;
pub mod permissions;
pub mod project;
pub mod resource;

pub use acl::{AccessControlEntry, AccessControlList, AceFlags, AcePrincipal};
pub use filter::ResourceFilter;
pub use lock::{Lock, LockKind};
pub use permissions::{Permission, PermissionSet};
pub use project::{Project, ProjectState};
pub use resource::{Resource, ResourceKind, ResourceState, SiblingMode};
