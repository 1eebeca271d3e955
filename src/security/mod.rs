//! Authorization gate: permission resolution, lock checks, tree operations and publish validation.

pub mod hooks;
pub mod lock_gate;
mod manager;
pub mod permission_handler;
pub mod publish;
pub mod resolver;
pub mod tree_ops;

#[cfg(test)]
pub(crate) mod fixture;

pub use lock_gate::LockGate;
pub use manager::SecurityManager;
pub use permission_handler::{AclPermissionHandler, PermissionHandler};
pub use publish::{PublishList, PublishPermissionValidator};
pub use resolver::{CheckResult, PermissionResolver};
pub use tree_ops::{TreeOperationCoordinator, TreeOutcome, TreePhase, UndoMode};
