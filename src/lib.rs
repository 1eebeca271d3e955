//! Permission and role resolution gate for a hierarchical content repository.
//! Every read or mutation of a resource passes through [`security::SecurityManager`]
//! before it reaches the storage collaborators in [`store`].

pub mod error;
pub mod config;
pub mod paths;
pub mod identity;
pub mod model;
pub mod roles;
pub mod store;
pub mod security;

pub use error::{LockFailure, SecurityError, SecurityResult, StateFailure};
pub use security::{CheckResult, PermissionResolver, SecurityManager};

// Test-only printing helper: expands to eprintln! during tests and is absent otherwise.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
