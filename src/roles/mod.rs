//! Role model and role decision cache.

pub mod cache;
pub mod epochs;
pub mod role;

pub use cache::{global_role_cache, global_role_cache_sized, CacheEvent, NoopRoleCache, ProcessRoleCache, RoleCache, RoleCacheKey, RoleCacheStats, RoleScope};
pub use epochs::EpochStamp;
pub use role::{Role, RoleKind};
