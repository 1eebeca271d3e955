//! Principals, organizational units and the request context.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod request_context;
pub mod org_unit;

pub use principal::{Group, Principal, PrincipalId, User};
pub use org_unit::{OrgUnit, OU_SEPARATOR};
pub use request_context::RequestContext;
