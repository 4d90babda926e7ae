pub mod auth;
pub mod permissions;
pub mod roles;

pub use auth::AuthService;
pub use permissions::{Invalidate, PermissionCache, PermissionService, PermissionSource};
pub use roles::{RoleAdmin, RoleService};
