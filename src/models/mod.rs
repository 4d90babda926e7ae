pub mod rbac;
pub mod user;

pub use rbac::{Permission, PermissionCode, Role};
pub use user::UserProfile;
