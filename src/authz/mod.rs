//! Authorization: permission resolution and the route-level permission gate.
//!
//! - [`PermissionResolver`] answers admin -> role -> permission questions,
//!   reading the store on every call
//! - [`PermissionGate`] is a route layer that rejects requests whose admin
//!   lacks the required permission code(s) with 401/403/500
//! - [`AdminIdExtractor`] decides where the admin id comes from
//!
//! Permissions are flat `<entity>.<action>` codes matched exactly.

mod gate;
mod identity;
mod resolver;

pub use gate::{
    GateRejection, PermissionGate, PermissionGateService, Requirement, DEFAULT_FORBIDDEN_MESSAGE,
    DEFAULT_UNAUTHENTICATED_MESSAGE,
};
pub use identity::{
    AdminIdExtractor, AdminIdentity, DefaultAdminIdExtractor, HeaderAdminIdExtractor, ADMIN_ID_HEADER,
};
pub use resolver::{PermissionResolver, PermissionStore, RoleId, SqlitePermissionStore, StoreError};

/// Permission codes seeded by the migrations and checked by the routes.
pub mod permissions {
    // Roles
    pub const ROLES_READ: &str = "roles.read";
    pub const ROLES_CREATE: &str = "roles.create";
    pub const ROLES_UPDATE: &str = "roles.update";
    pub const ROLES_DELETE: &str = "roles.delete";

    // Permissions
    pub const PERMISSIONS_READ: &str = "permissions.read";
    pub const PERMISSIONS_CREATE: &str = "permissions.create";
    pub const PERMISSIONS_UPDATE: &str = "permissions.update";
    pub const PERMISSIONS_DELETE: &str = "permissions.delete";

    // Admins
    pub const ADMINS_READ: &str = "admins.read";
    pub const ADMINS_CREATE: &str = "admins.create";
    pub const ADMINS_UPDATE: &str = "admins.update";
    pub const ADMINS_DELETE: &str = "admins.delete";

    // Requests
    pub const REQUESTS_READ: &str = "requests.read";
    pub const REQUESTS_CREATE: &str = "requests.create";
    pub const REQUESTS_UPDATE: &str = "requests.update";
    pub const REQUESTS_APPROVE: &str = "requests.approve";
    pub const REQUESTS_DELETE: &str = "requests.delete";
}
