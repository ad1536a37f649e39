pub mod admin;
pub mod rbac;
pub mod request;
pub mod response;
pub mod status;
