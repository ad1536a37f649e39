use serde::Serialize;
use utoipa::ToSchema;

use crate::models::admin::{Admin, AuthResponse, MeResponse};
use crate::models::rbac::{Permission, Role, RolePermission};
use crate::models::request::ServiceRequest;
use crate::models::status::StatusRecord;

/// Success envelope: `{success: true, data, count?, message?}`.
#[derive(Debug, Serialize, ToSchema)]
#[aliases(
    RoleEnvelope = ApiResponse<Role>,
    RoleListEnvelope = ApiResponse<Vec<Role>>,
    PermissionEnvelope = ApiResponse<Permission>,
    PermissionListEnvelope = ApiResponse<Vec<Permission>>,
    RolePermissionEnvelope = ApiResponse<RolePermission>,
    AdminEnvelope = ApiResponse<Admin>,
    AdminListEnvelope = ApiResponse<Vec<Admin>>,
    ServiceRequestEnvelope = ApiResponse<ServiceRequest>,
    ServiceRequestListEnvelope = ApiResponse<Vec<ServiceRequest>>,
    StatusListEnvelope = ApiResponse<Vec<StatusRecord>>,
    LoginEnvelope = ApiResponse<AuthResponse>,
    MeEnvelope = ApiResponse<MeResponse>
)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    /// Present on list responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            count: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        let count = data.len();
        Self {
            success: true,
            data,
            count: Some(count),
            message: None,
        }
    }
}
