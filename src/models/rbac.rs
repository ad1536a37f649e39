use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: i64,
    #[schema(example = "Service Desk Lead")]
    pub label: String,
    #[schema(example = "service_desk_lead")]
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "Service Desk Lead")]
    pub label: Option<String>,
    /// Derived from the label when omitted.
    pub code: Option<String>,
    pub description: Option<String>,
    pub status_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RoleUpdateRequest {
    pub label: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub status_id: Option<i64>,
}

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: i64,
    #[schema(example = "Approve requests")]
    pub label: String,
    #[schema(example = "requests.approve")]
    pub code: String,
    #[schema(example = "entity.requests")]
    pub entity_code: String,
    #[schema(example = "approve")]
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionCreateRequest {
    #[schema(example = "Approve requests")]
    pub label: Option<String>,
    /// Derived as `<entity>.<action>` when omitted.
    pub code: Option<String>,
    #[schema(example = "entity.requests")]
    pub entity_code: Option<String>,
    #[schema(example = "approve")]
    pub action: Option<String>,
    pub description: Option<String>,
    pub status_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PermissionUpdateRequest {
    pub label: Option<String>,
    pub code: Option<String>,
    pub entity_code: Option<String>,
    pub action: Option<String>,
    pub description: Option<String>,
    pub status_id: Option<i64>,
}

// =============================================================================
// ROLE-PERMISSION GRANT
// =============================================================================

/// A grant exists iff the row exists.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RolePermission {
    pub role_id: i64,
    pub permission_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPermissionToRoleRequest {
    pub permission_id: i64,
}
