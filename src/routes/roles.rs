//! Role endpoints, including the role -> permission grants.
//!
//! A grant is the presence of a `roles_permissions` row; revoking deletes it.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use sqlx::SqlitePool;

use super::{ensure_status_exists, required};
use crate::app::AppState;
use crate::authz::permissions::{
    PERMISSIONS_READ, ROLES_CREATE, ROLES_DELETE, ROLES_READ, ROLES_UPDATE,
};
use crate::authz::AdminIdentity;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{
    AssignPermissionToRoleRequest, Permission, Role, RoleCreateRequest, RolePermission, RoleUpdateRequest,
};
use crate::models::response::{
    ApiResponse, PermissionListEnvelope, RoleEnvelope, RoleListEnvelope, RolePermissionEnvelope,
};
use crate::models::status::Status;
use crate::routes::permissions::fetch_permission;
use crate::utils::{code_from_label, utc_now};

const ROLE_COLUMNS: &str = "id, label, code, description, status_id, created_at, updated_at";
const DUPLICATE_CODE: &str = "Role with this code already exists";

pub fn routes(state: &AppState) -> Router<AppState> {
    let grant_gate = state.require_all_permissions(&[ROLES_UPDATE, PERMISSIONS_READ]);

    Router::new()
        .route("/roles", get(list_roles).route_layer(state.require_permission(ROLES_READ)))
        .route("/roles", post(create_role).route_layer(state.require_permission(ROLES_CREATE)))
        .route("/roles/:id", get(get_role).route_layer(state.require_permission(ROLES_READ)))
        .route("/roles/:id", put(update_role).route_layer(state.require_permission(ROLES_UPDATE)))
        .route("/roles/:id", delete(delete_role).route_layer(state.require_permission(ROLES_DELETE)))
        .route(
            "/roles/:id/permissions",
            get(list_role_permissions).route_layer(state.require_any_permission(&[ROLES_READ, PERMISSIONS_READ])),
        )
        .route(
            "/roles/:id/permissions",
            post(grant_permission).route_layer(grant_gate.clone()),
        )
        .route(
            "/roles/:id/permissions/:permission_id",
            delete(revoke_permission).route_layer(grant_gate),
        )
}

pub(crate) async fn fetch_role(pool: &SqlitePool, id: i64) -> AppResult<Role> {
    let row = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Role not found"))?;

    row_parsers::role_from_row(&row)
}

#[utoipa::path(
    get,
    path = "/api/v1/roles",
    tag = "Roles",
    responses(
        (status = 200, description = "List of roles", body = RoleListEnvelope),
        (status = 401, description = "No admin identity"),
        (status = 403, description = "Missing roles.read")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn list_roles(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<Role>>>> {
    let rows = sqlx::query(&format!("SELECT {ROLE_COLUMNS} FROM roles ORDER BY id"))
        .fetch_all(&state.pool)
        .await?;

    let roles = rows
        .iter()
        .map(row_parsers::role_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ApiResponse::list(roles)))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/{id}",
    tag = "Roles",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role detail", body = RoleEnvelope),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn get_role(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<ApiResponse<Role>>> {
    let role = fetch_role(&state.pool, id).await?;
    Ok(Json(ApiResponse::ok(role)))
}

#[utoipa::path(
    post,
    path = "/api/v1/roles",
    tag = "Roles",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = RoleEnvelope),
        (status = 400, description = "Missing label or invalid status_id"),
        (status = 409, description = "Role code already exists")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Json(payload): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Role>>)> {
    let label = required(payload.label.as_deref(), "Label is required")?;
    let code = match payload.code.as_deref().map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => code.to_string(),
        None => code_from_label(&label),
    };

    let status_id = match payload.status_id {
        Some(status_id) => {
            ensure_status_exists(&state.pool, status_id).await?;
            status_id
        }
        None => state.statuses.id(Status::Active),
    };

    let now = utc_now();
    let result = sqlx::query(
        "INSERT INTO roles (label, code, description, status_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&label)
    .bind(&code)
    .bind(&payload.description)
    .bind(status_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|err| AppError::from_write(err, DUPLICATE_CODE, "Invalid status_id"))?;

    let role = fetch_role(&state.pool, result.last_insert_rowid()).await?;
    tracing::info!(actor = %identity.admin_id, role_id = role.id, code = %role.code, "role created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(role))))
}

#[utoipa::path(
    put,
    path = "/api/v1/roles/{id}",
    tag = "Roles",
    params(("id" = i64, Path, description = "Role id")),
    request_body = RoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleEnvelope),
        (status = 400, description = "No fields to update or invalid status_id"),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role code already exists")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<i64>,
    Json(payload): Json<RoleUpdateRequest>,
) -> AppResult<Json<ApiResponse<Role>>> {
    if payload.label.is_none() && payload.code.is_none() && payload.description.is_none() && payload.status_id.is_none() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let mut role = fetch_role(&state.pool, id).await?;

    if let Some(label) = payload.label.as_deref() {
        role.label = required(Some(label), "Label cannot be empty")?;
        // a relabelled role gets a fresh code unless one is given explicitly
        if payload.code.is_none() {
            role.code = code_from_label(&role.label);
        }
    }
    if let Some(code) = payload.code.as_deref() {
        role.code = required(Some(code), "Code cannot be empty")?;
    }
    if payload.description.is_some() {
        role.description = payload.description.clone();
    }
    if let Some(status_id) = payload.status_id {
        ensure_status_exists(&state.pool, status_id).await?;
        role.status_id = status_id;
    }

    sqlx::query("UPDATE roles SET label = ?, code = ?, description = ?, status_id = ?, updated_at = ? WHERE id = ?")
        .bind(&role.label)
        .bind(&role.code)
        .bind(&role.description)
        .bind(role.status_id)
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(|err| AppError::from_write(err, DUPLICATE_CODE, "Invalid status_id"))?;

    let role = fetch_role(&state.pool, id).await?;
    tracing::info!(actor = %identity.admin_id, role_id = role.id, "role updated");

    Ok(Json(ApiResponse::ok(role)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/{id}",
    tag = "Roles",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role deleted", body = RoleEnvelope),
        (status = 404, description = "Role not found"),
        (status = 409, description = "Role is still assigned to admins")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Role>>> {
    let role = fetch_role(&state.pool, id).await?;

    sqlx::query("DELETE FROM roles WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(|err| AppError::from_delete(err, "Role is still assigned to admins"))?;

    tracing::info!(actor = %identity.admin_id, role_id = id, "role deleted");

    Ok(Json(ApiResponse::ok(role).with_message("Role deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/roles/{id}/permissions",
    tag = "Roles",
    params(("id" = i64, Path, description = "Role id")),
    responses(
        (status = 200, description = "Permissions granted to the role", body = PermissionListEnvelope),
        (status = 404, description = "Role not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn list_role_permissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<Permission>>>> {
    fetch_role(&state.pool, id).await?;

    let rows = sqlx::query(
        r#"
        SELECT p.id, p.label, p.code, p.entity_code, p.action, p.description, p.status_id, p.created_at, p.updated_at
        FROM permissions p
        INNER JOIN roles_permissions rp ON p.id = rp.permission_id
        WHERE rp.role_id = ?
        ORDER BY p.code
        "#,
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    let permissions = rows
        .iter()
        .map(row_parsers::permission_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ApiResponse::list(permissions)))
}

#[utoipa::path(
    post,
    path = "/api/v1/roles/{id}/permissions",
    tag = "Roles",
    params(("id" = i64, Path, description = "Role id")),
    request_body = AssignPermissionToRoleRequest,
    responses(
        (status = 201, description = "Permission granted (idempotent)", body = RolePermissionEnvelope),
        (status = 404, description = "Role or permission not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn grant_permission(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<i64>,
    Json(payload): Json<AssignPermissionToRoleRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RolePermission>>)> {
    fetch_role(&state.pool, id).await?;
    let permission = fetch_permission(&state.pool, payload.permission_id).await?;

    sqlx::query("INSERT OR IGNORE INTO roles_permissions (role_id, permission_id, created_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(permission.id)
        .bind(utc_now())
        .execute(&state.pool)
        .await?;

    let row = sqlx::query("SELECT role_id, permission_id, created_at FROM roles_permissions WHERE role_id = ? AND permission_id = ?")
        .bind(id)
        .bind(permission.id)
        .fetch_one(&state.pool)
        .await?;
    let grant = row_parsers::role_permission_from_row(&row)?;

    tracing::info!(actor = %identity.admin_id, role_id = id, permission = %permission.code, "permission granted to role");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(grant))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/roles/{id}/permissions/{permission_id}",
    tag = "Roles",
    params(
        ("id" = i64, Path, description = "Role id"),
        ("permission_id" = i64, Path, description = "Permission id")
    ),
    responses(
        (status = 200, description = "Permission revoked", body = RolePermissionEnvelope),
        (status = 404, description = "Grant not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn revoke_permission(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path((id, permission_id)): Path<(i64, i64)>,
) -> AppResult<Json<ApiResponse<RolePermission>>> {
    let row = sqlx::query("SELECT role_id, permission_id, created_at FROM roles_permissions WHERE role_id = ? AND permission_id = ?")
        .bind(id)
        .bind(permission_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Role permission not found"))?;
    let grant = row_parsers::role_permission_from_row(&row)?;

    sqlx::query("DELETE FROM roles_permissions WHERE role_id = ? AND permission_id = ?")
        .bind(id)
        .bind(permission_id)
        .execute(&state.pool)
        .await?;

    tracing::info!(actor = %identity.admin_id, role_id = id, permission_id, "permission revoked from role");

    Ok(Json(ApiResponse::ok(grant).with_message("Permission revoked successfully")))
}
