use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use sqlx::SqlitePool;

use super::{ensure_status_exists, required};
use crate::app::AppState;
use crate::authz::permissions::{PERMISSIONS_CREATE, PERMISSIONS_DELETE, PERMISSIONS_READ, PERMISSIONS_UPDATE};
use crate::authz::AdminIdentity;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{Permission, PermissionCreateRequest, PermissionUpdateRequest};
use crate::models::response::{ApiResponse, PermissionEnvelope, PermissionListEnvelope};
use crate::models::status::Status;
use crate::utils::{permission_code, utc_now};

const PERMISSION_COLUMNS: &str =
    "id, label, code, entity_code, action, description, status_id, created_at, updated_at";
const DUPLICATE_CODE: &str = "Permission with this code already exists";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/permissions", get(list_permissions).route_layer(state.require_permission(PERMISSIONS_READ)))
        .route("/permissions", post(create_permission).route_layer(state.require_permission(PERMISSIONS_CREATE)))
        .route("/permissions/:id", get(get_permission).route_layer(state.require_permission(PERMISSIONS_READ)))
        .route("/permissions/:id", put(update_permission).route_layer(state.require_permission(PERMISSIONS_UPDATE)))
        .route(
            "/permissions/:id",
            delete(delete_permission).route_layer(state.require_permission(PERMISSIONS_DELETE)),
        )
}

pub(crate) async fn fetch_permission(pool: &SqlitePool, id: i64) -> AppResult<Permission> {
    let row = sqlx::query(&format!("SELECT {PERMISSION_COLUMNS} FROM permissions WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Permission not found"))?;

    row_parsers::permission_from_row(&row)
}

#[utoipa::path(
    get,
    path = "/api/v1/permissions",
    tag = "Permissions",
    responses(
        (status = 200, description = "List of permissions", body = PermissionListEnvelope),
        (status = 401, description = "No admin identity"),
        (status = 403, description = "Missing permissions.read")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn list_permissions(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<Permission>>>> {
    let rows = sqlx::query(&format!("SELECT {PERMISSION_COLUMNS} FROM permissions ORDER BY code"))
        .fetch_all(&state.pool)
        .await?;

    let permissions = rows
        .iter()
        .map(row_parsers::permission_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ApiResponse::list(permissions)))
}

#[utoipa::path(
    get,
    path = "/api/v1/permissions/{id}",
    tag = "Permissions",
    params(("id" = i64, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission detail", body = PermissionEnvelope),
        (status = 404, description = "Permission not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn get_permission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Permission>>> {
    let permission = fetch_permission(&state.pool, id).await?;
    Ok(Json(ApiResponse::ok(permission)))
}

#[utoipa::path(
    post,
    path = "/api/v1/permissions",
    tag = "Permissions",
    request_body = PermissionCreateRequest,
    responses(
        (status = 201, description = "Permission created", body = PermissionEnvelope),
        (status = 400, description = "Missing field or invalid status_id"),
        (status = 409, description = "Permission code already exists")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn create_permission(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Json(payload): Json<PermissionCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Permission>>)> {
    let label = required(payload.label.as_deref(), "Label is required")?;
    let entity_code = required(payload.entity_code.as_deref(), "Entity code is required")?.to_lowercase();
    let action = required(payload.action.as_deref(), "Action is required")?.to_lowercase();
    let code = match payload.code.as_deref().map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => code.to_lowercase(),
        None => permission_code(&entity_code, &action),
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
        "INSERT INTO permissions (label, code, entity_code, action, description, status_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&label)
    .bind(&code)
    .bind(&entity_code)
    .bind(&action)
    .bind(&payload.description)
    .bind(status_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|err| AppError::from_write(err, DUPLICATE_CODE, "Invalid status_id"))?;

    let permission = fetch_permission(&state.pool, result.last_insert_rowid()).await?;
    tracing::info!(actor = %identity.admin_id, permission = %permission.code, "permission created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(permission))))
}

#[utoipa::path(
    put,
    path = "/api/v1/permissions/{id}",
    tag = "Permissions",
    params(("id" = i64, Path, description = "Permission id")),
    request_body = PermissionUpdateRequest,
    responses(
        (status = 200, description = "Permission updated", body = PermissionEnvelope),
        (status = 400, description = "No fields to update or invalid status_id"),
        (status = 404, description = "Permission not found"),
        (status = 409, description = "Permission code already exists")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn update_permission(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<i64>,
    Json(payload): Json<PermissionUpdateRequest>,
) -> AppResult<Json<ApiResponse<Permission>>> {
    let nothing_to_update = payload.label.is_none()
        && payload.code.is_none()
        && payload.entity_code.is_none()
        && payload.action.is_none()
        && payload.description.is_none()
        && payload.status_id.is_none();
    if nothing_to_update {
        return Err(AppError::bad_request("No fields to update"));
    }

    let mut permission = fetch_permission(&state.pool, id).await?;

    if let Some(label) = payload.label.as_deref() {
        permission.label = required(Some(label), "Label cannot be empty")?;
    }
    if let Some(entity_code) = payload.entity_code.as_deref() {
        permission.entity_code = required(Some(entity_code), "Entity code cannot be empty")?.to_lowercase();
    }
    if let Some(action) = payload.action.as_deref() {
        permission.action = required(Some(action), "Action cannot be empty")?.to_lowercase();
    }
    match payload.code.as_deref() {
        Some(code) => permission.code = required(Some(code), "Code cannot be empty")?.to_lowercase(),
        None if payload.entity_code.is_some() && payload.action.is_some() => {
            permission.code = permission_code(&permission.entity_code, &permission.action);
        }
        None => {}
    }
    if payload.description.is_some() {
        permission.description = payload.description.clone();
    }
    if let Some(status_id) = payload.status_id {
        ensure_status_exists(&state.pool, status_id).await?;
        permission.status_id = status_id;
    }

    sqlx::query(
        "UPDATE permissions SET label = ?, code = ?, entity_code = ?, action = ?, description = ?, status_id = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&permission.label)
    .bind(&permission.code)
    .bind(&permission.entity_code)
    .bind(&permission.action)
    .bind(&permission.description)
    .bind(permission.status_id)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await
    .map_err(|err| AppError::from_write(err, DUPLICATE_CODE, "Invalid status_id"))?;

    let permission = fetch_permission(&state.pool, id).await?;
    tracing::info!(actor = %identity.admin_id, permission = %permission.code, "permission updated");

    Ok(Json(ApiResponse::ok(permission)))
}

/// Deleting a permission cascades to every role that held it.
#[utoipa::path(
    delete,
    path = "/api/v1/permissions/{id}",
    tag = "Permissions",
    params(("id" = i64, Path, description = "Permission id")),
    responses(
        (status = 200, description = "Permission deleted", body = PermissionEnvelope),
        (status = 404, description = "Permission not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn delete_permission(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Permission>>> {
    let permission = fetch_permission(&state.pool, id).await?;

    sqlx::query("DELETE FROM permissions WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(|err| AppError::from_delete(err, "Permission is still in use"))?;

    tracing::info!(actor = %identity.admin_id, permission = %permission.code, "permission deleted");

    Ok(Json(ApiResponse::ok(permission).with_message("Permission deleted successfully")))
}
