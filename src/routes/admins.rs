use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use sqlx::SqlitePool;

use super::{ensure_status_exists, required};
use crate::app::AppState;
use crate::authz::permissions::{ADMINS_CREATE, ADMINS_DELETE, ADMINS_READ, ADMINS_UPDATE, ROLES_UPDATE};
use crate::authz::AdminIdentity;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::admin::{Admin, AdminCreateRequest, AdminUpdateRequest, DbAdmin};
use crate::models::response::{AdminEnvelope, AdminListEnvelope, ApiResponse};
use crate::models::status::Status;
use crate::utils::{hash_password, is_valid_email, normalize_country, utc_now};

pub(crate) const ADMIN_COLUMNS: &str =
    "id, email, password_hash, firstname, lastname, country, role_id, status_id, created_at, updated_at";
const DUPLICATE_EMAIL: &str = "Admin with this email already exists";

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admins", get(list_admins).route_layer(state.require_permission(ADMINS_READ)))
        .route("/admins", post(create_admin).route_layer(state.require_permission(ADMINS_CREATE)))
        .route("/admins/:id", get(get_admin).route_layer(state.require_permission(ADMINS_READ)))
        .route("/admins/:id", put(update_admin).route_layer(state.require_permission(ADMINS_UPDATE)))
        .route("/admins/:id", delete(delete_admin).route_layer(state.require_permission(ADMINS_DELETE)))
}

pub(crate) async fn fetch_db_admin(pool: &SqlitePool, id: &str) -> AppResult<DbAdmin> {
    let row = sqlx::query(&format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Admin not found"))?;

    row_parsers::db_admin_from_row(&row)
}

async fn ensure_role_exists(pool: &SqlitePool, role_id: i64) -> AppResult<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM roles WHERE id = ?")
        .bind(role_id)
        .fetch_optional(pool)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::bad_request("Invalid role"))
}

#[utoipa::path(
    get,
    path = "/api/v1/admins",
    tag = "Admins",
    responses(
        (status = 200, description = "List of admins", body = AdminListEnvelope),
        (status = 401, description = "No admin identity"),
        (status = 403, description = "Missing admins.read")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn list_admins(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<Admin>>>> {
    let rows = sqlx::query(&format!("SELECT {ADMIN_COLUMNS} FROM admins ORDER BY created_at, email"))
        .fetch_all(&state.pool)
        .await?;

    let admins = rows
        .iter()
        .map(|row| row_parsers::db_admin_from_row(row).map(Admin::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ApiResponse::list(admins)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admins/{id}",
    tag = "Admins",
    params(("id" = String, Path, description = "Admin id")),
    responses(
        (status = 200, description = "Admin detail", body = AdminEnvelope),
        (status = 404, description = "Admin not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn get_admin(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<ApiResponse<Admin>>> {
    let admin = fetch_db_admin(&state.pool, &id).await?;
    Ok(Json(ApiResponse::ok(admin.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/admins",
    tag = "Admins",
    request_body = AdminCreateRequest,
    responses(
        (status = 201, description = "Admin created", body = AdminEnvelope),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn create_admin(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Json(payload): Json<AdminCreateRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Admin>>)> {
    let email = required(payload.email.as_deref(), "Email is required")?.to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email address"));
    }
    let password = required(payload.password.as_deref(), "Password is required")?;
    let country = normalize_country(&required(payload.country.as_deref(), "Country is required")?)?;
    let role_id = payload
        .role_id
        .ok_or_else(|| AppError::bad_request("Role is required"))?;
    ensure_role_exists(&state.pool, role_id).await?;

    let status_id = match payload.status_id {
        Some(status_id) => {
            ensure_status_exists(&state.pool, status_id).await?;
            status_id
        }
        None => state.statuses.id(Status::Enabled),
    };

    let password_hash = hash_password(&password)?;
    let id = uuid::Uuid::new_v4().to_string();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO admins (id, email, password_hash, firstname, lastname, country, role_id, status_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&payload.firstname)
    .bind(&payload.lastname)
    .bind(&country)
    .bind(role_id)
    .bind(status_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|err| AppError::from_write(err, DUPLICATE_EMAIL, "Invalid role or status"))?;

    let admin = fetch_db_admin(&state.pool, &id).await?;
    tracing::info!(actor = %identity.admin_id, admin_id = %admin.id, role_id, "admin created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(admin.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/admins/{id}",
    tag = "Admins",
    params(("id" = String, Path, description = "Admin id")),
    request_body = AdminUpdateRequest,
    responses(
        (status = 200, description = "Admin updated", body = AdminEnvelope),
        (status = 400, description = "No fields to update or validation failed"),
        (status = 403, description = "Missing admins.update, or role_id sent without roles.update or for the caller itself"),
        (status = 404, description = "Admin not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn update_admin(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<String>,
    Json(payload): Json<AdminUpdateRequest>,
) -> AppResult<Json<ApiResponse<Admin>>> {
    let nothing_to_update = payload.password.is_none()
        && payload.firstname.is_none()
        && payload.lastname.is_none()
        && payload.country.is_none()
        && payload.role_id.is_none()
        && payload.status_id.is_none();
    if nothing_to_update {
        return Err(AppError::bad_request("No fields to update"));
    }

    // moving an admin between roles is a grant decision
    if payload.role_id.is_some() {
        state.ensure_permission(&identity, ROLES_UPDATE).await?;
        if identity.admin_id == id {
            return Err(AppError::forbidden("Admins cannot change their own role"));
        }
    }

    let mut admin = fetch_db_admin(&state.pool, &id).await?;

    if let Some(password) = payload.password.as_deref() {
        admin.password_hash = hash_password(password)?;
    }
    if payload.firstname.is_some() {
        admin.firstname = payload.firstname.clone();
    }
    if payload.lastname.is_some() {
        admin.lastname = payload.lastname.clone();
    }
    if let Some(country) = payload.country.as_deref() {
        admin.country = normalize_country(country)?;
    }
    if let Some(role_id) = payload.role_id {
        ensure_role_exists(&state.pool, role_id).await?;
        admin.role_id = role_id;
    }
    if let Some(status_id) = payload.status_id {
        ensure_status_exists(&state.pool, status_id).await?;
        admin.status_id = status_id;
    }

    sqlx::query(
        "UPDATE admins SET password_hash = ?, firstname = ?, lastname = ?, country = ?, role_id = ?, status_id = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&admin.password_hash)
    .bind(&admin.firstname)
    .bind(&admin.lastname)
    .bind(&admin.country)
    .bind(admin.role_id)
    .bind(admin.status_id)
    .bind(utc_now())
    .bind(&id)
    .execute(&state.pool)
    .await
    .map_err(|err| AppError::from_write(err, DUPLICATE_EMAIL, "Invalid role or status"))?;

    let admin = fetch_db_admin(&state.pool, &id).await?;
    tracing::info!(actor = %identity.admin_id, admin_id = %admin.id, role_id = admin.role_id, "admin updated");

    Ok(Json(ApiResponse::ok(admin.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admins/{id}",
    tag = "Admins",
    params(("id" = String, Path, description = "Admin id")),
    responses(
        (status = 200, description = "Admin deleted", body = AdminEnvelope),
        (status = 404, description = "Admin not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn delete_admin(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Admin>>> {
    let admin = fetch_db_admin(&state.pool, &id).await?;

    sqlx::query("DELETE FROM admins WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await
        .map_err(|err| AppError::from_delete(err, "Admin is still referenced"))?;

    tracing::info!(actor = %identity.admin_id, admin_id = %id, "admin deleted");

    Ok(Json(ApiResponse::ok(Admin::from(admin)).with_message("Admin deleted successfully")))
}
