use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use super::admins::ADMIN_COLUMNS;
use crate::app::AppState;
use crate::authz::AdminIdentity;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::admin::{Admin, AuthResponse, LoginRequest, MeResponse};
use crate::models::response::{ApiResponse, LoginEnvelope, MeEnvelope};
use crate::models::status::Status;
use crate::utils::verify_password;

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub fn routes(state: &AppState) -> Router<AppState> {
    // an empty `all` requirement only demands an identity
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me).route_layer(state.require_all_permissions(&[])))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginEnvelope),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Admin account is not active")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let email = payload.email.trim().to_lowercase();

    let row = sqlx::query(&format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE email = ?"))
        .bind(&email)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;
    let db_admin = row_parsers::db_admin_from_row(&row)?;

    if !verify_password(&payload.password, &db_admin.password_hash)? {
        tracing::info!(admin_id = %db_admin.id, "login rejected: wrong password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    match state.statuses.status_of(db_admin.status_id) {
        Some(Status::Enabled | Status::Active) => {}
        _ => {
            tracing::info!(admin_id = %db_admin.id, status_id = db_admin.status_id, "login rejected: account not active");
            return Err(AppError::forbidden("Admin account is not active"));
        }
    }

    let token = state.jwt.encode(&db_admin.id)?;
    tracing::info!(admin_id = %db_admin.id, "admin logged in");

    Ok(Json(ApiResponse::ok(AuthResponse {
        token,
        admin: Admin::from(db_admin),
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Caller identity and permission codes", body = MeEnvelope),
        (status = 401, description = "No admin identity")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn me(State(state): State<AppState>, identity: AdminIdentity) -> AppResult<Json<ApiResponse<MeResponse>>> {
    let permissions = state.resolver.role_permissions(identity.role_id).await;

    Ok(Json(ApiResponse::ok(MeResponse {
        admin_id: identity.admin_id,
        role_id: identity.role_id,
        permissions,
    })))
}
