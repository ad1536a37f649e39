//! Citizen service requests.
//!
//! Moving a request to `approved` or `rejected` is a decision and needs
//! `requests.approve`, whether it comes through the decision endpoints or a
//! `status_id` in a create/update payload.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use sqlx::SqlitePool;

use super::{ensure_status_exists, required};
use crate::app::AppState;
use crate::authz::permissions::{
    REQUESTS_APPROVE, REQUESTS_CREATE, REQUESTS_DELETE, REQUESTS_READ, REQUESTS_UPDATE,
};
use crate::authz::AdminIdentity;
use crate::db::row_parsers;
use crate::errors::{AppError, AppResult};
use crate::models::request::{ServiceRequest, ServiceRequestCreate, ServiceRequestUpdate};
use crate::models::response::{ApiResponse, ServiceRequestEnvelope, ServiceRequestListEnvelope};
use crate::models::status::Status;
use crate::utils::utc_now;

const REQUEST_COLUMNS: &str =
    "id, title, description, citizen_id, assigned_admin_id, status_id, created_at, updated_at";
const INVALID_REFERENCE: &str = "Invalid citizen_id, assigned_admin_id, or status_id";

pub fn routes(state: &AppState) -> Router<AppState> {
    let decision_gate = state.require_permission(REQUESTS_APPROVE);

    Router::new()
        .route("/requests", get(list_requests).route_layer(state.require_permission(REQUESTS_READ)))
        .route("/requests", post(create_request).route_layer(state.require_permission(REQUESTS_CREATE)))
        .route("/requests/:id", get(get_request).route_layer(state.require_permission(REQUESTS_READ)))
        .route("/requests/:id", put(update_request).route_layer(state.require_permission(REQUESTS_UPDATE)))
        .route("/requests/:id", delete(delete_request).route_layer(state.require_permission(REQUESTS_DELETE)))
        .route("/requests/:id/approve", post(approve_request).route_layer(decision_gate.clone()))
        .route("/requests/:id/reject", post(reject_request).route_layer(decision_gate))
}

async fn fetch_request(pool: &SqlitePool, id: &str) -> AppResult<ServiceRequest> {
    let row = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Request not found"))?;

    row_parsers::service_request_from_row(&row)
}

async fn ensure_citizen_exists(pool: &SqlitePool, citizen_id: &str) -> AppResult<()> {
    sqlx::query_scalar::<_, String>("SELECT id FROM citizens WHERE id = ?")
        .bind(citizen_id)
        .fetch_optional(pool)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::bad_request("Invalid citizen_id"))
}

async fn ensure_admin_exists(pool: &SqlitePool, admin_id: &str) -> AppResult<()> {
    sqlx::query_scalar::<_, String>("SELECT id FROM admins WHERE id = ?")
        .bind(admin_id)
        .fetch_optional(pool)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::bad_request("Invalid assigned_admin_id"))
}

fn is_decision(status: Option<Status>) -> bool {
    matches!(status, Some(Status::Approved | Status::Rejected))
}

/// Validates a caller-supplied status and checks the decision permission when it is one.
async fn checked_status(state: &AppState, identity: &AdminIdentity, status_id: i64) -> AppResult<i64> {
    ensure_status_exists(&state.pool, status_id).await?;
    if is_decision(state.statuses.status_of(status_id)) {
        state.ensure_permission(identity, REQUESTS_APPROVE).await?;
    }
    Ok(status_id)
}

#[utoipa::path(
    get,
    path = "/api/v1/requests",
    tag = "Requests",
    responses(
        (status = 200, description = "Requests, newest first", body = ServiceRequestListEnvelope),
        (status = 401, description = "No admin identity"),
        (status = 403, description = "Missing requests.read")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn list_requests(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<ServiceRequest>>>> {
    let rows = sqlx::query(&format!("SELECT {REQUEST_COLUMNS} FROM requests ORDER BY created_at DESC, id"))
        .fetch_all(&state.pool)
        .await?;

    let requests = rows
        .iter()
        .map(row_parsers::service_request_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ApiResponse::list(requests)))
}

#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}",
    tag = "Requests",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request detail", body = ServiceRequestEnvelope),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ServiceRequest>>> {
    let request = fetch_request(&state.pool, &id).await?;
    Ok(Json(ApiResponse::ok(request)))
}

#[utoipa::path(
    post,
    path = "/api/v1/requests",
    tag = "Requests",
    request_body = ServiceRequestCreate,
    responses(
        (status = 201, description = "Request filed", body = ServiceRequestEnvelope),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Missing requests.create, or a decided status without requests.approve")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn create_request(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Json(payload): Json<ServiceRequestCreate>,
) -> AppResult<(StatusCode, Json<ApiResponse<ServiceRequest>>)> {
    let title = required(payload.title.as_deref(), "Title is required")?;
    let description = required(payload.description.as_deref(), "Description is required")?;
    let citizen_id = required(payload.citizen_id.as_deref(), "Citizen ID is required")?;
    ensure_citizen_exists(&state.pool, &citizen_id).await?;

    if let Some(admin_id) = payload.assigned_admin_id.as_deref() {
        ensure_admin_exists(&state.pool, admin_id).await?;
    }

    let status_id = match payload.status_id {
        Some(status_id) => checked_status(&state, &identity, status_id).await?,
        None => state.statuses.id(Status::Pending),
    };

    let id = uuid::Uuid::new_v4().to_string();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO requests (id, title, description, citizen_id, assigned_admin_id, status_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&title)
    .bind(&description)
    .bind(&citizen_id)
    .bind(&payload.assigned_admin_id)
    .bind(status_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await
    .map_err(|err| AppError::from_write(err, "Request already exists", INVALID_REFERENCE))?;

    let request = fetch_request(&state.pool, &id).await?;
    tracing::info!(actor = %identity.admin_id, request_id = %request.id, citizen_id = %request.citizen_id, "request filed");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(request))))
}

#[utoipa::path(
    put,
    path = "/api/v1/requests/{id}",
    tag = "Requests",
    params(("id" = String, Path, description = "Request id")),
    request_body = ServiceRequestUpdate,
    responses(
        (status = 200, description = "Request updated", body = ServiceRequestEnvelope),
        (status = 400, description = "No fields to update or validation failed"),
        (status = 403, description = "Missing requests.update, or a decided status without requests.approve"),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn update_request(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<String>,
    Json(payload): Json<ServiceRequestUpdate>,
) -> AppResult<Json<ApiResponse<ServiceRequest>>> {
    if payload.is_empty() {
        return Err(AppError::bad_request("No fields to update"));
    }

    let mut request = fetch_request(&state.pool, &id).await?;

    if let Some(title) = payload.title {
        request.title = title;
    }
    if let Some(description) = payload.description {
        request.description = description;
    }
    if let Some(citizen_id) = payload.citizen_id {
        ensure_citizen_exists(&state.pool, &citizen_id).await?;
        request.citizen_id = citizen_id;
    }
    if let Some(assigned) = payload.assigned_admin_id {
        if let Some(admin_id) = assigned.as_deref() {
            ensure_admin_exists(&state.pool, admin_id).await?;
        }
        request.assigned_admin_id = assigned;
    }
    if let Some(status_id) = payload.status_id {
        request.status_id = checked_status(&state, &identity, status_id).await?;
    }

    sqlx::query(
        "UPDATE requests SET title = ?, description = ?, citizen_id = ?, assigned_admin_id = ?, status_id = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&request.title)
    .bind(&request.description)
    .bind(&request.citizen_id)
    .bind(&request.assigned_admin_id)
    .bind(request.status_id)
    .bind(utc_now())
    .bind(&id)
    .execute(&state.pool)
    .await
    .map_err(|err| AppError::from_write(err, "Request already exists", INVALID_REFERENCE))?;

    let request = fetch_request(&state.pool, &id).await?;
    tracing::info!(actor = %identity.admin_id, request_id = %request.id, status_id = request.status_id, "request updated");

    Ok(Json(ApiResponse::ok(request)))
}

async fn decide(
    state: &AppState,
    identity: &AdminIdentity,
    id: &str,
    decision: Status,
) -> AppResult<ServiceRequest> {
    let pending = state.statuses.id(Status::Pending);

    // the status guard makes concurrent decisions on one request mutually exclusive
    let updated = sqlx::query("UPDATE requests SET status_id = ?, updated_at = ? WHERE id = ? AND status_id = ?")
        .bind(state.statuses.id(decision))
        .bind(utc_now())
        .bind(id)
        .bind(pending)
        .execute(&state.pool)
        .await?
        .rows_affected();

    if updated == 0 {
        // distinguishes a missing request from one already decided
        fetch_request(&state.pool, id).await?;
        return Err(AppError::conflict("Only pending requests can be approved or rejected"));
    }

    let request = fetch_request(&state.pool, id).await?;
    tracing::info!(actor = %identity.admin_id, request_id = %request.id, decision = %decision, "request decided");
    Ok(request)
}

#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/approve",
    tag = "Requests",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request approved", body = ServiceRequestEnvelope),
        (status = 403, description = "Missing requests.approve"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not pending")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn approve_request(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ServiceRequest>>> {
    let request = decide(&state, &identity, &id, Status::Approved).await?;
    Ok(Json(ApiResponse::ok(request).with_message("Request approved")))
}

#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/reject",
    tag = "Requests",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request rejected", body = ServiceRequestEnvelope),
        (status = 403, description = "Missing requests.approve"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not pending")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn reject_request(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ServiceRequest>>> {
    let request = decide(&state, &identity, &id, Status::Rejected).await?;
    Ok(Json(ApiResponse::ok(request).with_message("Request rejected")))
}

#[utoipa::path(
    delete,
    path = "/api/v1/requests/{id}",
    tag = "Requests",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request deleted", body = ServiceRequestEnvelope),
        (status = 403, description = "Missing requests.delete"),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []), ("adminId" = []))
)]
pub async fn delete_request(
    State(state): State<AppState>,
    identity: AdminIdentity,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<ServiceRequest>>> {
    let request = fetch_request(&state.pool, &id).await?;

    sqlx::query("DELETE FROM requests WHERE id = ?")
        .bind(&id)
        .execute(&state.pool)
        .await?;

    tracing::info!(actor = %identity.admin_id, request_id = %id, "request deleted");

    Ok(Json(ApiResponse::ok(request).with_message("Request deleted successfully")))
}
