use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::app::AppState;
use crate::db::row_parsers;
use crate::errors::AppResult;
use crate::models::response::{ApiResponse, StatusListEnvelope};
use crate::models::status::StatusRecord;

pub fn routes() -> Router<AppState> {
    Router::new().route("/statuses", get(list_statuses))
}

#[utoipa::path(
    get,
    path = "/api/v1/statuses",
    tag = "Statuses",
    responses((status = 200, description = "Every status, in id order", body = StatusListEnvelope))
)]
pub async fn list_statuses(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<StatusRecord>>>> {
    let rows = sqlx::query("SELECT id, code, label, description, color FROM statuses ORDER BY id")
        .fetch_all(&state.pool)
        .await?;

    let statuses = rows
        .iter()
        .map(row_parsers::status_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ApiResponse::list(statuses)))
}
