pub mod admins;
pub mod auth;
pub mod health;
pub mod permissions;
pub mod requests;
pub mod roles;
pub mod statuses;

use sqlx::SqlitePool;

use crate::errors::{AppError, AppResult};

/// Trimmed, non-empty value or a 400 with `message`.
pub(crate) fn required(value: Option<&str>, message: &str) -> AppResult<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AppError::bad_request(message))
}

pub(crate) async fn ensure_status_exists(pool: &SqlitePool, status_id: i64) -> AppResult<()> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM statuses WHERE id = ?")
        .bind(status_id)
        .fetch_optional(pool)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::bad_request("Invalid status_id"))
}
