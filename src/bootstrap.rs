//! First-run setup: an `administrator` role holding every permission, and an
//! enabled admin on it. Safe to re-run for additional admins.

use sqlx::SqlitePool;

use crate::errors::{AppError, AppResult};
use crate::models::status::{Status, StatusRegistry};
use crate::utils::{hash_password, is_valid_email, normalize_country, utc_now};

pub const ADMINISTRATOR_ROLE: &str = "administrator";

#[derive(Debug, Clone)]
pub struct NewAdministrator {
    pub email: String,
    pub password: String,
    pub country: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOutcome {
    pub admin_id: String,
    pub role_id: i64,
    /// Grants added by this run; zero when the role already held everything.
    pub granted: u64,
}

pub async fn bootstrap_administrator(pool: &SqlitePool, new: NewAdministrator) -> AppResult<BootstrapOutcome> {
    let email = new.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("Invalid email address"));
    }
    let country = normalize_country(&new.country)?;
    let password_hash = hash_password(&new.password)?;

    let statuses = StatusRegistry::load(pool).await?;
    let now = utc_now();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT OR IGNORE INTO roles (label, code, description, status_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind("Administrator")
    .bind(ADMINISTRATOR_ROLE)
    .bind("Holds every permission")
    .bind(statuses.id(Status::Active))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let role_id: i64 = sqlx::query_scalar("SELECT id FROM roles WHERE code = ?")
        .bind(ADMINISTRATOR_ROLE)
        .fetch_one(&mut *tx)
        .await?;

    let granted = sqlx::query(
        "INSERT OR IGNORE INTO roles_permissions (role_id, permission_id, created_at) SELECT ?, id, ? FROM permissions",
    )
    .bind(role_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let admin_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO admins (id, email, password_hash, firstname, lastname, country, role_id, status_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&admin_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&new.firstname)
    .bind(&new.lastname)
    .bind(&country)
    .bind(role_id)
    .bind(statuses.id(Status::Enabled))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| AppError::from_write(err, "Admin with this email already exists", "Invalid role or status"))?;

    tx.commit().await?;

    tracing::info!(admin_id = %admin_id, role_id, granted, "administrator bootstrapped");
    Ok(BootstrapOutcome {
        admin_id,
        role_id,
        granted,
    })
}
