use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, Type};

use crate::errors::AppError;
use crate::models::admin::DbAdmin;
use crate::models::rbac::{Permission, Role, RolePermission};
use crate::models::request::ServiceRequest;
use crate::models::status::StatusRecord;

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    // RFC3339, which is what binding a DateTime<Utc> writes
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // CURRENT_TIMESTAMP defaults: "YYYY-MM-DD HH:MM:SS"
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range".to_string()))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

fn timestamp(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, AppError> {
    let raw: String = column(row, name)?;
    parse_datetime(&raw)
}

pub fn role_from_row(row: &SqliteRow) -> Result<Role, AppError> {
    Ok(Role {
        id: column(row, "id")?,
        label: column(row, "label")?,
        code: column(row, "code")?,
        description: column(row, "description")?,
        status_id: column(row, "status_id")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub fn permission_from_row(row: &SqliteRow) -> Result<Permission, AppError> {
    Ok(Permission {
        id: column(row, "id")?,
        label: column(row, "label")?,
        code: column(row, "code")?,
        entity_code: column(row, "entity_code")?,
        action: column(row, "action")?,
        description: column(row, "description")?,
        status_id: column(row, "status_id")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub fn role_permission_from_row(row: &SqliteRow) -> Result<RolePermission, AppError> {
    Ok(RolePermission {
        role_id: column(row, "role_id")?,
        permission_id: column(row, "permission_id")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub fn db_admin_from_row(row: &SqliteRow) -> Result<DbAdmin, AppError> {
    Ok(DbAdmin {
        id: column(row, "id")?,
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        firstname: column(row, "firstname")?,
        lastname: column(row, "lastname")?,
        country: column(row, "country")?,
        role_id: column(row, "role_id")?,
        status_id: column(row, "status_id")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub fn service_request_from_row(row: &SqliteRow) -> Result<ServiceRequest, AppError> {
    Ok(ServiceRequest {
        id: column(row, "id")?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        citizen_id: column(row, "citizen_id")?,
        assigned_admin_id: column(row, "assigned_admin_id")?,
        status_id: column(row, "status_id")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

pub fn status_from_row(row: &SqliteRow) -> Result<StatusRecord, AppError> {
    Ok(StatusRecord {
        id: column(row, "id")?,
        code: column(row, "code")?,
        label: column(row, "label")?,
        description: column(row, "description")?,
        color: column(row, "color")?,
    })
}
