use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::db::row_parsers;
use crate::errors::AppError;

/// Closed set of status codes the application relies on. Ids are looked up by
/// code at startup, so reordering or reseeding the `statuses` table is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Active,
    Inactive,
    Pending,
    Deleted,
    Approved,
    Rejected,
    Error,
    Enabled,
    Disabled,
}

impl Status {
    pub const ALL: [Status; 9] = [
        Status::Active,
        Status::Inactive,
        Status::Pending,
        Status::Deleted,
        Status::Approved,
        Status::Rejected,
        Status::Error,
        Status::Enabled,
        Status::Disabled,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
            Status::Pending => "pending",
            Status::Deleted => "deleted",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
            Status::Error => "error",
            Status::Enabled => "enabled",
            Status::Disabled => "disabled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusRecord {
    pub id: i64,
    #[schema(example = "active")]
    pub code: String,
    #[schema(example = "Active")]
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "#2ecc71")]
    pub color: Option<String>,
}

/// Status code -> row id, resolved once against the store.
#[derive(Debug, Clone, Default)]
pub struct StatusRegistry {
    ids: HashMap<Status, i64>,
}

impl StatusRegistry {
    pub async fn load(pool: &SqlitePool) -> Result<Self, AppError> {
        let rows = sqlx::query("SELECT id, code, label, description, color FROM statuses")
            .fetch_all(pool)
            .await?;

        let mut ids = HashMap::new();
        for row in &rows {
            let record = row_parsers::status_from_row(row)?;
            if let Some(status) = Status::from_code(&record.code) {
                ids.insert(status, record.id);
            }
        }

        let missing: Vec<&str> = Status::ALL
            .iter()
            .filter(|status| !ids.contains_key(*status))
            .map(|status| status.code())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::configuration(format!(
                "statuses table is missing codes: {}",
                missing.join(", ")
            )));
        }

        Ok(Self { ids })
    }

    pub fn id(&self, status: Status) -> i64 {
        // load() refuses to build a registry with gaps
        self.ids.get(&status).copied().unwrap_or_default()
    }

    pub fn status_of(&self, id: i64) -> Option<Status> {
        self.ids
            .iter()
            .find_map(|(status, status_id)| (*status_id == id).then_some(*status))
    }
}
