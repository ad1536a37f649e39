use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Admin {
    #[schema(example = "4f6c2a1e-7d0b-4d2b-9a51-0c8f3e7a9b12")]
    pub id: String,
    #[schema(example = "clerk@city.gov")]
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    #[schema(example = "KEN")]
    pub country: String,
    pub role_id: i64,
    pub status_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DbAdmin {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub country: String,
    pub role_id: i64,
    pub status_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbAdmin> for Admin {
    fn from(db: DbAdmin) -> Self {
        Admin {
            id: db.id,
            email: db.email,
            firstname: db.firstname,
            lastname: db.lastname,
            country: db.country,
            role_id: db.role_id,
            status_id: db.status_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminCreateRequest {
    #[schema(example = "clerk@city.gov")]
    pub email: Option<String>,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    /// ISO-3 country code.
    #[schema(example = "KEN")]
    pub country: Option<String>,
    pub role_id: Option<i64>,
    pub status_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminUpdateRequest {
    pub password: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub country: Option<String>,
    /// Also needs `roles.update`, and never applies to the caller's own account.
    pub role_id: Option<i64>,
    pub status_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "clerk@city.gov")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub admin: Admin,
}

/// The caller's identity together with every permission code its role holds.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub admin_id: String,
    pub role_id: i64,
    pub permissions: Vec<String>,
}
