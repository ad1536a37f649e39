use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderName;
use serde::Serialize;

use super::resolver::RoleId;
use crate::errors::AppError;

pub const ADMIN_ID_HEADER: &str = "x-admin-id";

/// The admin a request acts for. Attached to request extensions by bearer
/// authentication or by a passing permission gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminIdentity {
    pub admin_id: String,
    pub role_id: RoleId,
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminIdentity>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Admin authentication required"))
    }
}

/// Strategy for finding the admin id on an inbound request.
///
/// Closures `Fn(&Parts) -> Option<String>` implement it too.
pub trait AdminIdExtractor: Send + Sync {
    fn extract(&self, parts: &Parts) -> Option<String>;
}

impl<F> AdminIdExtractor for F
where
    F: Fn(&Parts) -> Option<String> + Send + Sync,
{
    fn extract(&self, parts: &Parts) -> Option<String> {
        self(parts)
    }
}

/// Reads the admin id from a single header. Blank and non-UTF-8 values count as absent.
#[derive(Debug, Clone)]
pub struct HeaderAdminIdExtractor {
    header: HeaderName,
}

impl HeaderAdminIdExtractor {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl Default for HeaderAdminIdExtractor {
    fn default() -> Self {
        Self::new(HeaderName::from_static(ADMIN_ID_HEADER))
    }
}

impl AdminIdExtractor for HeaderAdminIdExtractor {
    fn extract(&self, parts: &Parts) -> Option<String> {
        parts
            .headers
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    }
}

/// Already-attached identity first, then the `x-admin-id` header.
#[derive(Debug, Clone, Default)]
pub struct DefaultAdminIdExtractor {
    header: HeaderAdminIdExtractor,
}

impl AdminIdExtractor for DefaultAdminIdExtractor {
    fn extract(&self, parts: &Parts) -> Option<String> {
        parts
            .extensions
            .get::<AdminIdentity>()
            .map(|identity| identity.admin_id.clone())
            .filter(|admin_id| !admin_id.is_empty())
            .or_else(|| self.header.extract(parts))
    }
}
