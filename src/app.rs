use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{AdminIdentity, PermissionGate, PermissionResolver};
use crate::errors::{AppError, AppResult};
use crate::jwt::{self, JwtConfig};
use crate::models::status::StatusRegistry;
use crate::routes::{admins, auth, health, permissions, requests, roles, statuses};

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub resolver: PermissionResolver,
    pub statuses: Arc<StatusRegistry>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, statuses: StatusRegistry) -> Self {
        Self {
            resolver: PermissionResolver::sqlite(pool.clone()),
            pool,
            jwt: Arc::new(jwt),
            statuses: Arc::new(statuses),
        }
    }

    pub fn require_permission(&self, code: &str) -> PermissionGate {
        PermissionGate::require_permission(self.resolver.clone(), code)
    }

    pub fn require_any_permission(&self, codes: &[&str]) -> PermissionGate {
        PermissionGate::require_any_permission(self.resolver.clone(), codes.iter().copied())
    }

    pub fn require_all_permissions(&self, codes: &[&str]) -> PermissionGate {
        PermissionGate::require_all_permissions(self.resolver.clone(), codes.iter().copied())
    }

    /// Inside a handler, for rules that depend on the payload rather than the route.
    pub async fn ensure_permission(&self, identity: &AdminIdentity, code: &str) -> AppResult<()> {
        let gate = self.require_permission(code);
        let granted = gate.evaluate(&identity.admin_id).await.map_err(|err| {
            tracing::error!(admin_id = %identity.admin_id, error = %err, "permission check failed");
            AppError::internal("Error checking permissions")
        })?;

        if !granted {
            tracing::info!(admin_id = %identity.admin_id, requirement = %gate.requirement(), "permission denied");
            return Err(AppError::forbidden(gate.requirement().to_string()));
        }
        Ok(())
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let statuses = StatusRegistry::load(&pool).await?;
    let state = AppState::new(pool, jwt_config, statuses);

    Ok(build_router(state))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let api = Router::new()
        .nest("/auth", auth::routes(&state))
        .merge(statuses::routes())
        .merge(roles::routes(&state))
        .merge(permissions::routes(&state))
        .merge(admins::routes(&state))
        .merge(requests::routes(&state))
        .layer(middleware::from_fn_with_state(state.clone(), jwt::authenticate));

    Router::new()
        .route("/health", get(health::health))
        .nest(API_PREFIX, api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
