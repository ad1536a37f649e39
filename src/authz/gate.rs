use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::{try_join_all, BoxFuture};
use tower::{Layer, Service};

use super::identity::{AdminIdExtractor, AdminIdentity, DefaultAdminIdExtractor};
use super::resolver::{PermissionResolver, StoreError};
use crate::errors::ErrorResponse;

pub const DEFAULT_UNAUTHENTICATED_MESSAGE: &str = "Admin authentication required";
pub const DEFAULT_FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action";
const INTERNAL_ERROR_MESSAGE: &str = "Error checking permissions";

/// Which permission codes a gate asks for and how the outcomes combine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    One(String),
    /// At least one; an empty list never passes.
    Any(Vec<String>),
    /// Every one; an empty list always passes.
    All(Vec<String>),
}

impl Requirement {
    pub fn codes(&self) -> &[String] {
        match self {
            Requirement::One(code) => std::slice::from_ref(code),
            Requirement::Any(codes) | Requirement::All(codes) => codes,
        }
    }

    fn aggregate(&self, outcomes: &[bool]) -> bool {
        match self {
            Requirement::One(_) | Requirement::All(_) => outcomes.iter().all(|granted| *granted),
            Requirement::Any(_) => outcomes.iter().any(|granted| *granted),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::One(code) => write!(f, "Required permission: {}", code),
            Requirement::Any(codes) => write!(f, "Required one of: {}", codes.join(", ")),
            Requirement::All(codes) => write!(f, "Required all of: {}", codes.join(", ")),
        }
    }
}

/// Why a gate stopped a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRejection {
    /// 401, no admin id could be extracted.
    Unauthenticated { message: String },
    /// 403, the admin lacks the requirement.
    Forbidden { message: String, required: String },
    /// 500, grant data could not be read.
    Internal { detail: String },
}

impl GateRejection {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateRejection::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            GateRejection::Forbidden { .. } => StatusCode::FORBIDDEN,
            GateRejection::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payload = match self {
            GateRejection::Unauthenticated { message } => ErrorResponse::new(message, None),
            GateRejection::Forbidden { message, required } => ErrorResponse::new(message, Some(required)),
            GateRejection::Internal { detail } => ErrorResponse::new(INTERNAL_ERROR_MESSAGE, Some(detail)),
        };

        (status, Json(payload)).into_response()
    }
}

impl From<StoreError> for GateRejection {
    fn from(err: StoreError) -> Self {
        GateRejection::Internal {
            detail: err.to_string(),
        }
    }
}

/// Route layer that lets a request through only when its admin holds the
/// required permission(s).
///
/// ```ignore
/// Router::new().route(
///     "/roles",
///     post(create_role).route_layer(PermissionGate::require_permission(resolver, "roles.create")),
/// )
/// ```
#[derive(Clone)]
pub struct PermissionGate {
    resolver: PermissionResolver,
    requirement: Arc<Requirement>,
    extractor: Arc<dyn AdminIdExtractor>,
    unauthenticated_message: Arc<str>,
    forbidden_message: Arc<str>,
}

impl PermissionGate {
    pub fn new(resolver: PermissionResolver, requirement: Requirement) -> Self {
        Self {
            resolver,
            requirement: Arc::new(requirement),
            extractor: Arc::new(DefaultAdminIdExtractor::default()),
            unauthenticated_message: Arc::from(DEFAULT_UNAUTHENTICATED_MESSAGE),
            forbidden_message: Arc::from(DEFAULT_FORBIDDEN_MESSAGE),
        }
    }

    pub fn require_permission(resolver: PermissionResolver, code: impl Into<String>) -> Self {
        Self::new(resolver, Requirement::One(code.into()))
    }

    pub fn require_any_permission<I, C>(resolver: PermissionResolver, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self::new(resolver, Requirement::Any(codes.into_iter().map(Into::into).collect()))
    }

    pub fn require_all_permissions<I, C>(resolver: PermissionResolver, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self::new(resolver, Requirement::All(codes.into_iter().map(Into::into).collect()))
    }

    pub fn with_extractor(mut self, extractor: impl AdminIdExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_unauthenticated_message(mut self, message: impl AsRef<str>) -> Self {
        self.unauthenticated_message = Arc::from(message.as_ref());
        self
    }

    pub fn with_forbidden_message(mut self, message: impl AsRef<str>) -> Self {
        self.forbidden_message = Arc::from(message.as_ref());
        self
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Checks every required code concurrently and combines the outcomes.
    pub async fn evaluate(&self, admin_id: &str) -> Result<bool, StoreError> {
        let checks = self
            .requirement
            .codes()
            .iter()
            .map(|code| self.resolver.try_admin_has_permission(admin_id, code));
        let outcomes = try_join_all(checks).await?;

        Ok(self.requirement.aggregate(&outcomes))
    }

    /// Decides a request. On success an [`AdminIdentity`] is present in the
    /// extensions unless the admin disappeared mid-check.
    pub async fn authorize(&self, parts: &mut Parts) -> Result<(), GateRejection> {
        let Some(admin_id) = self.extractor.extract(parts) else {
            tracing::debug!(requirement = %self.requirement, "no admin identity on request");
            return Err(GateRejection::Unauthenticated {
                message: self.unauthenticated_message.to_string(),
            });
        };

        let granted = self.evaluate(&admin_id).await.map_err(|err| {
            tracing::error!(admin_id = %admin_id, error = %err, "permission check failed");
            GateRejection::from(err)
        })?;

        if !granted {
            tracing::info!(admin_id = %admin_id, requirement = %self.requirement, "permission denied");
            return Err(GateRejection::Forbidden {
                message: self.forbidden_message.to_string(),
                required: self.requirement.to_string(),
            });
        }

        if parts.extensions.get::<AdminIdentity>().is_none() {
            let role_id = self.resolver.try_admin_role_id(&admin_id).await.map_err(|err| {
                tracing::error!(admin_id = %admin_id, error = %err, "role lookup failed after grant");
                GateRejection::from(err)
            })?;
            if let Some(role_id) = role_id {
                parts.extensions.insert(AdminIdentity {
                    admin_id: admin_id.clone(),
                    role_id,
                });
            }
        }

        tracing::debug!(admin_id = %admin_id, requirement = %self.requirement, "permission granted");
        Ok(())
    }
}

impl fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionGate")
            .field("requirement", &self.requirement)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for PermissionGate {
    type Service = PermissionGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PermissionGateService {
            inner,
            gate: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct PermissionGateService<S> {
    inner: S,
    gate: PermissionGate,
}

impl<S> Service<Request> for PermissionGateService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let gate = self.gate.clone();
        // the clone that was polled ready is the one that must serve the call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            match gate.authorize(&mut parts).await {
                Ok(()) => inner.call(Request::from_parts(parts, body)).await,
                Err(rejection) => Ok(rejection.into_response()),
            }
        })
    }
}
