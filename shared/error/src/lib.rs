use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// The one error type that crosses every seam between the token, authz and
/// bundle services and the axum edge. Leaf errors from collaborators
/// (sqlx, reqwest, redis) convert into this via `From` impls rather than
/// being threaded through call sites by hand.
#[derive(Debug)]
pub enum AppError {
    /// Malformed payload or schema violation (400).
    BadRequest(String),
    /// Field-level validation failure (400).
    ValidationError(String),
    /// Missing or unparsable bearer token (401).
    Unauthenticated(String),
    /// A token that parsed but failed verification (401).
    InvalidToken(String),
    /// A token whose id is present in the revocation store (401).
    TokenRevoked,
    /// Caller is authenticated but the policy layer denies (403).
    Forbidden(String),
    /// Subject's tenant differs from the resource's tenant (403).
    TenantIsolationViolation,
    /// A request that requires an explicit tenant context carries none (400).
    TenantRequired,
    /// A protected operation requires a fresher MFA assertion (403).
    MfaRequired,
    /// Entity does not exist, or is soft-deleted (404).
    NotFound(String),
    /// Uniqueness violation or state-machine violation (409).
    Conflict(String),
    /// Caller exceeded a rate limit window (429).
    RateLimited(String),
    /// The policy engine could not be reached or returned garbage (502).
    AuthzEvaluationFailed(String),
    /// A downstream collaborator (IDP, policy engine, object store) is down (502).
    DependencyUnavailable(String),
    /// A downstream call exceeded its deadline (504).
    DependencyTimeout(String),
    /// Database driver error, opaqued to the caller (500).
    Database(sqlx::Error),
    /// Process configuration is missing or invalid (500).
    ConfigError(String),
    /// Catch-all internal fault (500); logged with a correlation id before
    /// being opaqued.
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            AppError::InvalidToken(msg) => write!(f, "Invalid token: {}", msg),
            AppError::TokenRevoked => write!(f, "Token revoked"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::TenantIsolationViolation => write!(f, "Tenant isolation violation"),
            AppError::TenantRequired => write!(f, "Tenant context required"),
            AppError::MfaRequired => write!(f, "MFA verification required"),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::RateLimited(msg) => write!(f, "Rate limited: {}", msg),
            AppError::AuthzEvaluationFailed(msg) => {
                write!(f, "Authorization evaluation failed: {}", msg)
            },
            AppError::DependencyUnavailable(msg) => write!(f, "Dependency unavailable: {}", msg),
            AppError::DependencyTimeout(msg) => write!(f, "Dependency timeout: {}", msg),
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// (status, error_code, message) used both by `IntoResponse` and by
    /// callers that need to inspect a failure without rendering it.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            },
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", msg.clone()),
            AppError::TokenRevoked => (StatusCode::UNAUTHORIZED, "TOKEN_REVOKED", self.to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::TenantIsolationViolation => (
                StatusCode::FORBIDDEN,
                "TENANT_ISOLATION_VIOLATION",
                self.to_string(),
            ),
            AppError::TenantRequired => {
                (StatusCode::BAD_REQUEST, "TENANT_REQUIRED", self.to_string())
            },
            AppError::MfaRequired => (StatusCode::FORBIDDEN, "MFA_REQUIRED", self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::RateLimited(msg) => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT_EXCEEDED", msg.clone())
            },
            AppError::AuthzEvaluationFailed(msg) => {
                (StatusCode::BAD_GATEWAY, "AUTHZ_EVALUATION_FAILED", msg.clone())
            },
            AppError::DependencyUnavailable(msg) => {
                (StatusCode::BAD_GATEWAY, "DEPENDENCY_UNAVAILABLE", msg.clone())
            },
            AppError::DependencyTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "DEPENDENCY_TIMEOUT", msg.clone())
            },
            AppError::Database(_) | AppError::ConfigError(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "internal error".to_string())
            },
        }
    }

    /// True for faults that should be logged with full detail server-side
    /// and opaqued to the client, rather than echoed back verbatim.
    fn is_internal(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::ConfigError(_) | AppError::Internal(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if self.is_internal() {
            let correlation_id = uuid::Uuid::new_v4();
            tracing::error!(%correlation_id, error = %self, "internal error");
            let body = Json(json!({
                "success": false,
                "error": {
                    "code": code,
                    "message": format!("internal error, correlation_id={correlation_id}"),
                }
            }));
            return (status, body).into_response();
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
            }
        }));
        (status, body).into_response()
    }
}

/// Wraps a successful payload in the `{"success": true, "data": ...}` envelope.
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
}

/// Like [`ok`] but with an explicit status code (e.g. 201 Created).
pub fn ok_with_status<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(json!({ "success": true, "data": data }))).into_response()
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("record not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::DependencyUnavailable(format!("kv store: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::DependencyTimeout(err.to_string())
        } else {
            AppError::DependencyUnavailable(err.to_string())
        }
    }
}
