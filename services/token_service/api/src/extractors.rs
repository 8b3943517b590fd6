//! Authenticated-caller extractor for this service's own edge. Unlike
//! `shared_authz::AuthUser` (signature-only, meant for services downstream
//! of a gateway that already checked revocation), this one goes through
//! `SessionService::authenticate` so the blacklist is consulted on every
//! request, per §4.2's fail-closed authentication contract.

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
};
use shared_error::AppError;
use uuid::Uuid;

use token_service_core::domains::auth::domain::model::{SUPER_ADMIN_ROLE, TENANT_ADMIN_ROLE};

use crate::handlers::AppState;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(SUPER_ADMIN_ROLE) || self.has_role(TENANT_ADMIN_ROLE)
    }

    /// The tenant to scope a request to: the subject's own tenant, unless
    /// an `X-Tenant-ID` override is present and the caller is a super
    /// admin (§6's tenant override rule).
    pub fn effective_tenant(&self, override_header: Option<Uuid>) -> Uuid {
        match override_header {
            Some(tenant_id) if self.has_role(SUPER_ADMIN_ROLE) => tenant_id,
            _ => self.tenant_id,
        }
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthenticated("missing authorization header".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthenticated("authorization header is not a bearer token".to_string()))?;

        let State(state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Internal("failed to extract app state".to_string()))?;

        let claims = state.session_service.authenticate(token).await?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            email: claims.email,
            roles: claims.roles,
        })
    }
}

/// Requires [`AuthenticatedUser::is_admin`]; rejects otherwise.
pub struct RequireAdmin(pub AuthenticatedUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("admin role required".to_string()));
        }
        Ok(RequireAdmin(user))
    }
}

/// Parses the `X-Tenant-ID` override header, if present (§6).
pub struct TenantOverride(pub Option<Uuid>);

impl<S> FromRequestParts<S> for TenantOverride
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = parts
            .headers
            .get("x-tenant-id")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok());
        Ok(TenantOverride(tenant_id))
    }
}

/// Extracts the caller's remote IP for rate limiting, preferring
/// `X-Forwarded-For`'s first hop (teacher's reverse-proxy deployment
/// assumption) and falling back to the socket address.
pub fn client_ip(headers: &axum::http::HeaderMap, addr: std::net::SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string())
}
