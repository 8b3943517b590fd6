//! Axum extractors for authenticated/authorized handlers, grounded on the
//! teacher's `AuthUser`/`RequireRole`/`RequirePermission` extractors,
//! generalized from HS256 + Casbin enforcer to RS256 `TokenCodec` +
//! the five-layer `AuthorizationService`.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_jwt::{Claims, TokenCodec, TokenKind};

use crate::context::DecisionInput;

pub trait TokenCodecProvider {
    fn token_codec(&self) -> &TokenCodec;
}

/// Authenticated caller, extracted from a verified access token. Does not
/// check revocation — that's the session service's job at its own edge
/// (§4.2); this extractor is for services downstream of the gateway that
/// only need to trust a signature the gateway already validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Self {
        Self { user_id: claims.sub, tenant_id: claims.tenant_id, email: claims.email, roles: claims.roles }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role("super_admin")
    }

    pub fn is_admin(&self) -> bool {
        self.is_super_admin() || self.has_role("tenant_admin")
    }

    /// The tenant to scope a request to: the subject's own tenant, unless
    /// an `X-Tenant-ID` override is present and the subject has
    /// cross-tenant capability (§6's tenant override rule).
    pub fn effective_tenant(&self, override_header: Option<Uuid>) -> Uuid {
        match override_header {
            Some(tenant_id) if self.is_super_admin() => tenant_id,
            _ => self.tenant_id,
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync + TokenCodecProvider,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let token = auth_header.strip_prefix("Bearer ").ok_or(StatusCode::UNAUTHORIZED)?;

        let claims = state.token_codec().verify(token, TokenKind::Access).map_err(|e| {
            warn!("access token verification failed: {}", e);
            StatusCode::UNAUTHORIZED
        })?;

        debug!(user_id = %claims.sub, tenant_id = %claims.tenant_id, "authenticated request");
        Ok(AuthUser::from_claims(claims))
    }
}

/// Parses the `X-Tenant-ID` override header, if present.
pub struct TenantOverride(pub Option<Uuid>);

impl<S> FromRequestParts<S> for TenantOverride
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = parts
            .headers
            .get("x-tenant-id")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok());
        Ok(TenantOverride(tenant_id))
    }
}

pub trait Role {
    fn name() -> &'static str;
}

#[derive(Debug, Clone)]
pub struct RequireRole<R: Role> {
    pub user: AuthUser,
    _phantom: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for RequireRole<R>
where
    R: Role + Send + Sync,
    S: Send + Sync + TokenCodecProvider,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        let required_role = R::name();

        let authorized = if required_role == "admin" { user.is_admin() } else { user.has_role(required_role) };

        if !authorized {
            warn!(user_id = %user.user_id, required_role, "role check failed");
            return Err(StatusCode::FORBIDDEN);
        }

        Ok(RequireRole { user, _phantom: PhantomData })
    }
}

pub struct AdminRole;
impl Role for AdminRole {
    fn name() -> &'static str {
        "admin"
    }
}

#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync + TokenCodecProvider,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let role_extractor = RequireRole::<AdminRole>::from_request_parts(parts, state).await?;
        Ok(RequireAdmin(role_extractor.user))
    }
}

/// Type-erased authorization check, placed in request extensions by a
/// service's own middleware (mirrors the teacher's `SharedEnforcer`
/// extensions pattern, generalized to the five-layer decision pipeline).
#[async_trait]
pub trait AuthzChecker: Send + Sync {
    async fn check(
        &self,
        user_id: Uuid,
        resource_type: &str,
        resource_id: &str,
        action: &str,
        input: &DecisionInput,
    ) -> Result<bool, shared_error::AppError>;
}

pub type SharedAuthzChecker = Arc<dyn AuthzChecker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_case_sensitive_exact_match() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            roles: vec!["tenant_admin".to_string()],
        };
        assert!(user.has_role("tenant_admin"));
        assert!(!user.has_role("super_admin"));
        assert!(user.is_admin());
        assert!(!user.is_super_admin());
    }

    #[test]
    fn tenant_override_requires_super_admin() {
        let tenant_id = Uuid::new_v4();
        let other_tenant = Uuid::new_v4();
        let member = AuthUser {
            user_id: Uuid::new_v4(),
            tenant_id,
            email: "a@example.com".to_string(),
            roles: vec!["member".to_string()],
        };
        assert_eq!(member.effective_tenant(Some(other_tenant)), tenant_id);

        let super_admin = AuthUser { roles: vec!["super_admin".to_string()], ..member };
        assert_eq!(super_admin.effective_tenant(Some(other_tenant)), other_tenant);
    }
}
