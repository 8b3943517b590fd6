//! `SessionServiceImpl` — the token lifecycle engine (§4.2): wires the IDP,
//! the relational repositories, the KV-backed revocation store, and the
//! token codec behind the `SessionService` contract. Grounded on the
//! teacher's `AuthServiceImpl`, which composes the same kind of
//! multi-collaborator login/refresh/logout flow around its Casbin
//! enforcer and `shared-auth` session store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_error::AppError;
use shared_idp_client::IdentityProvider;
use shared_jwt::{Claims, TokenCodec, TokenKind};
use shared_kv::{DecisionCache, RevocationStore};
use shared_rate_limit::{middleware::RateLimitState, RateLimitEndpoint};
use uuid::Uuid;

use token_service_core::domains::auth::domain::model::{Subject, SubjectRole, Tenant, TenantStatus};
use token_service_core::domains::auth::domain::repository::{
    RoleRepository, SubjectRepository, TenantRepository,
};
use token_service_core::domains::auth::domain::service::SessionService;
use token_service_core::domains::auth::dto::auth_dto::{
    AuthResp, ChangePasswordReq, LoginReq, RegisterReq, UpdateUserReq, UserInfo, UserListResp,
};
use token_service_core::domains::auth::dto::role_dto::RoleResp;
use token_service_core::domains::auth::dto::tenant_dto::{CreateTenantReq, TenantListResp, TenantResp};

pub struct TokenLifetimes {
    pub access_seconds: i64,
    pub refresh_seconds: i64,
    pub remember_me_seconds: i64,
}

pub struct SessionServiceImpl {
    tenants: Arc<dyn TenantRepository>,
    subjects: Arc<dyn SubjectRepository>,
    roles: Arc<dyn RoleRepository>,
    idp: Arc<dyn IdentityProvider>,
    revocation: Arc<dyn RevocationStore>,
    decision_cache: Arc<dyn DecisionCache>,
    codec: Arc<TokenCodec>,
    rate_limit: Arc<RateLimitState>,
    lifetimes: TokenLifetimes,
}

impl SessionServiceImpl {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        subjects: Arc<dyn SubjectRepository>,
        roles: Arc<dyn RoleRepository>,
        idp: Arc<dyn IdentityProvider>,
        revocation: Arc<dyn RevocationStore>,
        decision_cache: Arc<dyn DecisionCache>,
        codec: Arc<TokenCodec>,
        rate_limit: Arc<RateLimitState>,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self { tenants, subjects, roles, idp, revocation, decision_cache, codec, rate_limit, lifetimes }
    }

    async fn resolve_tenant(&self, slug: Option<&str>) -> Result<Tenant, AppError> {
        let slug = slug.unwrap_or("default");
        let tenant = self
            .tenants
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant '{slug}' not found")))?;
        if tenant.status != TenantStatus::Active {
            return Err(AppError::Forbidden(format!("tenant '{slug}' is not active")));
        }
        Ok(tenant)
    }

    async fn to_user_info(&self, subject: &Subject) -> Result<UserInfo, AppError> {
        let roles = self.roles.role_names_for_subject(subject.subject_id, subject.tenant_id).await?;
        Ok(UserInfo {
            id: subject.subject_id,
            tenant_id: subject.tenant_id,
            email: subject.email.clone(),
            full_name: subject.full_name.clone(),
            roles,
            last_login_at: subject.last_login_at,
            created_at: subject.created_at,
        })
    }

    async fn mint_pair(&self, subject: &Subject, roles: Vec<String>) -> Result<(String, String, Uuid), AppError> {
        let access_claims = Claims::new(
            self.codec.issuer(),
            subject.subject_id,
            subject.tenant_id,
            subject.email.clone(),
            roles.clone(),
            TokenKind::Access,
            self.lifetimes.access_seconds,
        );
        let refresh_claims = Claims::new(
            self.codec.issuer(),
            subject.subject_id,
            subject.tenant_id,
            subject.email.clone(),
            roles,
            TokenKind::Refresh,
            self.lifetimes.refresh_seconds,
        );
        let refresh_jti = refresh_claims.jti;
        let access = self.codec.sign(&access_claims)?;
        let refresh = self.codec.sign(&refresh_claims)?;
        Ok((access, refresh, refresh_jti))
    }

    /// Registers a freshly minted refresh id. Per §4.2/§9, failure here is
    /// logged and swallowed: the session remains usable, just not
    /// refreshable until it expires naturally.
    async fn register_refresh_best_effort(&self, subject_id: Uuid, jti: Uuid, ttl_seconds: i64) {
        let ttl = Duration::from_secs(ttl_seconds.max(0) as u64);
        if let Err(err) = self.revocation.register_refresh(subject_id, jti, ttl).await {
            tracing::warn!(%subject_id, %jti, error = %err, "failed to register refresh token, session will not be refreshable");
        }
    }

    async fn rate_limit_check(&self, endpoint: RateLimitEndpoint, identifier: &str) -> Result<(), AppError> {
        match self.rate_limit.check_endpoint(endpoint, identifier).await {
            Ok(result) if result.allowed => Ok(()),
            Ok(result) => Err(AppError::RateLimited(format!(
                "too many attempts, retry after {}s",
                result.retry_after
            ))),
            Err(err) => {
                tracing::warn!(error = %err, "rate limiter unavailable, allowing request");
                Ok(())
            },
        }
    }
}

#[async_trait]
impl SessionService for SessionServiceImpl {
    async fn register(&self, req: RegisterReq, ip: &str) -> Result<AuthResp, AppError> {
        self.rate_limit_check(RateLimitEndpoint::Register, ip).await?;

        let tenant = self.resolve_tenant(req.tenant_slug.as_deref()).await?;
        if self.subjects.email_exists(&req.email, tenant.tenant_id).await? {
            return Err(AppError::Conflict(format!("email '{}' already registered", req.email)));
        }
        let subject_count = self.tenants.count_subjects(tenant.tenant_id).await?;
        if subject_count >= tenant.max_users as i64 {
            return Err(AppError::Conflict("tenant has reached its user quota".to_string()));
        }

        let identity = self.idp.register(&req.email, &req.password).await?;
        let subject_id = Uuid::parse_str(&identity.subject_id)
            .map_err(|e| AppError::Internal(format!("idp returned a non-uuid subject id: {e}")))?;

        let mut subject = Subject::new(subject_id, tenant.tenant_id, identity.email, req.full_name);
        subject.record_login();
        let subject = self.subjects.create(&subject).await?;

        let roles = self.roles.role_names_for_subject(subject.subject_id, tenant.tenant_id).await?;
        let (access, refresh, refresh_jti) = self.mint_pair(&subject, roles).await?;
        self.register_refresh_best_effort(subject.subject_id, refresh_jti, self.lifetimes.refresh_seconds).await;

        tracing::info!(subject_id = %subject.subject_id, tenant_id = %tenant.tenant_id, "subject registered");

        Ok(AuthResp {
            access_token: access,
            refresh_token: refresh,
            token_type: "Bearer".to_string(),
            expires_in: self.lifetimes.access_seconds,
            user: self.to_user_info(&subject).await?,
        })
    }

    async fn login(&self, req: LoginReq, ip: &str) -> Result<AuthResp, AppError> {
        self.rate_limit_check(RateLimitEndpoint::Login, ip).await?;

        let tenant = self.resolve_tenant(req.tenant_slug.as_deref()).await?;
        let identity = self.idp.verify_credentials(&req.email, &req.password).await?;
        let subject_id = Uuid::parse_str(&identity.subject_id)
            .map_err(|e| AppError::Internal(format!("idp returned a non-uuid subject id: {e}")))?;

        let mut subject = match self.subjects.find_by_id(subject_id, tenant.tenant_id).await? {
            Some(subject) => subject,
            None => {
                let subject = Subject::new(subject_id, tenant.tenant_id, identity.email, None);
                self.subjects.create(&subject).await?
            },
        };
        subject.record_login();
        let subject = self.subjects.update(&subject).await?;

        let roles = self.roles.role_names_for_subject(subject.subject_id, tenant.tenant_id).await?;
        let (access, refresh, refresh_jti) = self.mint_pair(&subject, roles).await?;

        let registry_ttl = if req.remember_me {
            self.lifetimes.remember_me_seconds
        } else {
            self.lifetimes.refresh_seconds
        };
        self.register_refresh_best_effort(subject.subject_id, refresh_jti, registry_ttl).await;

        tracing::info!(subject_id = %subject.subject_id, tenant_id = %tenant.tenant_id, remember_me = req.remember_me, "login succeeded");

        Ok(AuthResp {
            access_token: access,
            refresh_token: refresh,
            token_type: "Bearer".to_string(),
            expires_in: self.lifetimes.access_seconds,
            user: self.to_user_info(&subject).await?,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthResp, AppError> {
        let claims = self
            .codec
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|e| AppError::InvalidToken(e.to_string()))?;

        self.rate_limit_check(RateLimitEndpoint::Refresh, &claims.sub.to_string()).await?;

        let registered = self.revocation.is_refresh_registered(claims.sub, claims.jti).await?;
        if !registered {
            return Err(AppError::InvalidToken("refresh token is not registered".to_string()));
        }

        let subject = self
            .subjects
            .find_by_id(claims.sub, claims.tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("subject not found".to_string()))?;

        let roles = self.roles.role_names_for_subject(subject.subject_id, subject.tenant_id).await?;
        let (access, new_refresh, new_refresh_jti) = self.mint_pair(&subject, roles).await?;

        // Register-new-then-delete-old (§4.2): a failure between these two
        // calls must never leave the caller without a usable refresh id.
        self.register_refresh_best_effort(subject.subject_id, new_refresh_jti, self.lifetimes.refresh_seconds)
            .await;
        if let Err(err) = self.revocation.revoke_refresh(claims.sub, claims.jti).await {
            tracing::warn!(subject_id = %claims.sub, jti = %claims.jti, error = %err, "failed to revoke old refresh id, it will expire naturally");
        }

        tracing::info!(subject_id = %subject.subject_id, old_jti = %claims.jti, new_jti = %new_refresh_jti, "refresh succeeded");

        Ok(AuthResp {
            access_token: access,
            refresh_token: new_refresh,
            token_type: "Bearer".to_string(),
            expires_in: self.lifetimes.access_seconds,
            user: self.to_user_info(&subject).await?,
        })
    }

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AppError> {
        let access_claims = self
            .codec
            .verify(access_token, TokenKind::Access)
            .map_err(|e| AppError::InvalidToken(e.to_string()))?;

        let remaining = (access_claims.exp - Utc::now().timestamp()).max(1) as u64;
        self.revocation.blacklist(access_claims.jti, Duration::from_secs(remaining)).await?;

        if let Ok(refresh_claims) = self.codec.verify(refresh_token, TokenKind::Refresh) {
            if refresh_claims.sub != access_claims.sub {
                return Err(AppError::InvalidToken(
                    "refresh token does not belong to the same subject".to_string(),
                ));
            }
        }
        self.revocation.revoke_all_refresh(access_claims.sub).await?;

        tracing::info!(subject_id = %access_claims.sub, jti = %access_claims.jti, "logout succeeded");
        Ok(())
    }

    async fn logout_everywhere(&self, subject_id: Uuid, _tenant_id: Uuid) -> Result<(), AppError> {
        self.revocation.revoke_all_refresh(subject_id).await?;
        tracing::info!(%subject_id, "logout-everywhere succeeded");
        Ok(())
    }

    async fn authenticate(&self, access_token: &str) -> Result<Claims, AppError> {
        let claims = self
            .codec
            .verify(access_token, TokenKind::Access)
            .map_err(|e| AppError::InvalidToken(e.to_string()))?;

        // Fail closed: revocation-store unavailability must not allow a
        // blacklisted token through (§4.2's failure semantics).
        let blacklisted = self.revocation.is_blacklisted(claims.jti).await?;
        if blacklisted {
            return Err(AppError::TokenRevoked);
        }
        Ok(claims)
    }

    async fn change_password(
        &self,
        subject_id: Uuid,
        tenant_id: Uuid,
        req: ChangePasswordReq,
    ) -> Result<(), AppError> {
        let subject = self
            .subjects
            .find_by_id(subject_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subject {subject_id} not found")))?;

        self.idp
            .change_password(&subject.subject_id.to_string(), &req.current_password, &req.new_password)
            .await?;

        // A changed credential must not leave a stolen refresh token
        // usable (mirrors logout-everywhere's revoke-all-refresh).
        self.revocation.revoke_all_refresh(subject_id).await?;

        tracing::info!(%subject_id, "password changed, all refresh sessions revoked");
        Ok(())
    }

    async fn get_user(&self, subject_id: Uuid, tenant_id: Uuid) -> Result<UserInfo, AppError> {
        let subject = self
            .subjects
            .find_by_id(subject_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subject {subject_id} not found")))?;
        self.to_user_info(&subject).await
    }

    async fn update_user(
        &self,
        subject_id: Uuid,
        tenant_id: Uuid,
        req: UpdateUserReq,
    ) -> Result<UserInfo, AppError> {
        let mut subject = self
            .subjects
            .find_by_id(subject_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("subject {subject_id} not found")))?;

        if let Some(full_name) = req.full_name {
            subject.full_name = Some(full_name);
        }
        if let Some(metadata) = req.metadata {
            subject.metadata = sqlx::types::Json(metadata);
        }
        subject.updated_at = Utc::now();

        let subject = self.subjects.update(&subject).await?;
        self.to_user_info(&subject).await
    }

    async fn delete_user(&self, subject_id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        self.subjects.soft_delete(subject_id, tenant_id).await?;
        self.revocation.revoke_all_refresh(subject_id).await?;
        self.decision_cache.invalidate_user(subject_id).await?;
        Ok(())
    }

    async fn list_users(&self, tenant_id: Uuid, page: i64, page_size: i64) -> Result<UserListResp, AppError> {
        let (subjects, total) = self.subjects.list(tenant_id, page, page_size).await?;
        let mut users = Vec::with_capacity(subjects.len());
        for subject in &subjects {
            users.push(self.to_user_info(subject).await?);
        }
        Ok(UserListResp { users, total, page, page_size })
    }

    async fn user_permissions(&self, subject_id: Uuid, tenant_id: Uuid) -> Result<Vec<String>, AppError> {
        self.roles.permission_strings_for_subject(subject_id, tenant_id).await
    }

    async fn assign_role(
        &self,
        subject_id: Uuid,
        role_id: Uuid,
        tenant_id: Uuid,
        assigned_by: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        self.roles
            .assign(&SubjectRole { subject_id, role_id, tenant_id, assigned_by, assigned_at: Utc::now(), expires_at })
            .await?;
        // §11: cached decisions for this subject are now stale.
        self.decision_cache.invalidate_user(subject_id).await?;
        Ok(())
    }

    async fn revoke_role(&self, subject_id: Uuid, role_id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        self.roles.revoke(subject_id, role_id, tenant_id).await?;
        self.decision_cache.invalidate_user(subject_id).await?;
        Ok(())
    }

    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<RoleResp>, AppError> {
        let roles = self.roles.list(tenant_id).await?;
        Ok(roles
            .into_iter()
            .map(|r| RoleResp {
                id: r.role_id,
                tenant_id: r.tenant_id,
                name: r.name,
                description: r.description,
                parent_role_id: r.parent_role_id,
                is_system: r.is_system,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn create_tenant(&self, req: CreateTenantReq) -> Result<TenantResp, AppError> {
        let tenant = Tenant::new(req.name, req.slug, req.max_users, req.max_roles);
        let tenant = self.tenants.create(&tenant).await?;
        Ok(tenant_to_resp(tenant))
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<TenantResp, AppError> {
        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("tenant {tenant_id} not found")))?;
        Ok(tenant_to_resp(tenant))
    }

    async fn list_tenants(&self, page: i64, page_size: i64) -> Result<TenantListResp, AppError> {
        let (tenants, total) = self.tenants.list(page, page_size).await?;
        Ok(TenantListResp { tenants: tenants.into_iter().map(tenant_to_resp).collect(), total, page, page_size })
    }

    async fn suspend_tenant(&self, tenant_id: Uuid) -> Result<TenantResp, AppError> {
        let tenant = self.tenants.update_status(tenant_id, TenantStatus::Suspended).await?;
        Ok(tenant_to_resp(tenant))
    }

    async fn reactivate_tenant(&self, tenant_id: Uuid) -> Result<TenantResp, AppError> {
        let tenant = self.tenants.update_status(tenant_id, TenantStatus::Active).await?;
        Ok(tenant_to_resp(tenant))
    }
}

fn tenant_to_resp(tenant: Tenant) -> TenantResp {
    TenantResp {
        id: tenant.tenant_id,
        name: tenant.name,
        slug: tenant.slug,
        status: tenant.status,
        max_users: tenant.max_users,
        max_roles: tenant.max_roles,
        settings: tenant.settings.0,
        created_at: tenant.created_at,
    }
}
