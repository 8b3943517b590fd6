use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

use crate::domains::auth::dto::auth_dto::{
    AuthResp, ChangePasswordReq, LoginReq, RegisterReq, UpdateUserReq, UserInfo, UserListResp,
};
use crate::domains::auth::dto::role_dto::RoleResp;
use crate::domains::auth::dto::tenant_dto::{CreateTenantReq, TenantListResp, TenantResp};

use shared_jwt::Claims;

/// The session/token service (§2, §4.2): login, refresh, logout,
/// logout-everywhere, request authentication, plus the supplemented
/// tenant/role/permission administration surface (§11). Implementations
/// own the coordination between the IDP, the relational store, and the
/// KV-backed revocation store — this trait is the seam the `api` crate's
/// handlers depend on.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Delegates credential creation to the IDP, then creates or reuses
    /// the local subject row and mints the first token pair.
    async fn register(&self, req: RegisterReq, ip: &str) -> Result<AuthResp, AppError>;

    /// Delegates credential verification to the IDP; on success mints an
    /// (access, refresh) pair and registers the refresh id (§4.2).
    async fn login(&self, req: LoginReq, ip: &str) -> Result<AuthResp, AppError>;

    /// Verifies the refresh token, consults the registry, mints a new
    /// pair, registers the new id, then deletes the old one (§4.2's
    /// atomic register-new-then-delete-old ordering).
    async fn refresh(&self, refresh_token: &str) -> Result<AuthResp, AppError>;

    /// Blacklists the presenter's access token id and revokes every
    /// refresh id under the subject.
    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), AppError>;

    /// Revokes every refresh id under the subject without touching the
    /// blacklist (§4.2).
    async fn logout_everywhere(&self, subject_id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;

    /// Verifies an access token, rejecting blacklisted ids (§4.2's
    /// "authenticate request" operation).
    async fn authenticate(&self, access_token: &str) -> Result<Claims, AppError>;

    /// `POST /auth/password/change` (§6): delegates verification and
    /// replacement to the IDP, then revokes every refresh id under the
    /// subject — a changed credential must not leave a stolen refresh
    /// token usable.
    async fn change_password(
        &self,
        subject_id: Uuid,
        tenant_id: Uuid,
        req: ChangePasswordReq,
    ) -> Result<(), AppError>;

    async fn get_user(&self, subject_id: Uuid, tenant_id: Uuid) -> Result<UserInfo, AppError>;

    async fn update_user(
        &self,
        subject_id: Uuid,
        tenant_id: Uuid,
        req: UpdateUserReq,
    ) -> Result<UserInfo, AppError>;

    async fn delete_user(&self, subject_id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;

    async fn list_users(&self, tenant_id: Uuid, page: i64, page_size: i64) -> Result<UserListResp, AppError>;

    async fn user_permissions(&self, subject_id: Uuid, tenant_id: Uuid) -> Result<Vec<String>, AppError>;

    /// Assigns a role to a subject and invalidates that subject's cached
    /// authorization decisions (§4.4's invalidation rule, §11's
    /// supplemented role management feature).
    async fn assign_role(
        &self,
        subject_id: Uuid,
        role_id: Uuid,
        tenant_id: Uuid,
        assigned_by: Uuid,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<(), AppError>;

    async fn revoke_role(
        &self,
        subject_id: Uuid,
        role_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<(), AppError>;

    async fn list_roles(&self, tenant_id: Uuid) -> Result<Vec<RoleResp>, AppError>;

    async fn create_tenant(&self, req: CreateTenantReq) -> Result<TenantResp, AppError>;

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<TenantResp, AppError>;

    async fn list_tenants(&self, page: i64, page_size: i64) -> Result<TenantListResp, AppError>;

    async fn suspend_tenant(&self, tenant_id: Uuid) -> Result<TenantResp, AppError>;

    async fn reactivate_tenant(&self, tenant_id: Uuid) -> Result<TenantResp, AppError>;
}
