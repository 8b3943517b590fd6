//! HTTP handlers for the policy bundle builder (§6, §11): policy document
//! CRUD plus validate/test/publish, bundle create/list/get/delete, bundle
//! activation/deployment/rollback, and deployment history. Grounded on
//! `token_service_api::handlers`'s split and pagination-query convention.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared_authz::{AuthUser, RequireAdmin, TenantOverride, TokenCodecProvider};
use shared_error::{ok, ok_with_status, AppError};
use shared_jwt::TokenCodec;

use bundle_service_core::domains::bundle::domain::service::BundleBuilderService;
use bundle_service_core::domains::bundle::dto::bundle_dto::{
    BundleListResp, BundleResp, CreateBundleReq, DeployBundleReq, RollbackBundleReq,
};
use bundle_service_core::domains::bundle::dto::policy_dto::{
    CreatePolicyReq, PolicyListResp, PolicyResp, UpdatePolicyReq,
};

#[derive(Clone)]
pub struct AppState {
    pub builder: Arc<dyn BundleBuilderService>,
    pub token_codec: Arc<TokenCodec>,
}

impl TokenCodecProvider for AppState {
    fn token_codec(&self) -> &TokenCodec {
        &self.token_codec
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResp {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }
    fn page_size(&self) -> i64 {
        self.page_size.unwrap_or(20).clamp(1, 200)
    }
}

fn validated<T: Validate>(payload: T) -> Result<T, AppError> {
    payload.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;
    Ok(payload)
}

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, body = HealthResp)))]
pub async fn health_check() -> Json<HealthResp> {
    Json(HealthResp { status: "ok".to_string(), version: env!("CARGO_PKG_VERSION").to_string(), timestamp: Utc::now() })
}

#[utoipa::path(get, path = "/ready", tag = "health", responses((status = 200, body = HealthResp)))]
pub async fn ready_check() -> Json<HealthResp> {
    Json(HealthResp { status: "ready".to_string(), version: env!("CARGO_PKG_VERSION").to_string(), timestamp: Utc::now() })
}

// -- Policies --

#[utoipa::path(post, path = "/api/v1/policies", tag = "policies", request_body = CreatePolicyReq,
    responses((status = 201, body = PolicyResp), (status = 409, description = "Path already exists")),
    security(("bearer_auth" = [])))]
pub async fn create_policy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(payload): Json<CreatePolicyReq>,
) -> Result<Response, AppError> {
    let payload = validated(payload)?;
    let policy = state.builder.create_policy(Some(admin.tenant_id), payload).await?;
    Ok(ok_with_status(StatusCode::CREATED, PolicyResp::from(policy)))
}

#[utoipa::path(get, path = "/api/v1/policies", tag = "policies", params(PageQuery),
    responses((status = 200, body = PolicyListResp)), security(("bearer_auth" = [])))]
pub async fn list_policies(
    State(state): State<AppState>,
    user: AuthUser,
    TenantOverride(override_tenant): TenantOverride,
    Query(page): Query<PageQuery>,
) -> Result<Response, AppError> {
    let tenant_id = Some(user.effective_tenant(override_tenant));
    let (policies, total) = state.builder.list_policies(tenant_id, page.page(), page.page_size()).await?;
    Ok(ok(PolicyListResp {
        policies: policies.into_iter().map(PolicyResp::from).collect(),
        total,
        page: page.page(),
        page_size: page.page_size(),
    }))
}

#[utoipa::path(get, path = "/api/v1/policies/{id}", tag = "policies",
    responses((status = 200, body = PolicyResp)), security(("bearer_auth" = [])))]
pub async fn get_policy(
    State(state): State<AppState>,
    user: AuthUser,
    TenantOverride(override_tenant): TenantOverride,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let tenant_id = Some(user.effective_tenant(override_tenant));
    let policy = state.builder.get_policy(id, tenant_id).await?;
    Ok(ok(PolicyResp::from(policy)))
}

#[utoipa::path(put, path = "/api/v1/policies/{id}", tag = "policies", request_body = UpdatePolicyReq,
    responses((status = 200, body = PolicyResp)), security(("bearer_auth" = [])))]
pub async fn update_policy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePolicyReq>,
) -> Result<Response, AppError> {
    let payload = validated(payload)?;
    let policy = state.builder.update_policy(id, Some(admin.tenant_id), payload).await?;
    Ok(ok(PolicyResp::from(policy)))
}

#[utoipa::path(delete, path = "/api/v1/policies/{id}", tag = "policies",
    responses((status = 204, description = "Policy deleted")), security(("bearer_auth" = [])))]
pub async fn delete_policy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.builder.delete_policy(id, Some(admin.tenant_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/api/v1/policies/{id}/validate", tag = "policies",
    responses((status = 200, description = "Validation result")), security(("bearer_auth" = [])))]
pub async fn validate_policy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let resp = state.builder.validate_policy(id, Some(admin.tenant_id)).await?;
    Ok(ok(resp))
}

#[utoipa::path(post, path = "/api/v1/policies/{id}/test", tag = "policies",
    responses((status = 200, description = "Test case results")), security(("bearer_auth" = [])))]
pub async fn test_policy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let resp = state.builder.test_policy(id, Some(admin.tenant_id)).await?;
    Ok(ok(resp))
}

#[utoipa::path(post, path = "/api/v1/policies/{id}/publish", tag = "policies",
    responses((status = 200, body = PolicyResp)), security(("bearer_auth" = [])))]
pub async fn publish_policy(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let policy = state.builder.publish_policy(id, Some(admin.tenant_id), admin.user_id).await?;
    Ok(ok(PolicyResp::from(policy)))
}

// -- Bundles --

#[utoipa::path(post, path = "/api/v1/bundles", tag = "bundles", request_body = CreateBundleReq,
    responses((status = 202, body = BundleResp), (status = 409, description = "Version already exists")),
    security(("bearer_auth" = [])))]
pub async fn create_bundle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(payload): Json<CreateBundleReq>,
) -> Result<Response, AppError> {
    let payload = validated(payload)?;
    let bundle =
        state.builder.create_bundle(Some(admin.tenant_id), payload.name, payload.version, payload.policy_ids).await?;
    Ok(ok_with_status(StatusCode::ACCEPTED, BundleResp::from(bundle)))
}

#[utoipa::path(get, path = "/api/v1/bundles", tag = "bundles", params(PageQuery),
    responses((status = 200, body = BundleListResp)), security(("bearer_auth" = [])))]
pub async fn list_bundles(
    State(state): State<AppState>,
    user: AuthUser,
    TenantOverride(override_tenant): TenantOverride,
    Query(page): Query<PageQuery>,
) -> Result<Response, AppError> {
    let tenant_id = Some(user.effective_tenant(override_tenant));
    let (bundles, total) = state.builder.list_bundles(tenant_id, page.page(), page.page_size()).await?;
    Ok(ok(BundleListResp {
        bundles: bundles.into_iter().map(BundleResp::from).collect(),
        total,
        page: page.page(),
        page_size: page.page_size(),
    }))
}

#[utoipa::path(get, path = "/api/v1/bundles/{id}", tag = "bundles",
    responses((status = 200, body = BundleResp)), security(("bearer_auth" = [])))]
pub async fn get_bundle(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let bundle = state.builder.get_bundle(id).await?;
    Ok(ok(bundle))
}

#[utoipa::path(delete, path = "/api/v1/bundles/{id}", tag = "bundles",
    responses((status = 204, description = "Bundle deleted")), security(("bearer_auth" = [])))]
pub async fn delete_bundle(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.builder.delete_bundle(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(post, path = "/api/v1/bundles/{id}/activate", tag = "bundles",
    responses((status = 200, body = BundleResp), (status = 409, description = "Bundle is not READY")),
    security(("bearer_auth" = [])))]
pub async fn activate_bundle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let bundle = state.builder.activate_bundle(id, admin.user_id).await?;
    Ok(ok(BundleResp::from(bundle)))
}

#[utoipa::path(post, path = "/api/v1/bundles/{id}/deploy", tag = "bundles", request_body = DeployBundleReq,
    responses((status = 201, description = "Deployment recorded")), security(("bearer_auth" = [])))]
pub async fn deploy_bundle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeployBundleReq>,
) -> Result<Response, AppError> {
    let payload = validated(payload)?;
    let deployment = state.builder.deploy_bundle(id, admin.user_id, payload.environment).await?;
    Ok(ok_with_status(StatusCode::CREATED, deployment))
}

#[utoipa::path(post, path = "/api/v1/bundles/{id}/rollback", tag = "bundles", request_body = RollbackBundleReq,
    responses((status = 201, description = "Rollback recorded")), security(("bearer_auth" = [])))]
pub async fn rollback_bundle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<RollbackBundleReq>,
) -> Result<Response, AppError> {
    let payload = validated(payload)?;
    let deployment = state.builder.rollback_bundle(id, admin.user_id, payload.environment, payload.reason).await?;
    Ok(ok_with_status(StatusCode::CREATED, deployment))
}

#[utoipa::path(get, path = "/api/v1/bundles/{id}/deployments", tag = "bundles",
    responses((status = 200, description = "Deployment history")), security(("bearer_auth" = [])))]
pub async fn list_deployments(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let deployments = state.builder.list_deployments(id).await?;
    Ok(ok(deployments))
}
