//! HTTP handlers for the authorization service (§4.4, §6): a thin network
//! surface over `shared_authz::AuthorizationService`, for other services
//! (or the gateway's own edge) that want the decision pipeline over HTTP
//! instead of embedding `shared_authz` as a library.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use validator::Validate;

use shared_authz::{AuthUser, TokenCodecProvider};
use shared_error::{ok, AppError};
use shared_jwt::TokenCodec;

use authz_service_core::dto::{AuthorizeReq, AuthorizeResp, BatchAuthorizeReq};
use authz_service_infra::AppAuthorizationService;

#[derive(Clone)]
pub struct AppState {
    pub authorization: Arc<AppAuthorizationService>,
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

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, body = HealthResp)))]
pub async fn health_check() -> Json<HealthResp> {
    Json(HealthResp { status: "ok".to_string(), version: env!("CARGO_PKG_VERSION").to_string(), timestamp: Utc::now() })
}

#[utoipa::path(get, path = "/ready", tag = "health", responses((status = 200, body = HealthResp)))]
pub async fn ready_check() -> Json<HealthResp> {
    Json(HealthResp { status: "ready".to_string(), version: env!("CARGO_PKG_VERSION").to_string(), timestamp: Utc::now() })
}

fn validated<T: Validate>(payload: T) -> Result<T, AppError> {
    payload.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;
    Ok(payload)
}

/// `POST /api/v1/authorize`: single-decision form of §4.4's `decide`. The
/// subject is always the verified caller (`AuthUser`), never a body field
/// (`dto::user_context_from_auth`'s doc comment explains why).
#[utoipa::path(post, path = "/api/v1/authorize", tag = "authorize", request_body = AuthorizeReq,
    responses((status = 200, body = AuthorizeResp)), security(("bearer_auth" = [])))]
pub async fn authorize(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AuthorizeReq>,
) -> Result<Response, AppError> {
    let payload = validated(payload)?;
    let input = payload.build_input(&user);
    let resource_id = payload.resource_id.clone().unwrap_or_default();
    let allowed = state
        .authorization
        .decide(user.user_id, &payload.resource_type, &resource_id, &payload.action, &input)
        .await?;
    Ok(ok(AuthorizeResp { allowed }))
}

/// `POST /api/v1/authorize/batch`: §4.4's `decide_many`. Ordering of the
/// returned map is not guaranteed; a single tuple's failure is reported as
/// an `error` entry rather than failing the whole batch.
#[utoipa::path(post, path = "/api/v1/authorize/batch", tag = "authorize", request_body = BatchAuthorizeReq,
    responses((status = 200, description = "Map of \"resource_type:resource_id:action\" to decision")),
    security(("bearer_auth" = [])))]
pub async fn authorize_batch(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BatchAuthorizeReq>,
) -> Result<Response, AppError> {
    let payload = validated(payload)?;
    let requests = payload.build_requests(&user);
    let results = state.authorization.decide_many(user.user_id, requests).await;
    Ok(ok(results))
}
