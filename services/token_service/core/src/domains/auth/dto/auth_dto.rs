use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// `POST /auth/register` request. Credential verification and password
/// storage are delegated entirely to the IDP (§1's Non-goals); this
/// request only carries what the IDP needs plus the local profile fields
/// the session service persists.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterReq {
    #[validate(email)]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[validate(length(min = 8))]
    #[schema(example = "P@ssw0rd!", min_length = 8)]
    pub password: String,

    pub full_name: Option<String>,

    /// Tenant slug to join. Omitted only when the deployment has a single
    /// default tenant.
    #[schema(example = "default")]
    pub tenant_slug: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginReq {
    #[validate(email)]
    #[schema(example = "alice@example.com")]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,

    #[schema(example = "default")]
    pub tenant_slug: Option<String>,

    /// Extends the refresh token's registry TTL to the longer
    /// "remember me" horizon without changing the signed claim's `exp`
    /// (§4.2 — the registry is the authoritative lifetime).
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct RefreshReq {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct LogoutReq {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub roles: Vec<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResp {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Access token lifetime in seconds (§4.2).
    #[schema(example = 900)]
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResp {
    pub users: Vec<UserInfo>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PermissionsResp {
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateUserReq {
    pub full_name: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct ChangePasswordReq {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8))]
    pub new_password: String,
}
