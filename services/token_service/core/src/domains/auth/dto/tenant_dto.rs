use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::domains::auth::domain::model::TenantStatus;

/// Tenant administration DTOs (§11's supplemented "tenant administration"
/// feature, grounded in the teacher's admin create/suspend/delete-user
/// handlers applied one level up to tenants).
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateTenantReq {
    #[validate(length(min = 1))]
    #[schema(example = "Acme Corp")]
    pub name: String,

    #[validate(length(min = 1))]
    #[schema(example = "acme-corp")]
    pub slug: String,

    #[serde(default = "default_max_users")]
    pub max_users: i32,
    #[serde(default = "default_max_roles")]
    pub max_roles: i32,
}

fn default_max_users() -> i32 {
    100
}
fn default_max_roles() -> i32 {
    20
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateTenantStatusReq {
    pub status: TenantStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TenantResp {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub max_users: i32,
    pub max_roles: i32,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TenantListResp {
    pub tenants: Vec<TenantResp>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}
