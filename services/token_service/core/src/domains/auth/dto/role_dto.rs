use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Role & permission management DTOs (§11's supplemented feature,
/// grounded in the distilled spec's Role/Permission data model).
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateRoleReq {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: Option<String>,
    pub parent_role_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleResp {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub parent_role_id: Option<Uuid>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct AssignRoleReq {
    pub role_id: Uuid,
    /// Optional expiry for this role assignment (§3's timestamped edge).
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreatePermissionReq {
    #[validate(length(min = 1))]
    pub name: String,
    pub resource_type: String,
    pub action: String,
    #[schema(example = "own")]
    pub scope: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PermissionResp {
    pub id: Uuid,
    pub name: String,
    pub resource_type: String,
    pub action: String,
    pub scope: String,
    pub is_system: bool,
}
