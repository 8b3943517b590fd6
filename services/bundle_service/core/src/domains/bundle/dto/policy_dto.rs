use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::domains::bundle::domain::model::{PolicyDocument, PolicyDocumentStatus, PolicyKind};

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreatePolicyReq {
    #[validate(length(min = 1))]
    #[schema(example = "users-read")]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    #[schema(example = "heimdall/authz/users")]
    pub path: String,
    pub kind: PolicyKind,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub test_cases: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdatePolicyReq {
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub test_cases: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PolicyResp {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub version: i32,
    pub path: String,
    pub kind: PolicyKind,
    pub status: PolicyDocumentStatus,
    pub is_system: bool,
    pub is_valid: bool,
    pub last_validation_error: Option<String>,
    pub tags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PolicyDocument> for PolicyResp {
    fn from(p: PolicyDocument) -> Self {
        Self {
            id: p.policy_id,
            tenant_id: p.tenant_id,
            name: p.name,
            description: p.description,
            version: p.version,
            path: p.path,
            kind: p.kind,
            status: p.status,
            is_system: p.is_system,
            is_valid: p.is_valid,
            last_validation_error: p.last_validation_error,
            tags: p.tags,
            published_at: p.published_at,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyListResp {
    pub policies: Vec<PolicyResp>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyValidationResp {
    pub is_valid: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyTestCaseResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyTestResp {
    pub total: usize,
    pub passed: usize,
    pub results: Vec<PolicyTestCaseResult>,
}
