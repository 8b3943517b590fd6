use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::domains::bundle::domain::model::{BundleDeployment, BundleStatus, DeploymentStatus, PolicyBundle};

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateBundleReq {
    #[validate(length(min = 1))]
    #[schema(example = "checkout-policy")]
    pub name: String,
    #[validate(length(min = 1))]
    #[schema(example = "1.0.0")]
    pub version: String,
    #[validate(length(min = 1))]
    pub policy_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BundleResp {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub version: String,
    pub status: BundleStatus,
    pub build_started_at: Option<DateTime<Utc>>,
    pub build_completed_at: Option<DateTime<Utc>>,
    pub build_error: Option<String>,
    pub storage_path: Option<String>,
    pub storage_size: Option<i64>,
    pub content_checksum: Option<String>,
    pub manifest: Option<serde_json::Value>,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PolicyBundle> for BundleResp {
    fn from(b: PolicyBundle) -> Self {
        Self {
            id: b.bundle_id,
            tenant_id: b.tenant_id,
            name: b.name,
            version: b.version,
            status: b.status,
            build_started_at: b.build_started_at,
            build_completed_at: b.build_completed_at,
            build_error: b.build_error,
            storage_path: b.storage_path,
            storage_size: b.storage_size,
            content_checksum: b.content_checksum,
            manifest: b.manifest.map(|m| m.0),
            activated_at: b.activated_at,
            created_at: b.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BundleListResp {
    pub bundles: Vec<BundleResp>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct DeployBundleReq {
    #[validate(length(min = 1))]
    #[schema(example = "production")]
    pub environment: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct RollbackBundleReq {
    #[validate(length(min = 1))]
    pub environment: String,
    #[validate(length(min = 1))]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeploymentResp {
    pub id: Uuid,
    pub bundle_id: Uuid,
    pub deployer_id: Uuid,
    pub environment: String,
    pub status: DeploymentStatus,
    pub deployed_at: DateTime<Utc>,
    pub rollback_of: Option<Uuid>,
    pub rollback_reason: Option<String>,
}

impl From<BundleDeployment> for DeploymentResp {
    fn from(d: BundleDeployment) -> Self {
        Self {
            id: d.deployment_id,
            bundle_id: d.bundle_id,
            deployer_id: d.deployer_id,
            environment: d.environment,
            status: d.status,
            deployed_at: d.deployed_at,
            rollback_of: d.rollback_of,
            rollback_reason: d.rollback_reason,
        }
    }
}
