//! Durable relational entities owned by the policy bundle builder (§3):
//! PolicyDocument, PolicyBundle, BundleDeployment, and the many-to-many
//! join row between a bundle and its policies. The object store owns the
//! physical archive bytes; `storage_path` + `checksum` is the binding
//! between this row and that blob (§3's ownership summary).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Rego,
    Json,
    Wasm,
}

impl PolicyKind {
    /// The file extension used when this policy is serialized into a
    /// bundle's TAR stream (§4.5 build protocol step 3).
    pub fn file_extension(&self) -> &'static str {
        match self {
            PolicyKind::Rego => "rego",
            PolicyKind::Json => "json",
            PolicyKind::Wasm => "wasm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PolicyDocumentStatus {
    Draft,
    Active,
    Inactive,
    Archived,
}

/// Policy document entity (§3). `path` is unique within a tenant (or
/// globally for `tenant_id = NULL` system policies) and names the file
/// this policy is written to inside a bundle's archive.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PolicyDocument {
    pub policy_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub version: i32,
    pub path: String,
    pub kind: PolicyKind,
    pub content: String,
    pub status: PolicyDocumentStatus,
    pub is_system: bool,
    pub is_valid: bool,
    pub last_validation_error: Option<String>,
    pub test_cases: sqlx::types::Json<serde_json::Value>,
    pub tags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub published_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyDocument {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Option<Uuid>,
        name: String,
        description: Option<String>,
        path: String,
        kind: PolicyKind,
        content: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            policy_id: Uuid::new_v4(),
            tenant_id,
            name,
            description,
            version: 1,
            path,
            kind,
            content,
            status: PolicyDocumentStatus::Draft,
            is_system: false,
            is_valid: false,
            last_validation_error: None,
            test_cases: sqlx::types::Json(serde_json::json!([])),
            tags: Vec::new(),
            published_at: None,
            published_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The filename this policy occupies inside a bundle's TAR stream
    /// (§4.5 step 3, §6's archive format).
    pub fn archive_filename(&self) -> String {
        format!("{}.{}", self.path.trim_start_matches('/').replace('/', "_"), self.kind.file_extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BundleStatus {
    Building,
    Ready,
    Active,
    Inactive,
    Failed,
}

impl BundleStatus {
    /// §4.5's state machine edges. `from -> to` must appear here for a
    /// transition to be legal; enforced by the service layer, not the
    /// database.
    pub fn can_transition_to(self, next: BundleStatus) -> bool {
        use BundleStatus::*;
        matches!(
            (self, next),
            (Building, Ready) | (Building, Failed) | (Ready, Active) | (Active, Inactive) | (Active, Failed)
        )
    }
}

/// Policy bundle entity (§3): a content-addressed archive of policy
/// documents, state-machine driven (BUILDING -> READY -> ACTIVE ->
/// INACTIVE, or -> FAILED from BUILDING). `tenant_id = NULL` denotes a
/// global bundle.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PolicyBundle {
    pub bundle_id: Uuid,
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
    pub manifest: Option<sqlx::types::Json<serde_json::Value>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub activated_by: Option<Uuid>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub deactivated_by: Option<Uuid>,
    pub deactivation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PolicyBundle {
    pub fn new(tenant_id: Option<Uuid>, name: String, version: String) -> Self {
        let now = Utc::now();
        Self {
            bundle_id: Uuid::new_v4(),
            tenant_id,
            name,
            version,
            status: BundleStatus::Building,
            build_started_at: None,
            build_completed_at: None,
            build_error: None,
            storage_path: None,
            storage_size: None,
            content_checksum: None,
            manifest: None,
            activated_at: None,
            activated_by: None,
            deactivated_at: None,
            deactivated_by: None,
            deactivation_reason: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Join row between a bundle and the policy documents it packages,
/// modeled as an explicit id-keyed table per the Design Notes' "no
/// bidirectional pointers" guidance.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BundlePolicy {
    pub bundle_id: Uuid,
    pub policy_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize, utoipa::ToSchema)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Success,
    Failed,
    RollingBack,
}

/// Immutable deployment history row (§3). A rollback is recorded as a new
/// row whose `rollback_reason`/`rollback_of` are set, never by mutating a
/// prior row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BundleDeployment {
    pub deployment_id: Uuid,
    pub bundle_id: Uuid,
    pub deployer_id: Uuid,
    pub environment: String,
    pub status: DeploymentStatus,
    pub deployed_at: DateTime<Utc>,
    pub rollback_of: Option<Uuid>,
    pub rollback_reason: Option<String>,
}

impl BundleDeployment {
    pub fn new(bundle_id: Uuid, deployer_id: Uuid, environment: String, status: DeploymentStatus) -> Self {
        Self {
            deployment_id: Uuid::new_v4(),
            bundle_id,
            deployer_id,
            environment,
            status,
            deployed_at: Utc::now(),
            rollback_of: None,
            rollback_reason: None,
        }
    }

    pub fn rollback(bundle_id: Uuid, deployer_id: Uuid, environment: String, rollback_of: Uuid, reason: String) -> Self {
        Self {
            deployment_id: Uuid::new_v4(),
            bundle_id,
            deployer_id,
            environment,
            status: DeploymentStatus::Success,
            deployed_at: Utc::now(),
            rollback_of: Some(rollback_of),
            rollback_reason: Some(reason),
        }
    }
}

/// The `.manifest` entry's JSON shape inside a bundle's archive (§6).
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BundleManifest {
    pub name: String,
    pub version: String,
    pub policies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_allows_only_spec_edges() {
        use BundleStatus::*;
        assert!(Building.can_transition_to(Ready));
        assert!(Building.can_transition_to(Failed));
        assert!(Ready.can_transition_to(Active));
        assert!(Active.can_transition_to(Inactive));
        assert!(Active.can_transition_to(Failed));
        assert!(!Ready.can_transition_to(Building));
        assert!(!Inactive.can_transition_to(Active));
        assert!(!Failed.can_transition_to(Ready));
        assert!(!Building.can_transition_to(Active));
    }

    #[test]
    fn archive_filename_sanitizes_nested_path() {
        let policy = PolicyDocument::new(
            None,
            "users-read".to_string(),
            None,
            "heimdall/authz/users".to_string(),
            PolicyKind::Rego,
            "package heimdall.authz.users\nallow = true".to_string(),
        );
        assert_eq!(policy.archive_filename(), "heimdall_authz_users.rego");
    }
}
