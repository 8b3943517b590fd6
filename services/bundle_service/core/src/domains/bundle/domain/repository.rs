use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

use super::model::{BundleDeployment, BundleStatus, PolicyBundle, PolicyDocument};

/// Policy document data access (§3).
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<Option<PolicyDocument>, AppError>;

    async fn find_by_path(&self, path: &str, tenant_id: Option<Uuid>) -> Result<Option<PolicyDocument>, AppError>;

    async fn create(&self, policy: &PolicyDocument) -> Result<PolicyDocument, AppError>;

    async fn update(&self, policy: &PolicyDocument) -> Result<PolicyDocument, AppError>;

    async fn list(&self, tenant_id: Option<Uuid>, page: i64, page_size: i64) -> Result<(Vec<PolicyDocument>, i64), AppError>;

    async fn delete(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<(), AppError>;

    /// Every policy document attached to a bundle, in a stable order
    /// (used both to build a bundle's archive and to answer "what does
    /// this bundle contain").
    async fn find_for_bundle(&self, bundle_id: Uuid) -> Result<Vec<PolicyDocument>, AppError>;
}

/// Policy bundle data access (§3, §4.5). Implementations must make the
/// activation swap (`activate`) atomic — at most one bundle per tenant in
/// `ACTIVE` at any moment (§4.5's invariant).
#[async_trait]
pub trait BundleRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PolicyBundle>, AppError>;

    async fn find_active(&self, tenant_id: Option<Uuid>) -> Result<Option<PolicyBundle>, AppError>;

    async fn create(&self, bundle: &PolicyBundle, policy_ids: &[Uuid]) -> Result<PolicyBundle, AppError>;

    async fn list(&self, tenant_id: Option<Uuid>, page: i64, page_size: i64) -> Result<(Vec<PolicyBundle>, i64), AppError>;

    async fn mark_building(&self, id: Uuid) -> Result<(), AppError>;

    async fn mark_ready(
        &self,
        id: Uuid,
        storage_path: &str,
        storage_size: i64,
        checksum: &str,
        manifest: serde_json::Value,
    ) -> Result<(), AppError>;

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), AppError>;

    /// Atomically flips the tenant's current `ACTIVE` bundle (if any) to
    /// `INACTIVE` and the target bundle (which must be `READY`) to
    /// `ACTIVE`, in one relational transaction (§4.5's activation
    /// invariant).
    async fn activate(&self, id: Uuid, activated_by: Uuid) -> Result<PolicyBundle, AppError>;

    /// Flips `id` from `ACTIVE` to `INACTIVE` with an audit reason,
    /// without activating a replacement (used standalone, and as the
    /// first half of a rollback).
    async fn deactivate(&self, id: Uuid, deactivated_by: Uuid, reason: &str) -> Result<(), AppError>;

    async fn soft_delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn expect_status(&self, id: Uuid, expected: BundleStatus) -> Result<PolicyBundle, AppError>;
}

/// Immutable bundle deployment history (§3, §4.5).
#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    async fn create(&self, deployment: &BundleDeployment) -> Result<BundleDeployment, AppError>;

    async fn list_for_bundle(&self, bundle_id: Uuid) -> Result<Vec<BundleDeployment>, AppError>;
}
