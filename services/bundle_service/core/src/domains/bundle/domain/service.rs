use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

use super::model::{BundleManifest, PolicyBundle, PolicyDocument};
use crate::domains::bundle::dto::bundle_dto::{BundleResp, DeploymentResp};
use crate::domains::bundle::dto::policy_dto::{
    CreatePolicyReq, PolicyTestResp, PolicyValidationResp, UpdatePolicyReq,
};

/// The policy bundle builder (§2, §4.5): policy document CRUD plus
/// validate/test/publish, bundle creation, the async build, activation,
/// deployment and rollback, and deployment history.
#[async_trait]
pub trait BundleBuilderService: Send + Sync {
    async fn create_policy(
        &self,
        tenant_id: Option<Uuid>,
        req: CreatePolicyReq,
    ) -> Result<PolicyDocument, AppError>;

    async fn update_policy(
        &self,
        id: Uuid,
        tenant_id: Option<Uuid>,
        req: UpdatePolicyReq,
    ) -> Result<PolicyDocument, AppError>;

    async fn get_policy(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<PolicyDocument, AppError>;

    async fn list_policies(
        &self,
        tenant_id: Option<Uuid>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<PolicyDocument>, i64), AppError>;

    async fn delete_policy(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<(), AppError>;

    /// Validates a policy document's content is well-formed for its kind
    /// (e.g. a `rego` document parses as a single `package` declaration).
    /// Persists `is_valid`/`last_validation_error` either way.
    async fn validate_policy(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<PolicyValidationResp, AppError>;

    /// Runs the policy's stored `test_cases` against the external policy
    /// engine and reports pass/fail per case.
    async fn test_policy(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<PolicyTestResp, AppError>;

    /// Flips a validated policy document from `draft` to `active` and
    /// stamps the publisher/timestamp (§3's PolicyDocument fields).
    async fn publish_policy(&self, id: Uuid, tenant_id: Option<Uuid>, publisher: Uuid) -> Result<PolicyDocument, AppError>;

    /// Creates the bundle row in `BUILDING` and enqueues the async build
    /// (§4.5's build protocol) as a tracked background task.
    async fn create_bundle(
        &self,
        tenant_id: Option<Uuid>,
        name: String,
        version: String,
        policy_ids: Vec<Uuid>,
    ) -> Result<PolicyBundle, AppError>;

    async fn get_bundle(&self, id: Uuid) -> Result<BundleResp, AppError>;

    async fn list_bundles(
        &self,
        tenant_id: Option<Uuid>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<PolicyBundle>, i64), AppError>;

    async fn delete_bundle(&self, id: Uuid) -> Result<(), AppError>;

    /// Activates a `READY` bundle, atomically deactivating the tenant's
    /// current `ACTIVE` bundle if one exists (§4.5's activation
    /// invariant).
    async fn activate_bundle(&self, id: Uuid, activated_by: Uuid) -> Result<PolicyBundle, AppError>;

    /// Creates an immutable deployment row for an `ACTIVE` bundle
    /// (§4.5's deployment protocol).
    async fn deploy_bundle(&self, id: Uuid, deployer_id: Uuid, environment: String) -> Result<DeploymentResp, AppError>;

    /// Deactivates the currently active bundle (with a rollback reason)
    /// and activates `target_id` in the same transaction, then writes a
    /// deployment row whose `rollback_reason` is set (§4.5's rollback
    /// protocol).
    async fn rollback_bundle(
        &self,
        target_id: Uuid,
        deployer_id: Uuid,
        environment: String,
        reason: String,
    ) -> Result<DeploymentResp, AppError>;

    async fn list_deployments(&self, bundle_id: Uuid) -> Result<Vec<DeploymentResp>, AppError>;
}

/// Builds the `.manifest` JSON entry for a bundle's archive (§6). Kept as
/// a free function (pure, no I/O) so both the service and its tests can
/// call it without a repository.
pub fn build_manifest(name: &str, version: &str, policies: &[PolicyDocument]) -> BundleManifest {
    BundleManifest {
        name: name.to_string(),
        version: version.to_string(),
        policies: policies.iter().map(|p| p.archive_filename()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::bundle::domain::model::PolicyKind;

    #[test]
    fn manifest_lists_archive_filenames_in_input_order() {
        let p1 = PolicyDocument::new(
            None,
            "users-read".to_string(),
            None,
            "heimdall/authz/users".to_string(),
            PolicyKind::Rego,
            "package heimdall.authz.users".to_string(),
        );
        let p2 = PolicyDocument::new(
            None,
            "tenants-read".to_string(),
            None,
            "heimdall/authz/tenants".to_string(),
            PolicyKind::Rego,
            "package heimdall.authz.tenants".to_string(),
        );
        let manifest = build_manifest("checkout-policy", "1.0.0", &[p1, p2]);
        assert_eq!(manifest.name, "checkout-policy");
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.policies, vec!["heimdall_authz_users.rego", "heimdall_authz_tenants.rego"]);
    }
}
