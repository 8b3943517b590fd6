//! `BundleBuilderServiceImpl` — the policy bundle builder (§2, §4.5):
//! wires the relational repositories, the policy engine test collaborator
//! and the object store behind the `BundleBuilderService` contract, plus
//! a tracked background-task registry for the async build. Grounded on
//! the teacher's `SessionServiceImpl` for the multi-collaborator
//! composition shape and its best-effort-degraded-operation logging.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use shared_error::AppError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use bundle_service_core::domains::bundle::domain::collaborators::{BundleBlobStore, PolicyEngineClient};
use bundle_service_core::domains::bundle::domain::model::{
    BundleDeployment, BundleStatus, DeploymentStatus, PolicyBundle, PolicyDocument, PolicyDocumentStatus, PolicyKind,
};
use bundle_service_core::domains::bundle::domain::repository::{
    BundleRepository, DeploymentRepository, PolicyRepository,
};
use bundle_service_core::domains::bundle::domain::service::BundleBuilderService;
use bundle_service_core::domains::bundle::dto::bundle_dto::{BundleResp, DeploymentResp};
use bundle_service_core::domains::bundle::dto::policy_dto::{
    CreatePolicyReq, PolicyTestCaseResult, PolicyTestResp, PolicyValidationResp, UpdatePolicyReq,
};

use crate::bundle::archive::build_archive;

/// Tracks in-flight bundle build tasks so shutdown can wait for them to
/// reach a terminal state, or time out and mark them FAILED (§5
/// "Background tasks").
#[derive(Default)]
struct BuildRegistry {
    tasks: Mutex<Vec<(Uuid, JoinHandle<()>)>>,
}

impl BuildRegistry {
    async fn register(&self, bundle_id: Uuid, handle: JoinHandle<()>) {
        self.tasks.lock().await.push((bundle_id, handle));
    }

    /// Waits up to `timeout` for every tracked build to finish. Anything
    /// still running past the deadline is aborted and its bundle row is
    /// flipped to FAILED with a "shutdown" error, per §5's shutdown
    /// contract.
    async fn shutdown(&self, bundles: &Arc<dyn BundleRepository>, timeout: Duration) {
        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        let deadline = tokio::time::Instant::now() + timeout;
        for (bundle_id, handle) in tasks {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, handle).await {
                Ok(_) => {},
                Err(_) => {
                    tracing::warn!(%bundle_id, "bundle build did not finish before shutdown, marking failed");
                    if let Err(err) = bundles.mark_failed(bundle_id, "shutdown").await {
                        tracing::warn!(%bundle_id, error = %err, "failed to mark bundle failed during shutdown");
                    }
                },
            }
        }
    }
}

pub struct BundleBuilderServiceImpl {
    policies: Arc<dyn PolicyRepository>,
    bundles: Arc<dyn BundleRepository>,
    deployments: Arc<dyn DeploymentRepository>,
    policy_engine: Arc<dyn PolicyEngineClient>,
    blob_store: Arc<dyn BundleBlobStore>,
    builds: Arc<BuildRegistry>,
}

impl BundleBuilderServiceImpl {
    pub fn new(
        policies: Arc<dyn PolicyRepository>,
        bundles: Arc<dyn BundleRepository>,
        deployments: Arc<dyn DeploymentRepository>,
        policy_engine: Arc<dyn PolicyEngineClient>,
        blob_store: Arc<dyn BundleBlobStore>,
    ) -> Self {
        Self { policies, bundles, deployments, policy_engine, blob_store, builds: Arc::new(BuildRegistry::default()) }
    }

    /// Waits for in-flight builds to finish, or marks them FAILED past
    /// `timeout` (§5's shutdown contract). Call this from the server's
    /// graceful-shutdown path.
    pub async fn shutdown(&self, timeout: Duration) {
        self.builds.shutdown(&self.bundles, timeout).await;
    }

    fn validate_content(kind: PolicyKind, content: &str) -> Result<(), String> {
        match kind {
            PolicyKind::Rego => {
                if content.trim_start().starts_with("package ") {
                    Ok(())
                } else {
                    Err("rego policy must begin with a 'package' declaration".to_string())
                }
            },
            PolicyKind::Json => serde_json::from_str::<Value>(content)
                .map(|_| ())
                .map_err(|e| format!("invalid json policy: {e}")),
            PolicyKind::Wasm => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(content)
                    .map(|bytes| {
                        if bytes.is_empty() {
                            return Err("wasm policy payload is empty".to_string());
                        }
                        Ok(())
                    })
                    .map_err(|e| format!("wasm policy must be base64-encoded: {e}"))
                    .and_then(|inner| inner)
            },
        }
    }

    fn extract_allow(value: &Value) -> bool {
        match value {
            Value::Bool(b) => *b,
            Value::Object(map) => map.get("allow").and_then(Value::as_bool).unwrap_or(false),
            _ => false,
        }
    }

    async fn run_build(
        bundle_id: Uuid,
        name: String,
        version: String,
        policies: Arc<dyn PolicyRepository>,
        bundles: Arc<dyn BundleRepository>,
        blob_store: Arc<dyn BundleBlobStore>,
    ) {
        if let Err(err) = bundles.mark_building(bundle_id).await {
            tracing::error!(%bundle_id, error = %err, "failed to mark bundle as building");
            return;
        }

        let result: Result<(), AppError> = async {
            let docs = policies.find_for_bundle(bundle_id).await?;
            if docs.is_empty() {
                return Err(AppError::BadRequest("bundle has no attached policies".to_string()));
            }
            let archive = build_archive(&name, &version, &docs)?;
            let storage_path = shared_object_store::bundle_storage_path(&name, &version);
            blob_store.upload(&storage_path, archive.bytes.clone()).await?;
            bundles
                .mark_ready(bundle_id, &storage_path, archive.bytes.len() as i64, &archive.checksum, archive.manifest)
                .await?;
            Ok(())
        }
        .await;

        if let Err(err) = result {
            tracing::error!(%bundle_id, error = %err, "bundle build failed");
            if let Err(mark_err) = bundles.mark_failed(bundle_id, &err.to_string()).await {
                tracing::error!(%bundle_id, error = %mark_err, "failed to record bundle build failure");
            }
        } else {
            tracing::info!(%bundle_id, "bundle build succeeded");
        }
    }
}

#[async_trait]
impl BundleBuilderService for BundleBuilderServiceImpl {
    async fn create_policy(&self, tenant_id: Option<Uuid>, req: CreatePolicyReq) -> Result<PolicyDocument, AppError> {
        if self.policies.find_by_path(&req.path, tenant_id).await?.is_some() {
            return Err(AppError::Conflict(format!("policy path '{}' already exists", req.path)));
        }
        let mut policy = PolicyDocument::new(tenant_id, req.name, req.description, req.path, req.kind, req.content);
        policy.tags = req.tags;
        policy.test_cases = sqlx::types::Json(req.test_cases);
        self.policies.create(&policy).await
    }

    async fn update_policy(
        &self,
        id: Uuid,
        tenant_id: Option<Uuid>,
        req: UpdatePolicyReq,
    ) -> Result<PolicyDocument, AppError> {
        let mut policy = self
            .policies
            .find_by_id(id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("policy {id} not found")))?;

        if let Some(description) = req.description {
            policy.description = Some(description);
        }
        if let Some(content) = req.content {
            policy.content = content;
            policy.version += 1;
            policy.is_valid = false;
            policy.last_validation_error = None;
        }
        if let Some(tags) = req.tags {
            policy.tags = tags;
        }
        if let Some(test_cases) = req.test_cases {
            policy.test_cases = sqlx::types::Json(test_cases);
        }
        policy.updated_at = chrono::Utc::now();
        self.policies.update(&policy).await
    }

    async fn get_policy(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<PolicyDocument, AppError> {
        self.policies.find_by_id(id, tenant_id).await?.ok_or_else(|| AppError::NotFound(format!("policy {id} not found")))
    }

    async fn list_policies(
        &self,
        tenant_id: Option<Uuid>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<PolicyDocument>, i64), AppError> {
        self.policies.list(tenant_id, page, page_size).await
    }

    async fn delete_policy(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<(), AppError> {
        self.policies.delete(id, tenant_id).await
    }

    async fn validate_policy(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<PolicyValidationResp, AppError> {
        let mut policy = self.get_policy(id, tenant_id).await?;
        match Self::validate_content(policy.kind, &policy.content) {
            Ok(()) => {
                policy.is_valid = true;
                policy.last_validation_error = None;
            },
            Err(error) => {
                policy.is_valid = false;
                policy.last_validation_error = Some(error);
            },
        }
        policy.updated_at = chrono::Utc::now();
        let saved = self.policies.update(&policy).await?;
        Ok(PolicyValidationResp { is_valid: saved.is_valid, error: saved.last_validation_error })
    }

    async fn test_policy(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<PolicyTestResp, AppError> {
        let policy = self.get_policy(id, tenant_id).await?;
        let cases = policy.test_cases.0.as_array().cloned().unwrap_or_default();

        let mut results = Vec::with_capacity(cases.len());
        let mut passed = 0usize;
        for case in &cases {
            let name = case.get("name").and_then(Value::as_str).unwrap_or("unnamed").to_string();
            let input = case.get("input").cloned().unwrap_or(Value::Object(serde_json::Map::new()));
            let expected = case.get("expect_allow").and_then(Value::as_bool).unwrap_or(false);

            let outcome = self.policy_engine.evaluate_raw(&policy.path, input).await;
            let result = match outcome {
                Ok(value) => {
                    let actual = Self::extract_allow(&value);
                    if actual == expected {
                        passed += 1;
                        PolicyTestCaseResult { name, passed: true, message: None }
                    } else {
                        PolicyTestCaseResult {
                            name,
                            passed: false,
                            message: Some(format!("expected allow={expected}, got allow={actual}")),
                        }
                    }
                },
                Err(err) => PolicyTestCaseResult { name, passed: false, message: Some(err.to_string()) },
            };
            results.push(result);
        }

        Ok(PolicyTestResp { total: cases.len(), passed, results })
    }

    async fn publish_policy(&self, id: Uuid, tenant_id: Option<Uuid>, publisher: Uuid) -> Result<PolicyDocument, AppError> {
        let mut policy = self.get_policy(id, tenant_id).await?;
        if !policy.is_valid {
            return Err(AppError::Conflict("policy must pass validation before it can be published".to_string()));
        }
        policy.status = PolicyDocumentStatus::Active;
        policy.published_at = Some(chrono::Utc::now());
        policy.published_by = Some(publisher);
        policy.updated_at = chrono::Utc::now();
        self.policies.update(&policy).await
    }

    async fn create_bundle(
        &self,
        tenant_id: Option<Uuid>,
        name: String,
        version: String,
        policy_ids: Vec<Uuid>,
    ) -> Result<PolicyBundle, AppError> {
        if policy_ids.is_empty() {
            return Err(AppError::BadRequest("a bundle must reference at least one policy".to_string()));
        }
        let bundle = PolicyBundle::new(tenant_id, name.clone(), version.clone());
        let created = self.bundles.create(&bundle, &policy_ids).await?;

        let handle = tokio::spawn(Self::run_build(
            created.bundle_id,
            name,
            version,
            self.policies.clone(),
            self.bundles.clone(),
            self.blob_store.clone(),
        ));
        self.builds.register(created.bundle_id, handle).await;

        Ok(created)
    }

    async fn get_bundle(&self, id: Uuid) -> Result<BundleResp, AppError> {
        let bundle = self.bundles.find_by_id(id).await?.ok_or_else(|| AppError::NotFound(format!("bundle {id} not found")))?;
        Ok(BundleResp::from(bundle))
    }

    async fn list_bundles(
        &self,
        tenant_id: Option<Uuid>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<PolicyBundle>, i64), AppError> {
        self.bundles.list(tenant_id, page, page_size).await
    }

    async fn delete_bundle(&self, id: Uuid) -> Result<(), AppError> {
        self.bundles.soft_delete(id).await
    }

    async fn activate_bundle(&self, id: Uuid, activated_by: Uuid) -> Result<PolicyBundle, AppError> {
        self.bundles.activate(id, activated_by).await
    }

    async fn deploy_bundle(&self, id: Uuid, deployer_id: Uuid, environment: String) -> Result<DeploymentResp, AppError> {
        let bundle = self.bundles.expect_status(id, BundleStatus::Active).await?;
        let deployment = BundleDeployment::new(bundle.bundle_id, deployer_id, environment, DeploymentStatus::Success);
        let created = self.deployments.create(&deployment).await?;
        Ok(DeploymentResp::from(created))
    }

    async fn rollback_bundle(
        &self,
        target_id: Uuid,
        deployer_id: Uuid,
        environment: String,
        reason: String,
    ) -> Result<DeploymentResp, AppError> {
        let target = self
            .bundles
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("bundle {target_id} not found")))?;
        let previously_active = self.bundles.find_active(target.tenant_id).await?;

        let activated = self.bundles.activate(target_id, deployer_id).await?;
        let rollback_of = previously_active.map(|b| b.bundle_id).unwrap_or(activated.bundle_id);

        let deployment = BundleDeployment::rollback(activated.bundle_id, deployer_id, environment, rollback_of, reason);
        let created = self.deployments.create(&deployment).await?;
        Ok(DeploymentResp::from(created))
    }

    async fn list_deployments(&self, bundle_id: Uuid) -> Result<Vec<DeploymentResp>, AppError> {
        let deployments = self.deployments.list_for_bundle(bundle_id).await?;
        Ok(deployments.into_iter().map(DeploymentResp::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rego_must_declare_a_package() {
        assert!(BundleBuilderServiceImpl::validate_content(PolicyKind::Rego, "package heimdall.authz\nallow = true").is_ok());
        assert!(BundleBuilderServiceImpl::validate_content(PolicyKind::Rego, "allow = true").is_err());
    }

    #[test]
    fn json_policy_must_parse() {
        assert!(BundleBuilderServiceImpl::validate_content(PolicyKind::Json, r#"{"allow": true}"#).is_ok());
        assert!(BundleBuilderServiceImpl::validate_content(PolicyKind::Json, "{not json").is_err());
    }

    #[test]
    fn extract_allow_reads_bool_or_wrapped_object() {
        assert!(BundleBuilderServiceImpl::extract_allow(&serde_json::json!(true)));
        assert!(BundleBuilderServiceImpl::extract_allow(&serde_json::json!({"allow": true})));
        assert!(!BundleBuilderServiceImpl::extract_allow(&serde_json::json!({"allow": false})));
        assert!(!BundleBuilderServiceImpl::extract_allow(&serde_json::json!("neither")));
    }
}
