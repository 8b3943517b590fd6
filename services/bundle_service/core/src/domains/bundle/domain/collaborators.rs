use async_trait::async_trait;
use serde_json::Value;
use shared_error::AppError;

/// The bundle builder's own narrow policy-engine collaborator (§2's
/// "Policy layer"): evaluates a policy at a path against an arbitrary
/// test-case input. Distinct from `shared_authz::PolicyClient` (which is
/// pinned to the five-layer `DecisionInput` shape) because a policy's
/// stored test cases may exercise any input schema that policy itself
/// expects, not the authorization service's decision context.
#[async_trait]
pub trait PolicyEngineClient: Send + Sync {
    async fn evaluate_raw(&self, policy_path: &str, input: Value) -> Result<Value, AppError>;
}

/// Narrow object-store seam so `BundleBuilderServiceImpl`'s build
/// protocol can be driven against an in-memory fake in tests, rather than
/// requiring a real S3-compatible endpoint. `shared_object_store::ObjectStoreClient`
/// is the production implementation, wrapped to satisfy this trait.
#[async_trait]
pub trait BundleBlobStore: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>) -> Result<(), AppError>;
}
