//! The authorization service (§4.4): five policy layers, composed into a
//! single allow/deny decision, backed by a short-TTL cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use shared_kv::DecisionCache;

use crate::context::DecisionInput;
use crate::policy_client::{PolicyClient, PolicyEvaluation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayerOutcome {
    Allow,
    Deny,
    Abstain,
}

fn layer_outcome(eval: &PolicyEvaluation) -> LayerOutcome {
    match &eval.result {
        serde_json::Value::Bool(true) => LayerOutcome::Allow,
        serde_json::Value::Bool(false) => LayerOutcome::Abstain,
        serde_json::Value::Object(map) => {
            if map.get("deny").and_then(serde_json::Value::as_bool).unwrap_or(false) {
                LayerOutcome::Deny
            } else if map.get("allow").and_then(serde_json::Value::as_bool).unwrap_or(false) {
                LayerOutcome::Allow
            } else {
                LayerOutcome::Abstain
            }
        },
        _ => LayerOutcome::Abstain,
    }
}

/// One decision's outcome across every tuple in a `decide_many` batch.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchDecision {
    Allow,
    Deny,
    Error { message: String },
}

/// A single `(resource_type, resource_id, action)` tuple to evaluate in a batch.
pub struct DecisionRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub action: String,
    pub input: DecisionInput,
}

/// Policy paths under the configured default path, one per layer, matching
/// the Design Notes' "one engine entry point per decision" guidance relaxed
/// to one per layer so the engine-side policies stay small and composable.
struct LayerPaths {
    tenant_isolation: String,
    rbac: String,
    abac: String,
    ownership: String,
    time_based: String,
    global_deny: String,
}

impl LayerPaths {
    fn under(default_path: &str) -> Self {
        let base = default_path.trim_end_matches('/');
        Self {
            tenant_isolation: format!("{base}/tenant_isolation"),
            rbac: format!("{base}/rbac"),
            abac: format!("{base}/abac"),
            ownership: format!("{base}/ownership"),
            time_based: format!("{base}/time_based"),
            global_deny: format!("{base}/global_deny"),
        }
    }
}

pub struct AuthorizationService<P, C> {
    policy_client: Arc<P>,
    cache: Arc<C>,
    default_policy_path: String,
    cache_ttl: Duration,
}

impl<P, C> AuthorizationService<P, C>
where
    P: PolicyClient,
    C: DecisionCache,
{
    pub fn new(
        policy_client: Arc<P>,
        cache: Arc<C>,
        default_policy_path: impl Into<String>,
        cache_ttl: Duration,
    ) -> Self {
        Self { policy_client, cache, default_policy_path: default_policy_path.into(), cache_ttl }
    }

    /// `decide`: evaluates the tenant-isolation gate, then the union of
    /// rbac/abac/ownership/time-based, honoring any explicit `deny` as a
    /// global override (§4.4's composition rule). Cache is consulted first
    /// and is strictly an optimization — correctness holds with TTL=0.
    pub async fn decide(
        &self,
        user_id: Uuid,
        resource_type: &str,
        resource_id: &str,
        action: &str,
        input: &DecisionInput,
    ) -> Result<bool, shared_error::AppError> {
        let key = shared_kv::decision_cache_key(user_id, resource_type, resource_id, action);
        if let Some(cached) = self.cache.get(&key).await? {
            return Ok(cached);
        }

        let decision = self.evaluate(input).await?;

        // Correctness-sensitive writers invalidate after persisting a
        // change, so a racing cache write here only risks an already-TTL
        // bounded staleness window (§5's shared-resource policy).
        self.cache.set(&key, decision, self.cache_ttl).await?;
        Ok(decision)
    }

    /// `decide_many`: each tuple is evaluated independently; a single
    /// failure is reported as an `error` entry rather than failing the
    /// whole batch.
    pub async fn decide_many(
        &self,
        user_id: Uuid,
        requests: Vec<DecisionRequest>,
    ) -> HashMap<String, BatchDecision> {
        let mut out = HashMap::with_capacity(requests.len());
        for req in requests {
            let key = format!("{}:{}:{}", req.resource_type, req.resource_id, req.action);
            let result = self
                .decide(user_id, &req.resource_type, &req.resource_id, &req.action, &req.input)
                .await;
            let decision = match result {
                Ok(true) => BatchDecision::Allow,
                Ok(false) => BatchDecision::Deny,
                Err(e) => BatchDecision::Error { message: e.to_string() },
            };
            out.insert(key, decision);
        }
        out
    }

    async fn evaluate(&self, input: &DecisionInput) -> Result<bool, shared_error::AppError> {
        let paths = LayerPaths::under(&self.default_policy_path);

        let tenant_isolation = self.policy_client.evaluate(&paths.tenant_isolation, input).await?;
        let tenant_gate = layer_outcome(&tenant_isolation);
        if tenant_gate == LayerOutcome::Deny {
            return Ok(false);
        }

        let (rbac, abac, ownership, time_based, global_deny) = tokio::try_join!(
            self.policy_client.evaluate(&paths.rbac, input),
            self.policy_client.evaluate(&paths.abac, input),
            self.policy_client.evaluate(&paths.ownership, input),
            self.policy_client.evaluate(&paths.time_based, input),
            self.policy_client.evaluate(&paths.global_deny, input),
        )?;

        if layer_outcome(&global_deny) == LayerOutcome::Deny {
            return Ok(false);
        }

        let union_allow = [&rbac, &abac, &ownership, &time_based]
            .into_iter()
            .any(|eval| layer_outcome(eval) == LayerOutcome::Allow);
        let any_layer_deny = [&rbac, &abac, &ownership, &time_based]
            .into_iter()
            .any(|eval| layer_outcome(eval) == LayerOutcome::Deny);

        Ok(tenant_gate == LayerOutcome::Allow && union_allow && !any_layer_deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DecisionInputBuilder, UserContext};
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;
    use std::sync::Mutex;

    mock! {
        Policy {}
        #[async_trait]
        impl PolicyClient for Policy {
            async fn evaluate(&self, policy_path: &str, input: &DecisionInput) -> Result<PolicyEvaluation, shared_error::AppError>;
            async fn put_data(&self, path: &str, data: serde_json::Value) -> Result<(), shared_error::AppError>;
            async fn get_data(&self, path: &str) -> Result<Option<serde_json::Value>, shared_error::AppError>;
            async fn delete_data(&self, path: &str) -> Result<(), shared_error::AppError>;
        }
    }

    struct FakeCache {
        store: Mutex<HashMap<String, bool>>,
    }

    impl FakeCache {
        fn new() -> Self {
            Self { store: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl DecisionCache for FakeCache {
        async fn get(&self, key: &str) -> Result<Option<bool>, shared_error::AppError> {
            Ok(self.store.lock().unwrap().get(key).copied())
        }

        async fn set(&self, key: &str, decision: bool, _ttl: Duration) -> Result<(), shared_error::AppError> {
            self.store.lock().unwrap().insert(key.to_string(), decision);
            Ok(())
        }

        async fn invalidate_user(&self, user_id: Uuid) -> Result<(), shared_error::AppError> {
            self.store.lock().unwrap().retain(|k, _| !k.starts_with(&format!("decision:{user_id}:")));
            Ok(())
        }
    }

    fn sample_input(user_id: Uuid, tenant_id: Uuid) -> DecisionInput {
        let user = UserContext {
            id: user_id,
            email: "a@example.com".to_string(),
            roles: vec!["member".to_string()],
            permissions: None,
            tenant_id,
            metadata: None,
        };
        DecisionInputBuilder::new(user, "document").resource_id("42").action("read").build()
    }

    fn allow_eval() -> PolicyEvaluation {
        PolicyEvaluation { result: json!({"allow": true}), decision_id: None, metrics: None }
    }

    fn abstain_eval() -> PolicyEvaluation {
        PolicyEvaluation { result: json!({"allow": false}), decision_id: None, metrics: None }
    }

    fn deny_eval() -> PolicyEvaluation {
        PolicyEvaluation { result: json!({"deny": true}), decision_id: None, metrics: None }
    }

    #[tokio::test]
    async fn tenant_isolation_deny_short_circuits() {
        let mut policy = MockPolicy::new();
        policy
            .expect_evaluate()
            .withf(|path, _| path.ends_with("tenant_isolation"))
            .returning(|_, _| Box::pin(async { Ok(deny_eval()) }));
        // No other layer should be called once the gate denies.
        policy.expect_evaluate().withf(|path, _| !path.ends_with("tenant_isolation")).times(0);

        let service =
            AuthorizationService::new(Arc::new(policy), Arc::new(FakeCache::new()), "authz", Duration::from_secs(300));
        let user_id = Uuid::new_v4();
        let input = sample_input(user_id, Uuid::new_v4());
        let allowed = service.decide(user_id, "document", "42", "read", &input).await.unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn allow_requires_tenant_gate_and_union() {
        let mut policy = MockPolicy::new();
        policy
            .expect_evaluate()
            .withf(|path, _| path.ends_with("tenant_isolation"))
            .returning(|_, _| Box::pin(async { Ok(allow_eval()) }));
        policy
            .expect_evaluate()
            .withf(|path, _| path.ends_with("rbac"))
            .returning(|_, _| Box::pin(async { Ok(allow_eval()) }));
        policy
            .expect_evaluate()
            .withf(|path, _| path.ends_with("abac") || path.ends_with("ownership") || path.ends_with("time_based"))
            .returning(|_, _| Box::pin(async { Ok(abstain_eval()) }));
        policy
            .expect_evaluate()
            .withf(|path, _| path.ends_with("global_deny"))
            .returning(|_, _| Box::pin(async { Ok(abstain_eval()) }));

        let service =
            AuthorizationService::new(Arc::new(policy), Arc::new(FakeCache::new()), "authz", Duration::from_secs(300));
        let user_id = Uuid::new_v4();
        let input = sample_input(user_id, Uuid::new_v4());
        let allowed = service.decide(user_id, "document", "42", "read", &input).await.unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn global_deny_overrides_allow() {
        let mut policy = MockPolicy::new();
        policy
            .expect_evaluate()
            .withf(|path, _| path.ends_with("tenant_isolation"))
            .returning(|_, _| Box::pin(async { Ok(allow_eval()) }));
        policy
            .expect_evaluate()
            .withf(|path, _| path.ends_with("rbac"))
            .returning(|_, _| Box::pin(async { Ok(allow_eval()) }));
        policy
            .expect_evaluate()
            .withf(|path, _| path.ends_with("abac") || path.ends_with("ownership") || path.ends_with("time_based"))
            .returning(|_, _| Box::pin(async { Ok(abstain_eval()) }));
        policy
            .expect_evaluate()
            .withf(|path, _| path.ends_with("global_deny"))
            .returning(|_, _| Box::pin(async { Ok(deny_eval()) }));

        let service =
            AuthorizationService::new(Arc::new(policy), Arc::new(FakeCache::new()), "authz", Duration::from_secs(300));
        let user_id = Uuid::new_v4();
        let input = sample_input(user_id, Uuid::new_v4());
        let allowed = service.decide(user_id, "document", "42", "read", &input).await.unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn cache_hit_skips_policy_client() {
        let mut policy = MockPolicy::new();
        policy.expect_evaluate().times(0);

        let cache = FakeCache::new();
        let user_id = Uuid::new_v4();
        cache
            .set(&shared_kv::decision_cache_key(user_id, "document", "42", "read"), true, Duration::from_secs(300))
            .await
            .unwrap();

        let service = AuthorizationService::new(Arc::new(policy), Arc::new(cache), "authz", Duration::from_secs(300));
        let input = sample_input(user_id, Uuid::new_v4());
        let allowed = service.decide(user_id, "document", "42", "read", &input).await.unwrap();
        assert!(allowed);
    }

    #[tokio::test]
    async fn decide_many_reports_error_without_failing_batch() {
        let mut policy = MockPolicy::new();
        policy.expect_evaluate().returning(|_, _| {
            Box::pin(async { Err(shared_error::AppError::AuthzEvaluationFailed("boom".to_string())) })
        });

        let service =
            AuthorizationService::new(Arc::new(policy), Arc::new(FakeCache::new()), "authz", Duration::from_secs(300));
        let user_id = Uuid::new_v4();
        let input = sample_input(user_id, Uuid::new_v4());
        let results = service
            .decide_many(
                user_id,
                vec![DecisionRequest {
                    resource_type: "document".to_string(),
                    resource_id: "42".to_string(),
                    action: "read".to_string(),
                    input,
                }],
            )
            .await;
        assert!(matches!(results.get("document:42:read"), Some(BatchDecision::Error { .. })));
    }
}
