//! Wires the policy-engine HTTP client and the Redis-backed decision cache
//! into the five-layer authorization service from `shared_authz`.

use std::sync::Arc;
use std::time::Duration;

use shared_authz::{AuthorizationService, HttpPolicyClient};
use shared_kv::RedisKvStore;

/// Concrete authorization service this binary runs: policy evaluation over
/// HTTP, decisions cached in Redis. Other services embed `shared_authz`
/// directly when they want the library form instead of the network hop.
pub type AppAuthorizationService = AuthorizationService<HttpPolicyClient, RedisKvStore>;

pub fn build_authorization_service(
    policy_engine_url: impl Into<String>,
    policy_engine_timeout: Duration,
    default_policy_path: impl Into<String>,
    cache_ttl: Duration,
    decision_cache: Arc<RedisKvStore>,
) -> Result<AppAuthorizationService, shared_error::AppError> {
    let policy_client = Arc::new(HttpPolicyClient::new(policy_engine_url, policy_engine_timeout)?);
    Ok(AuthorizationService::new(policy_client, decision_cache, default_policy_path, cache_ttl))
}
