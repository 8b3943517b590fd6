//! HTTP client satisfying `bundle_service_core`'s narrow `PolicyEngineClient`
//! seam, grounded on `shared_authz::HttpPolicyClient`'s reqwest-with-timeout
//! pattern but generalized to an arbitrary test-case input shape rather
//! than the pinned `DecisionInput`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use shared_error::AppError;
use std::time::Duration;

use bundle_service_core::domains::bundle::domain::collaborators::PolicyEngineClient;

pub struct HttpPolicyTestClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPolicyTestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("failed to build policy test client: {e}")))?;
        Ok(Self { http, base_url: base_url.into() })
    }
}

#[derive(Serialize)]
struct EvaluateRequest {
    input: Value,
}

#[async_trait]
impl PolicyEngineClient for HttpPolicyTestClient {
    async fn evaluate_raw(&self, policy_path: &str, input: Value) -> Result<Value, AppError> {
        let url = format!(
            "{}/v1/data/{}",
            self.base_url.trim_end_matches('/'),
            policy_path.trim_start_matches('/')
        );
        let resp = self.http.post(url).json(&EvaluateRequest { input }).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::AuthzEvaluationFailed(format!("policy engine returned {}", resp.status())));
        }
        let body: Value = resp.json().await?;
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}
