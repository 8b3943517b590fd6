//! HTTP client for the external policy evaluation engine (§2's "Policy
//! layer"). Exposes the two operations the distilled spec names: evaluate
//! a policy at a path with input, and put/get/delete data at a path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::context::DecisionInput;

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyEvaluation {
    pub result: Value,
    #[serde(default)]
    pub decision_id: Option<String>,
    #[serde(default)]
    pub metrics: Option<Value>,
}

impl PolicyEvaluation {
    /// `result` may be a bare boolean or an object carrying `allow: bool`.
    pub fn allowed(&self) -> bool {
        match &self.result {
            Value::Bool(b) => *b,
            Value::Object(map) => map.get("allow").and_then(Value::as_bool).unwrap_or(false),
            _ => false,
        }
    }
}

#[async_trait]
pub trait PolicyClient: Send + Sync {
    /// `POST {engine}/v1/data/{policy_path}` with `{"input": ...}`.
    async fn evaluate(
        &self,
        policy_path: &str,
        input: &DecisionInput,
    ) -> Result<PolicyEvaluation, shared_error::AppError>;

    async fn put_data(&self, path: &str, data: Value) -> Result<(), shared_error::AppError>;

    async fn get_data(&self, path: &str) -> Result<Option<Value>, shared_error::AppError>;

    async fn delete_data(&self, path: &str) -> Result<(), shared_error::AppError>;
}

#[derive(Debug, Serialize)]
struct EvaluateRequest<'a> {
    input: &'a DecisionInput,
}

/// Grounded on `shared_idp_client::HttpIdpClient`'s
/// `reqwest::Client`-with-timeout pattern, pointed at the policy engine
/// instead of the IDP.
pub struct HttpPolicyClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPolicyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, shared_error::AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| shared_error::AppError::ConfigError(format!("failed to build policy client: {e}")))?;
        Ok(Self { http, base_url: base_url.into() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl PolicyClient for HttpPolicyClient {
    async fn evaluate(
        &self,
        policy_path: &str,
        input: &DecisionInput,
    ) -> Result<PolicyEvaluation, shared_error::AppError> {
        let resp = self
            .http
            .post(self.url(&format!("v1/data/{}", policy_path.trim_start_matches('/'))))
            .json(&EvaluateRequest { input })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(shared_error::AppError::AuthzEvaluationFailed(format!(
                "policy engine returned {}",
                resp.status()
            )));
        }

        resp.json::<PolicyEvaluation>()
            .await
            .map_err(|e| shared_error::AppError::AuthzEvaluationFailed(format!("malformed policy response: {e}")))
    }

    async fn put_data(&self, path: &str, data: Value) -> Result<(), shared_error::AppError> {
        let resp = self
            .http
            .put(self.url(&format!("v1/data/{}", path.trim_start_matches('/'))))
            .json(&data)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(shared_error::AppError::DependencyUnavailable(format!(
                "policy engine put_data returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn get_data(&self, path: &str) -> Result<Option<Value>, shared_error::AppError> {
        let resp = self
            .http
            .get(self.url(&format!("v1/data/{}", path.trim_start_matches('/'))))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(shared_error::AppError::DependencyUnavailable(format!(
                "policy engine get_data returned {}",
                resp.status()
            )));
        }
        Ok(Some(resp.json().await?))
    }

    async fn delete_data(&self, path: &str) -> Result<(), shared_error::AppError> {
        let resp = self
            .http
            .delete(self.url(&format!("v1/data/{}", path.trim_start_matches('/'))))
            .send()
            .await?;
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(shared_error::AppError::DependencyUnavailable(format!(
                "policy engine delete_data returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DecisionInputBuilder, UserContext};
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_input() -> DecisionInput {
        let user = UserContext {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            roles: vec!["member".to_string()],
            permissions: None,
            tenant_id: Uuid::new_v4(),
            metadata: None,
        };
        DecisionInputBuilder::new(user, "document").action("read").build()
    }

    #[test]
    fn allowed_reads_bare_boolean() {
        let eval = PolicyEvaluation { result: Value::Bool(true), decision_id: None, metrics: None };
        assert!(eval.allowed());
    }

    #[test]
    fn allowed_reads_object_with_allow_field() {
        let eval = PolicyEvaluation {
            result: serde_json::json!({"allow": true, "reason": "rbac"}),
            decision_id: None,
            metrics: None,
        };
        assert!(eval.allowed());
    }

    #[tokio::test]
    async fn evaluate_posts_to_v1_data_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/data/authz/decision"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"allow": true},
            })))
            .mount(&server)
            .await;

        let client = HttpPolicyClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let eval = client.evaluate("authz/decision", &sample_input()).await.unwrap();
        assert!(eval.allowed());
    }
}
