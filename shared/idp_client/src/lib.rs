//! Client for the upstream identity provider: the external collaborator
//! that stores credentials and hashes passwords (§1's Non-goals). The
//! session service never touches a password hash; it delegates credential
//! verification here and only persists the subject row the IDP vouches for.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_error::AppError;
use std::time::Duration;

/// The identity the IDP vouches for after a successful credential check or
/// registration. `subject_id` matches the IDP's identifier for the
/// principal (§3's Subject invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub email: String,
}

/// Credential verification and registration, delegated entirely to the
/// upstream IDP. Implementations must not cache or log the password.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, AppError>;

    async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, AppError>;

    /// `POST /auth/password/change` (§6): verifies `current_password`
    /// against the IDP and replaces it with `new_password`. The gateway
    /// never sees or stores either value beyond this call.
    async fn change_password(
        &self,
        subject_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError>;
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    email: &'a str,
    password: &'a str,
    application_id: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    application_id: &'a str,
    tenant_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ChangePasswordRequest<'a> {
    subject_id: &'a str,
    current_password: &'a str,
    new_password: &'a str,
    application_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct IdpIdentityResponse {
    subject_id: String,
    email: String,
}

/// HTTP client for the configured IDP, grounded on the teacher's
/// `reqwest::Client`-with-timeout pattern.
pub struct HttpIdpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    tenant_id: String,
    application_id: String,
}

impl HttpIdpClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        tenant_id: impl Into<String>,
        application_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("failed to build IDP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            tenant_id: tenant_id.into(),
            application_id: application_id.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[async_trait]
impl IdentityProvider for HttpIdpClient {
    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, AppError> {
        let resp = self
            .http
            .post(self.url("v1/credentials/verify"))
            .header("X-Api-Key", &self.api_key)
            .json(&VerifyRequest { email, password, application_id: &self.application_id })
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED
            || resp.status() == reqwest::StatusCode::BAD_REQUEST
        {
            tracing::warn!(%email, "idp rejected credentials");
            return Err(AppError::Unauthenticated("invalid credentials".to_string()));
        }
        if !resp.status().is_success() {
            return Err(AppError::DependencyUnavailable(format!(
                "idp returned {}",
                resp.status()
            )));
        }

        let body: IdpIdentityResponse = resp.json().await?;
        Ok(VerifiedIdentity { subject_id: body.subject_id, email: body.email })
    }

    async fn register(&self, email: &str, password: &str) -> Result<VerifiedIdentity, AppError> {
        let resp = self
            .http
            .post(self.url("v1/credentials/register"))
            .header("X-Api-Key", &self.api_key)
            .json(&RegisterRequest {
                email,
                password,
                application_id: &self.application_id,
                tenant_id: &self.tenant_id,
            })
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::CONFLICT {
            return Err(AppError::Conflict("identity already registered with idp".to_string()));
        }
        if !resp.status().is_success() {
            return Err(AppError::DependencyUnavailable(format!(
                "idp returned {}",
                resp.status()
            )));
        }

        let body: IdpIdentityResponse = resp.json().await?;
        Ok(VerifiedIdentity { subject_id: body.subject_id, email: body.email })
    }

    async fn change_password(
        &self,
        subject_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let resp = self
            .http
            .post(self.url("v1/credentials/change-password"))
            .header("X-Api-Key", &self.api_key)
            .json(&ChangePasswordRequest {
                subject_id,
                current_password,
                new_password,
                application_id: &self.application_id,
            })
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!(%subject_id, "idp rejected current password on change-password");
            return Err(AppError::Unauthenticated("current password is incorrect".to_string()));
        }
        if !resp.status().is_success() {
            return Err(AppError::DependencyUnavailable(format!(
                "idp returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn verify_credentials_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/credentials/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subject_id": "idp-subject-1",
                "email": "alice@example.com",
            })))
            .mount(&server)
            .await;

        let client = HttpIdpClient::new(
            server.uri(),
            "key",
            "tenant",
            "app",
            Duration::from_secs(5),
        )
        .unwrap();

        let identity = client.verify_credentials("alice@example.com", "hunter2").await.unwrap();
        assert_eq!(identity.subject_id, "idp-subject-1");
    }

    #[tokio::test]
    async fn verify_credentials_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/credentials/verify"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = HttpIdpClient::new(
            server.uri(),
            "key",
            "tenant",
            "app",
            Duration::from_secs(5),
        )
        .unwrap();

        let result = client.verify_credentials("alice@example.com", "wrong").await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn change_password_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/credentials/change-password"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = HttpIdpClient::new(
            server.uri(),
            "key",
            "tenant",
            "app",
            Duration::from_secs(5),
        )
        .unwrap();

        client.change_password("idp-subject-1", "old", "new").await.unwrap();
    }

    #[tokio::test]
    async fn change_password_rejects_wrong_current_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/credentials/change-password"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = HttpIdpClient::new(
            server.uri(),
            "key",
            "tenant",
            "app",
            Duration::from_secs(5),
        )
        .unwrap();

        let result = client.change_password("idp-subject-1", "wrong", "new").await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }
}
