use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use shared_authz::{AuthUser, DecisionInput, DecisionInputBuilder, UserContext};

/// The caller is identified by its own verified access token (`AuthUser`,
/// §4.2's downstream-service extractor), never by a client-supplied body
/// field — a body-supplied subject would let any caller ask "may user X do
/// Y" for an arbitrary X.
pub fn user_context_from_auth(user: &AuthUser) -> UserContext {
    UserContext {
        id: user.user_id,
        email: user.email.clone(),
        roles: user.roles.clone(),
        permissions: None,
        tenant_id: user.tenant_id,
        metadata: None,
    }
}

/// Environment fields shared by a single decision and every tuple in a
/// batch, factored out so `BatchAuthorizeReq` doesn't repeat them per-tuple.
#[derive(Debug, Clone, Serialize, Deserialize, Default, utoipa::ToSchema)]
pub struct EnvironmentReq {
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub mfa_verified: bool,
    #[serde(default)]
    pub session_age_seconds: i64,
    #[serde(default)]
    pub tenant_slug: Option<String>,
    #[serde(default)]
    pub tenant_settings: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct AuthorizeReq {
    #[validate(length(min = 1))]
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub resource_tenant_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub action: String,
    #[serde(default)]
    pub attributes: Option<Value>,
    #[serde(default)]
    pub environment: EnvironmentReq,
}

impl AuthorizeReq {
    /// Translates the request's open wire shape, plus the authenticated
    /// caller, into the typed `DecisionInput` the authorization service
    /// evaluates.
    pub fn build_input(&self, user: &AuthUser) -> DecisionInput {
        let mut builder = DecisionInputBuilder::new(user_context_from_auth(user), self.resource_type.clone())
            .action(self.action.clone())
            .mfa_verified(self.environment.mfa_verified)
            .session_age_seconds(self.environment.session_age_seconds);

        if let Some(id) = &self.resource_id {
            builder = builder.resource_id(id.clone());
        }
        if let Some(owner_id) = self.owner_id {
            builder = builder.owner_id(owner_id);
        }
        if let Some(tenant_id) = self.resource_tenant_id {
            builder = builder.resource_tenant_id(tenant_id);
        }
        if let Some(attributes) = self.attributes.clone() {
            builder = builder.attributes(attributes);
        }
        if let Some(ip) = &self.environment.ip_address {
            builder = builder.ip_address(ip.clone());
        }
        if let Some(ua) = &self.environment.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        if let Some(slug) = &self.environment.tenant_slug {
            builder = builder.tenant_slug(slug.clone());
        }
        if let Some(settings) = self.environment.tenant_settings.clone() {
            builder = builder.tenant_settings(settings);
        }

        builder.build()
    }
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AuthorizeResp {
    pub allowed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct BatchItemReq {
    #[validate(length(min = 1))]
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[validate(length(min = 1))]
    pub action: String,
    #[serde(default)]
    pub attributes: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct BatchAuthorizeReq {
    #[validate(length(min = 1))]
    pub requests: Vec<BatchItemReq>,
    #[serde(default)]
    pub environment: EnvironmentReq,
}

impl BatchAuthorizeReq {
    /// One `DecisionRequest` per tuple, all sharing the same subject and
    /// environment (§4.4's batch evaluation: each tuple is independent but
    /// describes the same in-flight caller).
    pub fn build_requests(&self, user: &AuthUser) -> Vec<shared_authz::DecisionRequest> {
        self.requests
            .iter()
            .map(|item| {
                let mut builder = DecisionInputBuilder::new(user_context_from_auth(user), item.resource_type.clone())
                    .action(item.action.clone())
                    .mfa_verified(self.environment.mfa_verified)
                    .session_age_seconds(self.environment.session_age_seconds);

                if let Some(id) = &item.resource_id {
                    builder = builder.resource_id(id.clone());
                }
                if let Some(attributes) = item.attributes.clone() {
                    builder = builder.attributes(attributes);
                }
                if let Some(ip) = &self.environment.ip_address {
                    builder = builder.ip_address(ip.clone());
                }
                if let Some(ua) = &self.environment.user_agent {
                    builder = builder.user_agent(ua.clone());
                }
                if let Some(slug) = &self.environment.tenant_slug {
                    builder = builder.tenant_slug(slug.clone());
                }
                if let Some(settings) = self.environment.tenant_settings.clone() {
                    builder = builder.tenant_settings(settings);
                }

                shared_authz::DecisionRequest {
                    resource_type: item.resource_type.clone(),
                    resource_id: item.resource_id.clone().unwrap_or_default(),
                    action: item.action.clone(),
                    input: builder.build(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            roles: vec!["member".to_string()],
        }
    }

    #[test]
    fn build_input_defaults_resource_tenant_to_subject_tenant() {
        let user = sample_user();
        let req = AuthorizeReq {
            resource_type: "document".to_string(),
            resource_id: Some("42".to_string()),
            owner_id: None,
            resource_tenant_id: None,
            action: "read".to_string(),
            attributes: None,
            environment: EnvironmentReq::default(),
        };
        let input = req.build_input(&user);
        assert_eq!(input.resource.tenant_id, Some(user.tenant_id));
        assert_eq!(input.action, "read");
    }
}
