//! Builds the decision input handed to the policy engine on every
//! authorization check (§4.3). One shape, serialized verbatim as the
//! engine's `input` object.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct UserContext {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceContext {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "ownerId", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(rename = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeContext {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "dayOfWeek")]
    pub day_of_week: u32,
    pub hour: u32,
    pub minute: u32,
    #[serde(rename = "isWeekend")]
    pub is_weekend: bool,
    #[serde(rename = "isBusinessHours")]
    pub is_business_hours: bool,
}

impl TimeContext {
    /// `isBusinessHours` is weekday AND 09 <= hour < 17, evaluated against
    /// the API host's UTC clock (§9's clock-skew-authority decision: the
    /// policy engine's clock is never consulted).
    pub fn now() -> Self {
        let timestamp = Utc::now();
        Self::at(timestamp)
    }

    pub fn at(timestamp: DateTime<Utc>) -> Self {
        let weekday = timestamp.weekday();
        let is_weekend =
            matches!(weekday, chrono::Weekday::Sat | chrono::Weekday::Sun);
        let hour = timestamp.hour();
        Self {
            timestamp,
            day_of_week: weekday.num_days_from_sunday(),
            hour,
            minute: timestamp.minute(),
            is_weekend,
            is_business_hours: !is_weekend && (9..17).contains(&hour),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    pub method: String,
    pub path: String,
    #[serde(rename = "mfaVerified")]
    pub mfa_verified: bool,
    #[serde(rename = "sessionAge")]
    pub session_age_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

/// The full decision input, handed to the policy engine as `{"input": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionInput {
    pub user: UserContext,
    pub resource: ResourceContext,
    pub action: String,
    pub time: TimeContext,
    pub context: RequestContext,
    pub tenant: TenantContext,
}

/// Derives the default action from an HTTP method when the caller doesn't
/// supply one explicitly (GET→read, POST→create, PUT/PATCH→update, DELETE→delete).
pub fn action_from_method(method: &str) -> String {
    match method.to_uppercase().as_str() {
        "GET" | "HEAD" => "read",
        "POST" => "create",
        "PUT" | "PATCH" => "update",
        "DELETE" => "delete",
        other => return other.to_lowercase(),
    }
    .to_string()
}

pub struct DecisionInputBuilder {
    user: UserContext,
    resource_type: String,
    resource_id: Option<String>,
    owner_id: Option<Uuid>,
    resource_tenant_id: Option<Uuid>,
    attributes: Option<Value>,
    action: Option<String>,
    method: String,
    path: String,
    ip_address: String,
    user_agent: String,
    mfa_verified: bool,
    session_age_seconds: i64,
    headers: Option<HashMap<String, String>>,
    tenant_slug: Option<String>,
    tenant_settings: Option<Value>,
}

impl DecisionInputBuilder {
    pub fn new(user: UserContext, resource_type: impl Into<String>) -> Self {
        Self {
            user,
            resource_type: resource_type.into(),
            resource_id: None,
            owner_id: None,
            resource_tenant_id: None,
            attributes: None,
            action: None,
            method: "GET".to_string(),
            path: String::new(),
            ip_address: "0.0.0.0".to_string(),
            user_agent: String::new(),
            mfa_verified: false,
            session_age_seconds: 0,
            headers: None,
            tenant_slug: None,
            tenant_settings: None,
        }
    }

    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn owner_id(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn resource_tenant_id(mut self, tenant_id: Uuid) -> Self {
        self.resource_tenant_id = Some(tenant_id);
        self
    }

    pub fn attributes(mut self, attributes: Value) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn mfa_verified(mut self, verified: bool) -> Self {
        self.mfa_verified = verified;
        self
    }

    pub fn session_age_seconds(mut self, age: i64) -> Self {
        self.session_age_seconds = age;
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn tenant_slug(mut self, slug: impl Into<String>) -> Self {
        self.tenant_slug = Some(slug.into());
        self
    }

    pub fn tenant_settings(mut self, settings: Value) -> Self {
        self.tenant_settings = Some(settings);
        self
    }

    /// Builds the final input. `resource.tenantId` defaults to the
    /// subject's tenant when not explicitly supplied — leaving it unset
    /// would make tenant-isolation policy spuriously deny (§9).
    pub fn build(self) -> DecisionInput {
        let action = self.action.unwrap_or_else(|| action_from_method(&self.method));
        let resource_tenant_id = self.resource_tenant_id.unwrap_or(self.user.tenant_id);
        let tenant_id = self.user.tenant_id;

        DecisionInput {
            resource: ResourceContext {
                resource_type: self.resource_type,
                id: self.resource_id,
                owner_id: self.owner_id,
                tenant_id: Some(resource_tenant_id),
                attributes: self.attributes,
            },
            action,
            time: TimeContext::now(),
            context: RequestContext {
                ip_address: self.ip_address,
                user_agent: self.user_agent,
                method: self.method,
                path: self.path,
                mfa_verified: self.mfa_verified,
                session_age_seconds: self.session_age_seconds,
                headers: self.headers,
            },
            tenant: TenantContext {
                id: tenant_id,
                slug: self.tenant_slug,
                settings: self.tenant_settings,
            },
            user: self.user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn action_defaults_follow_http_method() {
        assert_eq!(action_from_method("GET"), "read");
        assert_eq!(action_from_method("POST"), "create");
        assert_eq!(action_from_method("PUT"), "update");
        assert_eq!(action_from_method("PATCH"), "update");
        assert_eq!(action_from_method("DELETE"), "delete");
    }

    #[test]
    fn business_hours_excludes_weekends() {
        // Saturday 2024-01-06 10:00 UTC
        let saturday = Utc.with_ymd_and_hms(2024, 1, 6, 10, 0, 0).unwrap();
        let t = TimeContext::at(saturday);
        assert!(t.is_weekend);
        assert!(!t.is_business_hours);

        // Monday 2024-01-08 10:00 UTC
        let monday = Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap();
        let t = TimeContext::at(monday);
        assert!(!t.is_weekend);
        assert!(t.is_business_hours);
    }

    #[test]
    fn builder_defaults_resource_tenant_to_user_tenant() {
        let user = UserContext {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            roles: vec!["member".to_string()],
            permissions: None,
            tenant_id: Uuid::new_v4(),
            metadata: None,
        };
        let input = DecisionInputBuilder::new(user.clone(), "document").build();
        assert_eq!(input.resource.tenant_id, Some(user.tenant_id));
    }
}
