//! Durable relational entities owned by the session/token service (§3):
//! Tenant, Subject (User), Role, Permission, and the join rows between
//! them. The KV store owns token revocation state; nothing here is
//! persisted in Redis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Inactive,
    Trial,
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Inactive => "inactive",
            TenantStatus::Trial => "trial",
        };
        write!(f, "{s}")
    }
}

/// Tenant entity (§3). `settings` is a free-form JSON bag that may carry
/// trial expiry, partner/msp tenant ids, an IP blacklist, and data
/// residency hints — the tenant-isolation policy layer reads it for the
/// "partner tenant" escape hatch (§4.4).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tenant {
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: TenantStatus,
    pub max_users: i32,
    pub max_roles: i32,
    pub settings: sqlx::types::Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub fn new(name: String, slug: String, max_users: i32, max_roles: i32) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: Uuid::new_v4(),
            name,
            slug,
            status: TenantStatus::Active,
            max_users,
            max_roles,
            settings: sqlx::types::Json(serde_json::json!({})),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

/// Subject entity (§3), a "User" in the distilled spec's vocabulary.
/// `subject_id` matches the IDP's identifier for the same principal — the
/// session service never mints this id itself, it only persists the row
/// the IDP vouches for on first successful registration.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subject {
    pub subject_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub metadata: sqlx::types::Json<serde_json::Value>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Subject {
    pub fn new(subject_id: Uuid, tenant_id: Uuid, email: String, full_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            subject_id,
            tenant_id,
            email,
            full_name,
            metadata: sqlx::types::Json(serde_json::json!({})),
            last_login_at: None,
            login_count: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn record_login(&mut self) {
        self.last_login_at = Some(Utc::now());
        self.login_count += 1;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PermissionScope {
    Own,
    Tenant,
    Global,
}

impl std::fmt::Display for PermissionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PermissionScope::Own => "own",
            PermissionScope::Tenant => "tenant",
            PermissionScope::Global => "global",
        };
        write!(f, "{s}")
    }
}

/// Permission entity (§3): `name` is unique, e.g. `users.read.own`, and is
/// derived as `{resource}.{action}[.{scope}]` by the RBAC policy layer
/// consuming `user.permissions` in the decision input.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Permission {
    pub permission_id: Uuid,
    pub name: String,
    pub resource_type: String,
    pub action: String,
    pub scope: PermissionScope,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

impl Permission {
    pub fn new(name: String, resource_type: String, action: String, scope: PermissionScope, is_system: bool) -> Self {
        Self {
            permission_id: Uuid::new_v4(),
            name,
            resource_type,
            action,
            scope,
            is_system,
            created_at: Utc::now(),
        }
    }

    /// The derived permission string the RBAC layer checks against, e.g.
    /// `users.read.own`. Matches §9's `users.read.own` convention.
    pub fn derived_string(resource_type: &str, action: &str, scope: PermissionScope) -> String {
        format!("{resource_type}.{action}.{scope}")
    }
}

/// Role entity (§3). Roles form a DAG via `parent_role_id`; a role's
/// parent, if set, must belong to the same tenant (enforced by the
/// repository, not the type system).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Role {
    pub role_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub parent_role_id: Option<Uuid>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn new(tenant_id: Uuid, name: String, description: Option<String>, parent_role_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            role_id: Uuid::new_v4(),
            tenant_id,
            name,
            description,
            parent_role_id,
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Many-to-many edge between a subject and a role, timestamped with who
/// assigned it and an optional expiry (§3).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubjectRole {
    pub subject_id: Uuid,
    pub role_id: Uuid,
    pub tenant_id: Uuid,
    pub assigned_by: Uuid,
    pub assigned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubjectRole {
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| exp < Utc::now()).unwrap_or(false)
    }
}

/// Many-to-many edge between a role and a permission.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

/// Subjects that hold one of these role names bypass tenant isolation and
/// system-resource protections (§4.4's "super-admin" concept); kept as a
/// constant rather than a flag column so it composes with the DAG role
/// model without a schema migration.
pub const SUPER_ADMIN_ROLE: &str = "super_admin";
pub const TENANT_ADMIN_ROLE: &str = "tenant_admin";
