use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

use super::model::{Permission, Role, Subject, SubjectRole, Tenant, TenantStatus};

/// Tenant data access. Matches §3's lifecycle: created by admin,
/// soft-deleted (row retained, `deleted_at` set).
#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError>;

    async fn create(&self, tenant: &Tenant) -> Result<Tenant, AppError>;

    async fn update_status(&self, id: Uuid, status: TenantStatus) -> Result<Tenant, AppError>;

    async fn soft_delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn list(&self, page: i64, page_size: i64) -> Result<(Vec<Tenant>, i64), AppError>;

    /// Count of non-deleted subjects in the tenant, checked against
    /// `max_users` before registration (§3's resource quota).
    async fn count_subjects(&self, tenant_id: Uuid) -> Result<i64, AppError>;
}

/// Subject (User) data access. Implementations must scope every lookup by
/// tenant except `find_by_id_any_tenant`, used only for super-admin
/// cross-tenant lookups.
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    async fn find_by_email(&self, email: &str, tenant_id: Uuid) -> Result<Option<Subject>, AppError>;

    async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<Subject>, AppError>;

    async fn find_by_id_any_tenant(&self, id: Uuid) -> Result<Option<Subject>, AppError>;

    async fn create(&self, subject: &Subject) -> Result<Subject, AppError>;

    async fn update(&self, subject: &Subject) -> Result<Subject, AppError>;

    async fn soft_delete(&self, id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;

    async fn list(&self, tenant_id: Uuid, page: i64, page_size: i64) -> Result<(Vec<Subject>, i64), AppError>;

    async fn email_exists(&self, email: &str, tenant_id: Uuid) -> Result<bool, AppError>;
}

/// Role/permission data access, modeled as explicit join-table rows per
/// the Design Notes' "no bidirectional pointers" guidance — callers fetch
/// graphs by id rather than walking back-references.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<Role>, AppError>;

    async fn find_by_name(&self, name: &str, tenant_id: Uuid) -> Result<Option<Role>, AppError>;

    async fn create(&self, role: &Role) -> Result<Role, AppError>;

    async fn delete(&self, id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<Role>, AppError>;

    /// Role names (not role rows) assigned to a subject, filtered to
    /// non-expired assignments — the shape `shared_authz` needs for
    /// `Claims.roles` / `UserContext.roles`.
    async fn role_names_for_subject(&self, subject_id: Uuid, tenant_id: Uuid) -> Result<Vec<String>, AppError>;

    /// Derived permission strings (`{resource}.{action}.{scope}`) across
    /// every non-expired role a subject holds.
    async fn permission_strings_for_subject(
        &self,
        subject_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<String>, AppError>;

    async fn assign(&self, assignment: &SubjectRole) -> Result<(), AppError>;

    async fn revoke(&self, subject_id: Uuid, role_id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;

    /// Walks the parent chain starting at `role_id`, erroring with
    /// `Conflict` if a cycle is detected (§3's DAG invariant).
    async fn assert_acyclic(&self, role_id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Permission>, AppError>;

    async fn create(&self, permission: &Permission) -> Result<Permission, AppError>;

    async fn list(&self) -> Result<Vec<Permission>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn attach_to_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), AppError>;

    async fn detach_from_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), AppError>;
}
