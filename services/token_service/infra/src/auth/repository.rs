//! PostgreSQL repositories for tenants, subjects, roles and permissions
//! (§3). Grounded on the teacher's `PgUserRepository`/`PgTenantRepository`
//! `sqlx::query_as` + manual bind pattern; joins are explicit id-keyed
//! queries rather than ORM back-references (Design Notes' "no
//! bidirectional pointers" guidance).

use async_trait::async_trait;
use shared_error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

use token_service_core::domains::auth::domain::model::{
    Permission, Role, Subject, SubjectRole, Tenant, TenantStatus,
};
use token_service_core::domains::auth::domain::repository::{
    PermissionRepository, RoleRepository, SubjectRepository, TenantRepository,
};

#[derive(Clone)]
pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE tenant_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE slug = $1 AND deleted_at IS NULL",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn create(&self, tenant: &Tenant) -> Result<Tenant, AppError> {
        let row = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (
                tenant_id, name, slug, status, max_users, max_roles, settings,
                created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(tenant.tenant_id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(tenant.status)
        .bind(tenant.max_users)
        .bind(tenant.max_roles)
        .bind(&tenant.settings)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .bind(tenant.deleted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("tenant slug '{}' already exists", tenant.slug))
            },
            other => other.into(),
        })?;
        Ok(row)
    }

    async fn update_status(&self, id: Uuid, status: TenantStatus) -> Result<Tenant, AppError> {
        let row = sqlx::query_as::<_, Tenant>(
            "UPDATE tenants SET status = $1, updated_at = now() WHERE tenant_id = $2 AND deleted_at IS NULL RETURNING *",
        )
        .bind(status)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tenant {id} not found")))?;
        Ok(row)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE tenants SET deleted_at = now() WHERE tenant_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, page: i64, page_size: i64) -> Result<(Vec<Tenant>, i64), AppError> {
        let offset = (page.max(1) - 1) * page_size;
        let tenants = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE deleted_at IS NULL ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tenants WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok((tenants, total))
    }

    async fn count_subjects(&self, tenant_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subjects WHERE tenant_id = $1 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[derive(Clone)]
pub struct PgSubjectRepository {
    pool: PgPool,
}

impl PgSubjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectRepository for PgSubjectRepository {
    async fn find_by_email(&self, email: &str, tenant_id: Uuid) -> Result<Option<Subject>, AppError> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT * FROM subjects WHERE email = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(email)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subject)
    }

    async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<Subject>, AppError> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT * FROM subjects WHERE subject_id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subject)
    }

    async fn find_by_id_any_tenant(&self, id: Uuid) -> Result<Option<Subject>, AppError> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT * FROM subjects WHERE subject_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subject)
    }

    async fn create(&self, subject: &Subject) -> Result<Subject, AppError> {
        let row = sqlx::query_as::<_, Subject>(
            r#"
            INSERT INTO subjects (
                subject_id, tenant_id, email, full_name, metadata,
                last_login_at, login_count, created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(subject.subject_id)
        .bind(subject.tenant_id)
        .bind(&subject.email)
        .bind(&subject.full_name)
        .bind(&subject.metadata)
        .bind(subject.last_login_at)
        .bind(subject.login_count)
        .bind(subject.created_at)
        .bind(subject.updated_at)
        .bind(subject.deleted_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("email '{}' already registered in tenant", subject.email))
            },
            other => other.into(),
        })?;
        Ok(row)
    }

    async fn update(&self, subject: &Subject) -> Result<Subject, AppError> {
        let row = sqlx::query_as::<_, Subject>(
            r#"
            UPDATE subjects SET
                full_name = $1, metadata = $2, last_login_at = $3,
                login_count = $4, updated_at = now()
            WHERE subject_id = $5 AND tenant_id = $6 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(&subject.full_name)
        .bind(&subject.metadata)
        .bind(subject.last_login_at)
        .bind(subject.login_count)
        .bind(subject.subject_id)
        .bind(subject.tenant_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("subject {} not found", subject.subject_id)))?;
        Ok(row)
    }

    async fn soft_delete(&self, id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE subjects SET deleted_at = now() WHERE subject_id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, tenant_id: Uuid, page: i64, page_size: i64) -> Result<(Vec<Subject>, i64), AppError> {
        let offset = (page.max(1) - 1) * page_size;
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT * FROM subjects WHERE tenant_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(tenant_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subjects WHERE tenant_id = $1 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((subjects, total))
    }

    async fn email_exists(&self, email: &str, tenant_id: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subjects WHERE email = $1 AND tenant_id = $2 AND deleted_at IS NULL)",
        )
        .bind(email)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[derive(Clone)]
pub struct PgRoleRepository {
    pool: PgPool,
}

impl PgRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role_id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn find_by_name(&self, name: &str, tenant_id: Uuid) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1 AND tenant_id = $2")
            .bind(name)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn create(&self, role: &Role) -> Result<Role, AppError> {
        if let Some(parent_id) = role.parent_role_id {
            let parent = self.find_by_id(parent_id, role.tenant_id).await?;
            if parent.is_none() {
                return Err(AppError::Conflict(
                    "parent role must belong to the same tenant".to_string(),
                ));
            }
        }
        let row = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (role_id, tenant_id, name, description, parent_role_id, is_system, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(role.role_id)
        .bind(role.tenant_id)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.parent_role_id)
        .bind(role.is_system)
        .bind(role.created_at)
        .bind(role.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("role '{}' already exists in tenant", role.name))
            },
            other => other.into(),
        })?;
        Ok(row)
    }

    async fn delete(&self, id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        let role = self
            .find_by_id(id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role {id} not found")))?;
        if role.is_system {
            return Err(AppError::Forbidden("system roles cannot be deleted".to_string()));
        }
        sqlx::query("DELETE FROM roles WHERE role_id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE tenant_id = $1 ORDER BY name")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn role_names_for_subject(&self, subject_id: Uuid, tenant_id: Uuid) -> Result<Vec<String>, AppError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name FROM roles r
            JOIN subject_roles sr ON sr.role_id = r.role_id
            WHERE sr.subject_id = $1 AND sr.tenant_id = $2
              AND (sr.expires_at IS NULL OR sr.expires_at > now())
            "#,
        )
        .bind(subject_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn permission_strings_for_subject(
        &self,
        subject_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<String>, AppError> {
        let perms: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT p.resource_type || '.' || p.action || '.' || p.scope
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.permission_id
            JOIN subject_roles sr ON sr.role_id = rp.role_id
            WHERE sr.subject_id = $1 AND sr.tenant_id = $2
              AND (sr.expires_at IS NULL OR sr.expires_at > now())
            "#,
        )
        .bind(subject_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(perms)
    }

    async fn assign(&self, assignment: &SubjectRole) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO subject_roles (subject_id, role_id, tenant_id, assigned_by, assigned_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (subject_id, role_id) DO UPDATE SET
                assigned_by = EXCLUDED.assigned_by,
                assigned_at = EXCLUDED.assigned_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(assignment.subject_id)
        .bind(assignment.role_id)
        .bind(assignment.tenant_id)
        .bind(assignment.assigned_by)
        .bind(assignment.assigned_at)
        .bind(assignment.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke(&self, subject_id: Uuid, role_id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "DELETE FROM subject_roles WHERE subject_id = $1 AND role_id = $2 AND tenant_id = $3",
        )
        .bind(subject_id)
        .bind(role_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn assert_acyclic(&self, role_id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        let mut current = self.find_by_id(role_id, tenant_id).await?;
        let mut seen = std::collections::HashSet::new();
        seen.insert(role_id);
        while let Some(role) = current {
            match role.parent_role_id {
                None => return Ok(()),
                Some(parent_id) => {
                    if !seen.insert(parent_id) {
                        return Err(AppError::Conflict("role hierarchy contains a cycle".to_string()));
                    }
                    current = self.find_by_id(parent_id, tenant_id).await?;
                },
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgPermissionRepository {
    pool: PgPool,
}

impl PgPermissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<Permission>, AppError> {
        let perm = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(perm)
    }

    async fn create(&self, permission: &Permission) -> Result<Permission, AppError> {
        let row = sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (permission_id, name, resource_type, action, scope, is_system, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(permission.permission_id)
        .bind(&permission.name)
        .bind(&permission.resource_type)
        .bind(&permission.action)
        .bind(permission.scope)
        .bind(permission.is_system)
        .bind(permission.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("permission '{}' already exists", permission.name))
            },
            other => other.into(),
        })?;
        Ok(row)
    }

    async fn list(&self) -> Result<Vec<Permission>, AppError> {
        let perms = sqlx::query_as::<_, Permission>("SELECT * FROM permissions ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(perms)
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let perm = sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE permission_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("permission {id} not found")))?;
        if perm.is_system {
            return Err(AppError::Forbidden("system permissions cannot be deleted".to_string()));
        }
        sqlx::query("DELETE FROM permissions WHERE permission_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn attach_to_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn detach_from_role(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id)
            .bind(permission_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
