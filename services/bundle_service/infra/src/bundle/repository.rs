//! PostgreSQL repositories for policy documents, bundles, and deployment
//! history (§3, §4.5). Grounded on the teacher's `sqlx::query_as` +
//! manual-bind pattern (see `token_service_infra::auth::repository`);
//! the bundle activation swap is the one place this service needs a
//! multi-row transaction (§4.5's activation invariant, §5's shared
//! resource policy).

use async_trait::async_trait;
use shared_error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

use bundle_service_core::domains::bundle::domain::model::{
    BundleDeployment, BundleStatus, PolicyBundle, PolicyDocument,
};
use bundle_service_core::domains::bundle::domain::repository::{
    BundleRepository, DeploymentRepository, PolicyRepository,
};

#[derive(Clone)]
pub struct PgPolicyRepository {
    pool: PgPool,
}

impl PgPolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyRepository for PgPolicyRepository {
    async fn find_by_id(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<Option<PolicyDocument>, AppError> {
        let policy = sqlx::query_as::<_, PolicyDocument>(
            "SELECT * FROM policy_documents WHERE policy_id = $1 AND tenant_id IS NOT DISTINCT FROM $2",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(policy)
    }

    async fn find_by_path(&self, path: &str, tenant_id: Option<Uuid>) -> Result<Option<PolicyDocument>, AppError> {
        let policy = sqlx::query_as::<_, PolicyDocument>(
            "SELECT * FROM policy_documents WHERE path = $1 AND tenant_id IS NOT DISTINCT FROM $2",
        )
        .bind(path)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(policy)
    }

    async fn create(&self, policy: &PolicyDocument) -> Result<PolicyDocument, AppError> {
        let row = sqlx::query_as::<_, PolicyDocument>(
            r#"
            INSERT INTO policy_documents (
                policy_id, tenant_id, name, description, version, path, kind, content,
                status, is_system, is_valid, last_validation_error, test_cases, tags,
                published_at, published_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(policy.policy_id)
        .bind(policy.tenant_id)
        .bind(&policy.name)
        .bind(&policy.description)
        .bind(policy.version)
        .bind(&policy.path)
        .bind(policy.kind)
        .bind(&policy.content)
        .bind(policy.status)
        .bind(policy.is_system)
        .bind(policy.is_valid)
        .bind(&policy.last_validation_error)
        .bind(&policy.test_cases)
        .bind(&policy.tags)
        .bind(policy.published_at)
        .bind(policy.published_by)
        .bind(policy.created_at)
        .bind(policy.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("policy path '{}' already exists", policy.path))
            },
            other => other.into(),
        })?;
        Ok(row)
    }

    async fn update(&self, policy: &PolicyDocument) -> Result<PolicyDocument, AppError> {
        let row = sqlx::query_as::<_, PolicyDocument>(
            r#"
            UPDATE policy_documents SET
                description = $2, version = $3, content = $4, status = $5,
                is_valid = $6, last_validation_error = $7, test_cases = $8, tags = $9,
                published_at = $10, published_by = $11, updated_at = $12
            WHERE policy_id = $1
            RETURNING *
            "#,
        )
        .bind(policy.policy_id)
        .bind(&policy.description)
        .bind(policy.version)
        .bind(&policy.content)
        .bind(policy.status)
        .bind(policy.is_valid)
        .bind(&policy.last_validation_error)
        .bind(&policy.test_cases)
        .bind(&policy.tags)
        .bind(policy.published_at)
        .bind(policy.published_by)
        .bind(policy.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(
        &self,
        tenant_id: Option<Uuid>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<PolicyDocument>, i64), AppError> {
        let offset = (page - 1).max(0) * page_size;
        let policies = sqlx::query_as::<_, PolicyDocument>(
            "SELECT * FROM policy_documents WHERE tenant_id IS NOT DISTINCT FROM $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(tenant_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM policy_documents WHERE tenant_id IS NOT DISTINCT FROM $1")
                .bind(tenant_id)
                .fetch_one(&self.pool)
                .await?;
        Ok((policies, total))
    }

    async fn delete(&self, id: Uuid, tenant_id: Option<Uuid>) -> Result<(), AppError> {
        let result = sqlx::query(
            "DELETE FROM policy_documents WHERE policy_id = $1 AND tenant_id IS NOT DISTINCT FROM $2 AND is_system = false",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("policy {id} not found or is a protected system policy")));
        }
        Ok(())
    }

    async fn find_for_bundle(&self, bundle_id: Uuid) -> Result<Vec<PolicyDocument>, AppError> {
        let policies = sqlx::query_as::<_, PolicyDocument>(
            r#"
            SELECT p.* FROM policy_documents p
            INNER JOIN bundle_policies bp ON bp.policy_id = p.policy_id
            WHERE bp.bundle_id = $1
            ORDER BY p.path ASC
            "#,
        )
        .bind(bundle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(policies)
    }
}

#[derive(Clone)]
pub struct PgBundleRepository {
    pool: PgPool,
}

impl PgBundleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BundleRepository for PgBundleRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PolicyBundle>, AppError> {
        let bundle = sqlx::query_as::<_, PolicyBundle>(
            "SELECT * FROM policy_bundles WHERE bundle_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bundle)
    }

    async fn find_active(&self, tenant_id: Option<Uuid>) -> Result<Option<PolicyBundle>, AppError> {
        let bundle = sqlx::query_as::<_, PolicyBundle>(
            "SELECT * FROM policy_bundles WHERE tenant_id IS NOT DISTINCT FROM $1 AND status = 'active' AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(bundle)
    }

    async fn create(&self, bundle: &PolicyBundle, policy_ids: &[Uuid]) -> Result<PolicyBundle, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, PolicyBundle>(
            r#"
            INSERT INTO policy_bundles (
                bundle_id, tenant_id, name, version, status,
                build_started_at, build_completed_at, build_error,
                storage_path, storage_size, content_checksum, manifest,
                activated_at, activated_by, deactivated_at, deactivated_by, deactivation_reason,
                created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING *
            "#,
        )
        .bind(bundle.bundle_id)
        .bind(bundle.tenant_id)
        .bind(&bundle.name)
        .bind(&bundle.version)
        .bind(bundle.status)
        .bind(bundle.build_started_at)
        .bind(bundle.build_completed_at)
        .bind(&bundle.build_error)
        .bind(&bundle.storage_path)
        .bind(bundle.storage_size)
        .bind(&bundle.content_checksum)
        .bind(&bundle.manifest)
        .bind(bundle.activated_at)
        .bind(bundle.activated_by)
        .bind(bundle.deactivated_at)
        .bind(bundle.deactivated_by)
        .bind(&bundle.deactivation_reason)
        .bind(bundle.created_at)
        .bind(bundle.updated_at)
        .bind(bundle.deleted_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("bundle '{}' version '{}' already exists", bundle.name, bundle.version))
            },
            other => other.into(),
        })?;

        for policy_id in policy_ids {
            sqlx::query("INSERT INTO bundle_policies (bundle_id, policy_id) VALUES ($1, $2)")
                .bind(bundle.bundle_id)
                .bind(policy_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(row)
    }

    async fn list(
        &self,
        tenant_id: Option<Uuid>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<PolicyBundle>, i64), AppError> {
        let offset = (page - 1).max(0) * page_size;
        let bundles = sqlx::query_as::<_, PolicyBundle>(
            "SELECT * FROM policy_bundles WHERE tenant_id IS NOT DISTINCT FROM $1 AND deleted_at IS NULL ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(tenant_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM policy_bundles WHERE tenant_id IS NOT DISTINCT FROM $1 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((bundles, total))
    }

    async fn mark_building(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE policy_bundles SET status = 'building', build_started_at = now(), updated_at = now() WHERE bundle_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_ready(
        &self,
        id: Uuid,
        storage_path: &str,
        storage_size: i64,
        checksum: &str,
        manifest: serde_json::Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE policy_bundles SET
                status = 'ready', storage_path = $2, storage_size = $3,
                content_checksum = $4, manifest = $5, build_completed_at = now(), updated_at = now()
            WHERE bundle_id = $1
            "#,
        )
        .bind(id)
        .bind(storage_path)
        .bind(storage_size)
        .bind(checksum)
        .bind(sqlx::types::Json(manifest))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE policy_bundles SET status = 'failed', build_error = $2, build_completed_at = now(), updated_at = now() WHERE bundle_id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn activate(&self, id: Uuid, activated_by: Uuid) -> Result<PolicyBundle, AppError> {
        let mut tx = self.pool.begin().await?;

        let target = sqlx::query_as::<_, PolicyBundle>(
            "SELECT * FROM policy_bundles WHERE bundle_id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("bundle {id} not found")))?;

        if target.status != BundleStatus::Ready {
            return Err(AppError::Conflict(format!(
                "bundle {id} can only be activated from READY, found {:?}",
                target.status
            )));
        }

        // §4.5's activation invariant: at most one ACTIVE bundle per
        // tenant. Flip the current one to INACTIVE in the same
        // transaction before activating the target.
        sqlx::query(
            "UPDATE policy_bundles SET status = 'inactive', deactivated_at = now(), deactivated_by = $2, deactivation_reason = 'superseded by activation', updated_at = now() WHERE tenant_id IS NOT DISTINCT FROM $1 AND status = 'active'",
        )
        .bind(target.tenant_id)
        .bind(activated_by)
        .execute(&mut *tx)
        .await?;

        let activated = sqlx::query_as::<_, PolicyBundle>(
            "UPDATE policy_bundles SET status = 'active', activated_at = now(), activated_by = $2, updated_at = now() WHERE bundle_id = $1 RETURNING *",
        )
        .bind(id)
        .bind(activated_by)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(activated)
    }

    async fn deactivate(&self, id: Uuid, deactivated_by: Uuid, reason: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE policy_bundles SET status = 'inactive', deactivated_at = now(), deactivated_by = $2, deactivation_reason = $3, updated_at = now() WHERE bundle_id = $1 AND status = 'active'",
        )
        .bind(id)
        .bind(deactivated_by)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!("bundle {id} is not currently ACTIVE")));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE policy_bundles SET deleted_at = now(), updated_at = now() WHERE bundle_id = $1 AND status != 'active' AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!("bundle {id} is ACTIVE and cannot be deleted, or does not exist")));
        }
        Ok(())
    }

    async fn expect_status(&self, id: Uuid, expected: BundleStatus) -> Result<PolicyBundle, AppError> {
        let bundle = self.find_by_id(id).await?.ok_or_else(|| AppError::NotFound(format!("bundle {id} not found")))?;
        if bundle.status != expected {
            return Err(AppError::Conflict(format!(
                "bundle {id} expected status {expected:?}, found {:?}",
                bundle.status
            )));
        }
        Ok(bundle)
    }
}

#[derive(Clone)]
pub struct PgDeploymentRepository {
    pool: PgPool,
}

impl PgDeploymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeploymentRepository for PgDeploymentRepository {
    async fn create(&self, deployment: &BundleDeployment) -> Result<BundleDeployment, AppError> {
        let row = sqlx::query_as::<_, BundleDeployment>(
            r#"
            INSERT INTO bundle_deployments (
                deployment_id, bundle_id, deployer_id, environment, status,
                deployed_at, rollback_of, rollback_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(deployment.deployment_id)
        .bind(deployment.bundle_id)
        .bind(deployment.deployer_id)
        .bind(&deployment.environment)
        .bind(deployment.status)
        .bind(deployment.deployed_at)
        .bind(deployment.rollback_of)
        .bind(&deployment.rollback_reason)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_for_bundle(&self, bundle_id: Uuid) -> Result<Vec<BundleDeployment>, AppError> {
        let deployments = sqlx::query_as::<_, BundleDeployment>(
            "SELECT * FROM bundle_deployments WHERE bundle_id = $1 ORDER BY deployed_at DESC",
        )
        .bind(bundle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(deployments)
    }
}

