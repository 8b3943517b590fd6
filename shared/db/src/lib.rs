use shared_error::AppError;
use sqlx::postgres::PgPoolOptions;
pub use sqlx::PgPool;

/// Initialize the relational store connection pool. Owns Tenant/Subject/
/// Role/Permission/PolicyDocument/PolicyBundle/BundleDeployment rows (§3's
/// ownership summary); the KV store and object store are separate clients.
pub async fn init_pool(
    database_url: &str,
    max_connections: u32,
    min_connections: u32,
) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections)
        .connect(database_url)
        .await
        .map_err(|e| AppError::ConfigError(format!("failed to connect to database: {e}")))
}
