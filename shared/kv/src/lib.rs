//! The key-value store component (§2, §3): the revocation store (blacklist
//! + per-subject refresh registry) and the decision cache. Both live in the
//! same Redis instance but are kept as distinct traits so the session and
//! authorization services can be tested against independent fakes.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistent key-value operations backing token revocation: blacklist a
/// token id until TTL, record/enumerate/delete a user's refresh ids, check
/// membership. Matches §2's "Revocation store" component.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Blacklist an access token id for `ttl` (the remaining access lifetime).
    async fn blacklist(&self, jti: Uuid, ttl: Duration) -> Result<(), shared_error::AppError>;

    /// Whether an access token id is currently blacklisted.
    async fn is_blacklisted(&self, jti: Uuid) -> Result<bool, shared_error::AppError>;

    /// Register a refresh token id under a subject for `ttl`.
    async fn register_refresh(
        &self,
        subject: Uuid,
        jti: Uuid,
        ttl: Duration,
    ) -> Result<(), shared_error::AppError>;

    /// Whether a refresh token id is present in the subject's registry.
    async fn is_refresh_registered(
        &self,
        subject: Uuid,
        jti: Uuid,
    ) -> Result<bool, shared_error::AppError>;

    /// Remove a single refresh id from the subject's registry.
    async fn revoke_refresh(&self, subject: Uuid, jti: Uuid) -> Result<(), shared_error::AppError>;

    /// Remove every refresh id registered under a subject (logout-everywhere).
    async fn revoke_all_refresh(&self, subject: Uuid) -> Result<(), shared_error::AppError>;
}

/// Short-TTL cache of authorization decisions keyed by
/// `(user, resource_type, resource_id, action)`. Matches §2's "Decision
/// cache" component and §4.4's caching rule. Strictly an optimization —
/// callers must remain correct with TTL=0.
#[async_trait]
pub trait DecisionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<bool>, shared_error::AppError>;

    async fn set(&self, key: &str, decision: bool, ttl: Duration)
        -> Result<(), shared_error::AppError>;

    /// Coarse invalidation: delete every key matching `(user_id, *)`.
    async fn invalidate_user(&self, user_id: Uuid) -> Result<(), shared_error::AppError>;
}

/// Deterministic cache key builder, matching §4.4's
/// `(user_id, resource_type, resource_id, action)` tuple.
pub fn decision_cache_key(
    user_id: Uuid,
    resource_type: &str,
    resource_id: &str,
    action: &str,
) -> String {
    format!("decision:{user_id}:{resource_type}:{resource_id}:{action}")
}

fn refresh_registry_key(subject: Uuid, jti: Uuid) -> String {
    format!("refresh:{subject}:{jti}")
}

fn refresh_registry_pattern(subject: Uuid) -> String {
    format!("refresh:{subject}:*")
}

fn blacklist_key(jti: Uuid) -> String {
    format!("blacklist:{jti}")
}

fn decision_cache_pattern(user_id: Uuid) -> String {
    format!("decision:{user_id}:*")
}

/// Redis-backed implementation of both `RevocationStore` and
/// `DecisionCache`, grounded on the teacher's `RedisRateLimiter`
/// connection-manager pattern (a cloneable `ConnectionManager` guarded by
/// an `RwLock` so a dropped connection can be replaced without taking the
/// whole store down).
#[derive(Clone)]
pub struct RedisKvStore {
    connection: Arc<RwLock<ConnectionManager>>,
}

impl RedisKvStore {
    pub async fn connect(redis_url: &str) -> Result<Self, shared_error::AppError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| shared_error::AppError::ConfigError(format!("invalid redis url: {e}")))?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection: Arc::new(RwLock::new(connection)) })
    }

    async fn conn(&self) -> ConnectionManager {
        self.connection.read().await.clone()
    }

    /// SCAN + DEL for a glob pattern; used for the coarse decision-cache and
    /// refresh-registry invalidations. Not atomic across the scan, but the
    /// worst case is a racing write surviving one extra TTL window, which
    /// §5's shared-resource policy accepts.
    async fn delete_pattern(&self, pattern: &str) -> Result<(), shared_error::AppError> {
        let mut conn = self.conn().await;
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;
            if !keys.is_empty() {
                conn.del::<_, ()>(keys).await?;
            }
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(())
    }

    pub async fn is_healthy(&self) -> bool {
        let mut conn = self.conn().await;
        matches!(redis::cmd("PING").query_async::<String>(&mut conn).await, Ok(resp) if resp == "PONG")
    }
}

#[async_trait]
impl RevocationStore for RedisKvStore {
    async fn blacklist(&self, jti: Uuid, ttl: Duration) -> Result<(), shared_error::AppError> {
        let mut conn = self.conn().await;
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(blacklist_key(jti), true, ttl_secs).await?;
        Ok(())
    }

    async fn is_blacklisted(&self, jti: Uuid) -> Result<bool, shared_error::AppError> {
        let mut conn = self.conn().await;
        let exists: bool = conn.exists(blacklist_key(jti)).await?;
        Ok(exists)
    }

    async fn register_refresh(
        &self,
        subject: Uuid,
        jti: Uuid,
        ttl: Duration,
    ) -> Result<(), shared_error::AppError> {
        let mut conn = self.conn().await;
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(refresh_registry_key(subject, jti), true, ttl_secs).await?;
        Ok(())
    }

    async fn is_refresh_registered(
        &self,
        subject: Uuid,
        jti: Uuid,
    ) -> Result<bool, shared_error::AppError> {
        let mut conn = self.conn().await;
        let exists: bool = conn.exists(refresh_registry_key(subject, jti)).await?;
        Ok(exists)
    }

    async fn revoke_refresh(&self, subject: Uuid, jti: Uuid) -> Result<(), shared_error::AppError> {
        let mut conn = self.conn().await;
        conn.del::<_, ()>(refresh_registry_key(subject, jti)).await?;
        Ok(())
    }

    async fn revoke_all_refresh(&self, subject: Uuid) -> Result<(), shared_error::AppError> {
        self.delete_pattern(&refresh_registry_pattern(subject)).await
    }
}

#[async_trait]
impl DecisionCache for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<bool>, shared_error::AppError> {
        let mut conn = self.conn().await;
        let value: Option<bool> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        decision: bool,
        ttl: Duration,
    ) -> Result<(), shared_error::AppError> {
        let mut conn = self.conn().await;
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, decision, ttl_secs).await?;
        Ok(())
    }

    async fn invalidate_user(&self, user_id: Uuid) -> Result<(), shared_error::AppError> {
        self.delete_pattern(&decision_cache_pattern(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_deterministic() {
        let user = Uuid::new_v4();
        let a = decision_cache_key(user, "document", "42", "read");
        let b = decision_cache_key(user, "document", "42", "read");
        assert_eq!(a, b);
        assert!(a.starts_with(&format!("decision:{user}:")));
    }

    #[test]
    fn cache_key_distinguishes_action() {
        let user = Uuid::new_v4();
        let read = decision_cache_key(user, "document", "42", "read");
        let write = decision_cache_key(user, "document", "42", "update");
        assert_ne!(read, write);
    }
}
