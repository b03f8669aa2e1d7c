use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPool;
use time::OffsetDateTime;
use tracing::debug;

use crate::cache::{MAX_TRANSIENT_TTL, TransientError, TransientStore};

/// Transients persisted in `crossblog_transients`, shared by every process on the database.
///
/// Expiry is stamped and checked against this process's clock.
#[derive(Clone)]
pub struct PostgresTransientStore {
    pool: Arc<PgPool>,
}

impl PostgresTransientStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Deletes every expired row, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, TransientError> {
        let result = sqlx::query("DELETE FROM crossblog_transients WHERE expires_at <= $1")
            .bind(OffsetDateTime::now_utc())
            .execute(self.pool.as_ref())
            .await
            .map_err(TransientError::backend)?;
        debug!(
            target: "crossblog::transients",
            purged = result.rows_affected(),
            "Purged expired transients"
        );
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TransientStore for PostgresTransientStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, TransientError> {
        sqlx::query_scalar::<_, Value>(
            "SELECT value FROM crossblog_transients WHERE key = $1 AND expires_at > $2",
        )
        .bind(key)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(TransientError::backend)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), TransientError> {
        let expires_at = time::Duration::try_from(ttl.min(MAX_TRANSIENT_TTL))
            .ok()
            .and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl))
            .ok_or_else(|| TransientError::backend("transient lifetime out of range"))?;
        sqlx::query(
            "INSERT INTO crossblog_transients (key, value, expires_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (key) DO UPDATE \
             SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(TransientError::backend)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TransientError> {
        sqlx::query("DELETE FROM crossblog_transients WHERE key = $1")
            .bind(key)
            .execute(self.pool.as_ref())
            .await
            .map_err(TransientError::backend)?;
        Ok(())
    }
}
