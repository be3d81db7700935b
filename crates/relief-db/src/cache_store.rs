//! Persisted key/value rows behind the TTL cache.
//!
//! This layer stores and returns rows verbatim. Expiry is judged by the
//! caller against its own clock; an expired row is still returned by
//! [`CacheStore::get`] until it is overwritten or swept.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::DbError;

/// One row of the `cache` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CacheEntry {
    /// Canonical key of the memoized query.
    pub key: String,
    /// Memoized payload.
    pub value: serde_json::Value,
    /// Instant after which the entry is stale.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the entry may still be served at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Operations on the `cache` table.
pub struct CacheStore<'a> {
    pool: &'a PgPool,
}

impl<'a> CacheStore<'a> {
    /// Create a new cache store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Read the row for `key`, expired or not.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, DbError> {
        let entry = sqlx::query_as::<_, CacheEntry>(
            "SELECT key, value, expires_at FROM cache WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(self.pool)
        .await?;
        Ok(entry)
    }

    /// Insert or fully replace the row for `entry.key`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the upsert fails.
    pub async fn upsert(&self, entry: &CacheEntry) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO cache (key, value, expires_at)
              VALUES ($1, $2, $3)
              ON CONFLICT (key) DO UPDATE
              SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(&entry.key)
        .bind(&entry.value)
        .bind(entry.expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Delete every row whose key starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM cache WHERE starts_with(key, $1)")
            .bind(prefix)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every row that is expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the delete fails.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM cache WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
