use anyhow::Result;
use serde_json::Value;

use super::schema::Database;

impl Database {
    // ========================================================================
    // Key/Value Cache Operations
    // ========================================================================

    /// Store a JSON value under `key` with an optional TTL in seconds.
    ///
    /// `None` means the entry never expires. Existing entries are
    /// replaced, TTL included.
    pub async fn cache_set(&self, key: &str, value: &Value, ttl_seconds: Option<i64>) -> Result<()> {
        let serialized = serde_json::to_string(value)?;
        let ttl_modifier = ttl_seconds.map(|secs| format!("+{} seconds", secs.max(1)));

        sqlx::query(
            r#"
            INSERT INTO cache (key, value, expires_at)
            VALUES (?, ?, datetime('now', ?))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
        "#,
        )
        .bind(key)
        .bind(&serialized)
        .bind(&ttl_modifier)
        .execute(&self.pool)
        .await?;

        tracing::debug!(key = %key, ttl_seconds = ?ttl_seconds, "Cache set");
        Ok(())
    }

    /// Retrieve a cached value if present and not expired.
    ///
    /// Unparsable stored values are treated as a miss rather than an
    /// error, matching the best-effort role of this cache.
    pub async fn cache_get(&self, key: &str) -> Result<Option<Value>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT value FROM cache
            WHERE key = ? AND (expires_at IS NULL OR expires_at > datetime('now'))
        "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some((raw,)) = row else {
            tracing::debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unparsable cache entry");
                Ok(None)
            }
        }
    }

    /// Delete all expired cache entries, returning the count evicted.
    pub async fn cache_evict_expired(&self) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM cache WHERE expires_at IS NOT NULL AND expires_at < datetime('now')")
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }
}
