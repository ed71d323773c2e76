use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use super::articles::sanitize_lookup_id;
use super::schema::Database;
use super::types::{Highlight, HighlightRow};

impl Database {
    // ========================================================================
    // Highlight Operations
    // ========================================================================

    /// Save a text selection on an article, returning the stored row.
    ///
    /// The id is synthesized server-side from the article id, the selected
    /// text and the creation instant, so two identical selections made at
    /// different times remain distinct rows.
    pub async fn save_highlight(
        &self,
        article_id: &str,
        text: &str,
        comment: Option<&str>,
    ) -> Result<Option<Highlight>> {
        let Some(safe_article_id) = sanitize_lookup_id(article_id) else {
            tracing::warn!(article_id = %article_id, "Invalid article id for highlight");
            return Ok(None);
        };

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let id = derive_id("hl", &safe_article_id, text, &created_at);

        let row = sqlx::query_as::<_, HighlightRow>(
            r#"
            INSERT INTO highlights (id, article_id, text, comment, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, article_id, text, comment, created_at
        "#,
        )
        .bind(&id)
        .bind(&safe_article_id)
        .bind(text)
        .bind(comment)
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = %row.id, article_id = %safe_article_id, "Highlight saved");
        Ok(Some(row.into_highlight()))
    }

    /// All highlights for one article, newest first.
    pub async fn highlights_for_article(&self, article_id: &str) -> Result<Vec<Highlight>> {
        let Some(safe_article_id) = sanitize_lookup_id(article_id) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query_as::<_, HighlightRow>(
            r#"
            SELECT id, article_id, text, comment, created_at
            FROM highlights
            WHERE article_id = ?
            ORDER BY created_at DESC
        "#,
        )
        .bind(&safe_article_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(HighlightRow::into_highlight).collect())
    }
}

/// `<prefix>_<sha256 hex>` over the identifying parts; 68 chars, well
/// inside the id budget shared with article ids.
pub(crate) fn derive_id(prefix: &str, article_id: &str, body: &str, created_at: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(article_id.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(body.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(created_at.as_bytes());
    let digest = hasher.finalize();
    format!("{}_{:x}", prefix, digest)
}
