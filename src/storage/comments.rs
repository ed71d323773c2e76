use anyhow::Result;
use chrono::{SecondsFormat, Utc};

use super::articles::sanitize_lookup_id;
use super::highlights::derive_id;
use super::schema::Database;
use super::types::{Comment, CommentRow};

impl Database {
    // ========================================================================
    // Comment Operations
    // ========================================================================

    /// Save a reader comment, returning the stored row.
    ///
    /// Unlike article upserts, a failed comment save propagates to the
    /// caller — the user is waiting on the result and should see the
    /// failure rather than a silent drop.
    pub async fn save_comment(
        &self,
        article_id: &str,
        content: &str,
        user_name: &str,
        user_id: Option<&str>,
    ) -> Result<Option<Comment>> {
        let Some(safe_article_id) = sanitize_lookup_id(article_id) else {
            tracing::warn!(article_id = %article_id, "Invalid article id for comment");
            return Ok(None);
        };

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let id = derive_id("cmt", &safe_article_id, content, &created_at);

        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (id, article_id, content, user_id, user_name, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, article_id, content, user_id, user_name, created_at,
                      NULL AS article_title
        "#,
        )
        .bind(&id)
        .bind(&safe_article_id)
        .bind(content)
        .bind(user_id)
        .bind(user_name)
        .bind(&created_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(id = %row.id, article_id = %safe_article_id, "Comment saved");
        Ok(Some(row.into_comment()))
    }

    /// All comments for one article, newest first.
    pub async fn comments_for_article(&self, article_id: &str) -> Result<Vec<Comment>> {
        let Some(safe_article_id) = sanitize_lookup_id(article_id) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, article_id, content, user_id, user_name, created_at,
                   NULL AS article_title
            FROM comments
            WHERE article_id = ?
            ORDER BY created_at DESC
        "#,
        )
        .bind(&safe_article_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CommentRow::into_comment).collect())
    }

    /// The user's most recent comments across all articles, joined with
    /// the article title for display. Articles that have since disappeared
    /// show a placeholder title.
    pub async fn recent_comments(&self, limit: i64) -> Result<Vec<Comment>> {
        let limit = limit.clamp(1, 100);
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.article_id, c.content, c.user_id, c.user_name, c.created_at,
                   a.title AS article_title
            FROM comments c
            LEFT JOIN articles a ON c.article_id = a.id
            ORDER BY c.created_at DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut comment = row.into_comment();
                if comment.article_title.is_none() {
                    comment.article_title = Some("未知文章".to_string());
                }
                comment
            })
            .collect())
    }
}
