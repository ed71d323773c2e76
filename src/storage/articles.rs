use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::schema::Database;
use super::types::{Article, ArticlePage, ArticleRow, NewsItem};
use crate::ingest::extract::generate_safe_id;
use crate::util::text::truncate_chars;

// ============================================================================
// Field Limits
// ============================================================================

const MAX_ID_LEN: usize = 250;
const MAX_TITLE_LEN: usize = 500;
const MAX_DESCRIPTION_LEN: usize = 5000;
const MAX_CONTENT_LEN: usize = 100_000;
const MAX_LINK_LEN: usize = 2000;
const MAX_SOURCE_LEN: usize = 100;

/// Maximum number of rows any listing query returns (OOM protection)
const MAX_PAGE_SIZE: i64 = 100;
const MAX_SEARCH_RESULTS: i64 = 100;

static VALID_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());
static ID_SANITIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_-]").unwrap());

/// Clamp every field of an incoming item to its column budget and repair
/// anything the feed got wrong: empty link becomes `"#"`, an unparsable
/// pub date becomes the ingestion time, and an id that is missing,
/// over-long, or contains unsafe characters is regenerated from the
/// deterministic hash.
fn sanitize_item(item: &NewsItem) -> NewsItem {
    let title = if item.title.is_empty() {
        "无标题".to_string()
    } else {
        truncate_chars(&item.title, MAX_TITLE_LEN)
    };
    let link = if item.link.is_empty() {
        "#".to_string()
    } else {
        truncate_chars(&item.link, MAX_LINK_LEN)
    };
    let source = if item.source.is_empty() {
        "未知来源".to_string()
    } else {
        truncate_chars(&item.source, MAX_SOURCE_LEN)
    };

    let mut id = item.id.clone();
    if id.is_empty() || id.chars().count() > MAX_ID_LEN || !VALID_ID_RE.is_match(&id) {
        id = generate_safe_id(&source, &link, &title);
    }

    NewsItem {
        id,
        title,
        description: truncate_chars(&item.description, MAX_DESCRIPTION_LEN),
        content: truncate_chars(&item.content, MAX_CONTENT_LEN),
        link,
        pub_date: normalize_pub_date(&item.pub_date),
        source,
    }
}

/// Normalize a feed timestamp to RFC 3339 UTC (millisecond precision, `Z`
/// suffix) so that lexicographic ordering on the column matches
/// chronological ordering. Missing or unparsable values default to now.
fn normalize_pub_date(raw: &str) -> String {
    parse_feed_date(raw)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts the two formats feeds actually use: RFC 3339 (Atom) and
/// RFC 2822 (RSS 2.0 `pubDate`).
pub(crate) fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Database {
    // ========================================================================
    // Article Mutations
    // ========================================================================

    /// Insert-or-update an article keyed by its deterministic id.
    ///
    /// Re-ingesting an unchanged feed entry overwrites the row in place —
    /// no duplicates, and `created_at` keeps the first-seen timestamp.
    /// Callers in the ingestion pipeline log and skip on failure; this
    /// function itself never panics.
    pub async fn upsert_article(&self, item: &NewsItem) -> Result<()> {
        let safe = sanitize_item(item);

        sqlx::query(
            r#"
            INSERT INTO articles (id, title, description, content, link, pub_date, source)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                content = excluded.content,
                link = excluded.link,
                pub_date = excluded.pub_date,
                source = excluded.source
        "#,
        )
        .bind(&safe.id)
        .bind(&safe.title)
        .bind(&safe.description)
        .bind(&safe.content)
        .bind(&safe.link)
        .bind(&safe.pub_date)
        .bind(&safe.source)
        .execute(&self.pool)
        .await?;

        tracing::debug!(id = %safe.id, source = %safe.source, "Article upserted");
        Ok(())
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Fetch one article with its highlights and comments (both newest
    /// first). Returns `None` for unknown or malformed ids.
    pub async fn get_article_by_id(&self, id: &str) -> Result<Option<Article>> {
        let Some(safe_id) = sanitize_lookup_id(id) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, title, description, content, link, pub_date, source
            FROM articles
            WHERE id = ?
        "#,
        )
        .bind(&safe_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            tracing::debug!(id = %safe_id, "Article not found");
            return Ok(None);
        };

        let highlights = self.highlights_for_article(&safe_id).await?;
        let comments = self.comments_for_article(&safe_id).await?;

        Ok(Some(Article {
            item: row.into_item(),
            highlights,
            comments,
        }))
    }

    /// Latest articles by publication date, for the front-page feed.
    pub async fn get_latest_articles(&self, limit: i64) -> Result<Vec<NewsItem>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, title, description, content, link, pub_date, source
            FROM articles
            ORDER BY pub_date DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleRow::into_item).collect())
    }

    /// One page of the article listing, newest first, with the total count
    /// so the caller can render pagination controls.
    pub async fn get_articles_page(&self, page: i64, page_size: i64) -> Result<ArticlePage> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1) * page_size;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, title, description, content, link, pub_date, source
            FROM articles
            ORDER BY pub_date DESC
            LIMIT ? OFFSET ?
        "#,
        )
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<NewsItem> = rows.into_iter().map(ArticleRow::into_item).collect();
        let has_more = offset + (items.len() as i64) < total;

        Ok(ArticlePage {
            items,
            total,
            has_more,
        })
    }

    /// Substring search over title and description, newest first.
    ///
    /// The query is escaped for `LIKE`, so `%`, `_` and `\` in user input
    /// match literally. Empty queries return an empty list.
    pub async fn search_articles(&self, query: &str) -> Result<Vec<NewsItem>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{}%", escaped);

        let rows = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, title, description, content, link, pub_date, source
            FROM articles
            WHERE title LIKE ? ESCAPE '\' OR description LIKE ? ESCAPE '\'
            ORDER BY pub_date DESC
            LIMIT ?
        "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(MAX_SEARCH_RESULTS)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ArticleRow::into_item).collect())
    }
}

/// Strip anything outside `[\w-]` from a caller-supplied article id. A
/// lookup id that changes under sanitization was never produced by the
/// pipeline; if nothing survives, the lookup is rejected outright.
pub(crate) fn sanitize_lookup_id(id: &str) -> Option<String> {
    if id.is_empty() || id.chars().count() > MAX_ID_LEN {
        tracing::warn!(len = id.chars().count(), "Rejecting invalid article id");
        return None;
    }

    let safe = ID_SANITIZE_RE.replace_all(id, "").to_string();
    if safe != id {
        tracing::warn!(original = %id, sanitized = %safe, "Article id was sanitized");
    }
    if safe.is_empty() {
        return None;
    }
    Some(safe)
}
