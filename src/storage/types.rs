use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Schema migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// A normalized article as produced by the ingestion pipeline and stored in
/// the `articles` table.
///
/// `id` is a pure function of `(source, guid-or-link, title)` — the same
/// triple always yields the same id, which is what makes the upsert
/// idempotent across repeated ingestion runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Full article body when the feed carries one; empty otherwise.
    #[serde(default)]
    pub content: String,
    pub link: String,
    /// ISO-8601 timestamp; normalized to UTC at the storage boundary.
    pub pub_date: String,
    /// Human-readable feed name, not a URL.
    pub source: String,
}

/// A stored article assembled with its highlights and comments, as served
/// by the article-detail endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    #[serde(flatten)]
    pub item: NewsItem,
    pub highlights: Vec<Highlight>,
    pub comments: Vec<Comment>,
}

/// A saved text selection on an article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: String,
    pub article_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: String,
}

/// A reader comment on an article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub article_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub user_name: String,
    pub created_at: String,
    /// Joined article title; only present on the recent-comments listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_title: Option<String>,
}

/// One page of the article listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePage {
    pub items: Vec<NewsItem>,
    pub total: i64,
    pub has_more: bool,
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for article queries (sqlx FromRow over snake_case
/// columns), converted to [`NewsItem`] via `into_item()`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub link: String,
    pub pub_date: String,
    pub source: String,
}

impl ArticleRow {
    pub(crate) fn into_item(self) -> NewsItem {
        NewsItem {
            id: self.id,
            title: self.title,
            description: self.description.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            link: self.link,
            pub_date: self.pub_date,
            source: self.source,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HighlightRow {
    pub id: String,
    pub article_id: String,
    pub text: String,
    pub comment: Option<String>,
    pub created_at: String,
}

impl HighlightRow {
    pub(crate) fn into_highlight(self) -> Highlight {
        Highlight {
            id: self.id,
            article_id: self.article_id,
            text: self.text,
            comment: self.comment,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CommentRow {
    pub id: String,
    pub article_id: String,
    pub content: String,
    pub user_id: Option<String>,
    pub user_name: String,
    pub created_at: String,
    pub article_title: Option<String>,
}

impl CommentRow {
    pub(crate) fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            article_id: self.article_id,
            content: self.content,
            user_id: self.user_id,
            user_name: self.user_name,
            created_at: self.created_at,
            article_title: self.article_title,
        }
    }
}
