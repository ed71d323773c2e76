//! HTTP surface: thin JSON marshaling over the storage layer plus a
//! manual-refresh trigger for the ingestion pipeline.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lru::LruCache;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::ingest::{Ingestor, RunSummary};
use crate::storage::{Article, ArticlePage, Comment, Database, Highlight, NewsItem};
use crate::util::clean_html_strict;

/// TTL of the in-process cache in front of `/api/news` (5 minutes).
const NEWS_CACHE_TTL: Duration = Duration::from_secs(300);
const NEWS_CACHE_KEY: &str = "latest-news";
const NEWS_LIMIT: i64 = 20;

struct CachedNews {
    items: Vec<NewsItem>,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct AppState {
    db: Database,
    ingestor: Arc<Ingestor>,
    news_cache: Arc<Mutex<LruCache<String, CachedNews>>>,
}

pub fn create_router(db: Database, ingestor: Arc<Ingestor>) -> Router {
    let cache_capacity = NonZeroUsize::new(4).expect("nonzero capacity");
    let state = AppState {
        db,
        ingestor,
        news_cache: Arc::new(Mutex::new(LruCache::new(cache_capacity))),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news", get(get_news))
        .route("/api/articles", get(list_articles))
        .route("/api/articles/{id}", get(get_article))
        .route("/api/search", get(search))
        .route("/api/refresh", post(refresh))
        .route("/api/highlights", post(create_highlight).get(list_highlights))
        .route("/api/comments", post(create_comment).get(list_comments))
        .route("/api/comments/recent", get(recent_comments))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ============================================================================
// Error Mapping
// ============================================================================

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!(error = %e, "Internal error in API handler");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ============================================================================
// News Feed (cached read path)
// ============================================================================

/// Latest articles for the front page, served through two cache tiers:
/// a 5-minute in-process cache and the persisted key/value cache. A
/// storage failure degrades to a clearly-labeled offline item instead of
/// an error response — the reader always gets something to render.
async fn get_news(State(state): State<AppState>) -> Json<Vec<NewsItem>> {
    {
        let mut cache = state.news_cache.lock().expect("news cache lock poisoned");
        if let Some(entry) = cache.get(NEWS_CACHE_KEY) {
            if entry.expires_at > Instant::now() {
                tracing::debug!("Serving news from memory cache");
                return Json(entry.items.clone());
            }
        }
    }

    match load_latest_news(&state).await {
        Ok(items) => Json(items),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load news, serving offline fallback");
            Json(offline_news())
        }
    }
}

async fn load_latest_news(state: &AppState) -> anyhow::Result<Vec<NewsItem>> {
    // Second tier: persisted cache survives process restarts
    if let Some(value) = state.db.cache_get(NEWS_CACHE_KEY).await? {
        if let Ok(items) = serde_json::from_value::<Vec<NewsItem>>(value) {
            tracing::debug!("Serving news from persisted cache");
            remember_news(state, &items);
            return Ok(items);
        }
    }

    let items = state.db.get_latest_articles(NEWS_LIMIT).await?;
    tracing::info!(count = items.len(), "Loaded latest articles from database");

    remember_news(state, &items);
    if let Err(e) = state
        .db
        .cache_set(
            NEWS_CACHE_KEY,
            &serde_json::to_value(&items)?,
            Some(NEWS_CACHE_TTL.as_secs() as i64),
        )
        .await
    {
        tracing::warn!(error = %e, "Failed to update persisted news cache");
    }

    Ok(items)
}

fn remember_news(state: &AppState, items: &[NewsItem]) {
    let mut cache = state.news_cache.lock().expect("news cache lock poisoned");
    cache.put(
        NEWS_CACHE_KEY.to_string(),
        CachedNews {
            items: items.to_vec(),
            expires_at: Instant::now() + NEWS_CACHE_TTL,
        },
    );
}

fn offline_news() -> Vec<NewsItem> {
    vec![NewsItem {
        id: "offline-1".to_string(),
        title: "离线模式 - 无法连接到服务器".to_string(),
        description: "您当前处于离线模式，无法获取最新内容。请检查网络连接并刷新页面。".to_string(),
        content: String::new(),
        link: "#".to_string(),
        pub_date: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        source: "系统消息".to_string(),
    }]
}

// ============================================================================
// Articles
// ============================================================================

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
struct PageParams {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_page_size", rename = "pageSize")]
    page_size: i64,
}

async fn list_articles(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<ArticlePage>, ApiError> {
    let page = state
        .db
        .get_articles_page(params.page, params.page_size)
        .await?;
    Ok(Json(page))
}

async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Article>, ApiError> {
    let mut article = state
        .db
        .get_article_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("article not found"))?;

    // Raw feed content may embed scripts; serve it as clean text
    if !article.item.content.is_empty() {
        article.item.content = clean_html_strict(&article.item.content);
    }

    Ok(Json(article))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<NewsItem>>, ApiError> {
    let items = state.db.search_articles(&params.q).await?;
    Ok(Json(items))
}

// ============================================================================
// Refresh
// ============================================================================

/// Run the ingestion pipeline now. Safe to race with the scheduled run:
/// upserts are idempotent by id, so overlapping runs converge.
async fn refresh(State(state): State<AppState>) -> Json<RunSummary> {
    let summary = state.ingestor.run().await;
    Json(summary)
}

// ============================================================================
// Highlights
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewHighlight {
    article_id: String,
    text: String,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleQuery {
    article_id: String,
}

async fn create_highlight(
    State(state): State<AppState>,
    Json(body): Json<NewHighlight>,
) -> Result<(StatusCode, Json<Highlight>), ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }
    ensure_article_exists(&state, &body.article_id).await?;

    let highlight = state
        .db
        .save_highlight(&body.article_id, &body.text, body.comment.as_deref())
        .await?
        .ok_or_else(|| ApiError::bad_request("invalid article id"))?;

    Ok((StatusCode::CREATED, Json(highlight)))
}

async fn list_highlights(
    State(state): State<AppState>,
    Query(params): Query<ArticleQuery>,
) -> Result<Json<Vec<Highlight>>, ApiError> {
    let highlights = state.db.highlights_for_article(&params.article_id).await?;
    Ok(Json(highlights))
}

// ============================================================================
// Comments
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewComment {
    article_id: String,
    content: String,
    user_name: String,
    #[serde(default)]
    user_id: Option<String>,
}

async fn create_comment(
    State(state): State<AppState>,
    Json(body): Json<NewComment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::bad_request("content is required"));
    }
    if body.user_name.trim().is_empty() {
        return Err(ApiError::bad_request("userName is required"));
    }
    ensure_article_exists(&state, &body.article_id).await?;

    let comment = state
        .db
        .save_comment(
            &body.article_id,
            &body.content,
            &body.user_name,
            body.user_id.as_deref(),
        )
        .await?
        .ok_or_else(|| ApiError::bad_request("invalid article id"))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

async fn list_comments(
    State(state): State<AppState>,
    Query(params): Query<ArticleQuery>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = state.db.comments_for_article(&params.article_id).await?;
    Ok(Json(comments))
}

#[derive(Debug, Deserialize)]
struct LimitParams {
    #[serde(default = "default_comment_limit")]
    limit: i64,
}

fn default_comment_limit() -> i64 {
    20
}

async fn recent_comments(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = state.db.recent_comments(params.limit).await?;
    Ok(Json(comments))
}

async fn ensure_article_exists(state: &AppState, article_id: &str) -> Result<(), ApiError> {
    let exists = state
        .db
        .get_article_by_id(article_id)
        .await?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(ApiError::not_found("article not found"))
    }
}
