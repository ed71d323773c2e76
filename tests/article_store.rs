//! Storage-layer lifecycle tests: upsert idempotence, pagination math,
//! article assembly with highlights and comments, search, and the
//! persisted key/value cache.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use gazette::storage::{Database, NewsItem};
use pretty_assertions::assert_eq;
use serde_json::json;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn item(id_suffix: &str, title: &str, pub_date: &str) -> NewsItem {
    NewsItem {
        id: format!("article_Test_{id_suffix}"),
        title: title.to_string(),
        description: format!("description of {title}"),
        content: String::new(),
        link: format!("http://example.com/{id_suffix}"),
        pub_date: pub_date.to_string(),
        source: "Test".to_string(),
    }
}

// ============================================================================
// Upsert Tests
// ============================================================================

#[tokio::test]
async fn upsert_inserts_then_overwrites_by_id() {
    let db = test_db().await;
    let original = item("a1", "Original", "2024-01-01T00:00:00Z");
    db.upsert_article(&original).await.unwrap();

    let mut updated = original.clone();
    updated.title = "Updated".to_string();
    db.upsert_article(&updated).await.unwrap();

    let all = db.get_latest_articles(10).await.unwrap();
    assert_eq!(all.len(), 1, "same id must not create a second row");
    assert_eq!(all[0].title, "Updated");
}

#[tokio::test]
async fn upsert_normalizes_rss_dates_for_ordering() {
    let db = test_db().await;
    // RFC 2822 (RSS pubDate) and RFC 3339 (Atom) must order correctly together
    db.upsert_article(&item("old", "Old", "Mon, 01 Jan 2024 00:00:00 GMT"))
        .await
        .unwrap();
    db.upsert_article(&item("new", "New", "2024-06-01T00:00:00Z"))
        .await
        .unwrap();

    let all = db.get_latest_articles(10).await.unwrap();
    assert_eq!(all[0].title, "New");
    assert_eq!(all[1].title, "Old");
    assert_eq!(all[1].pub_date, "2024-01-01T00:00:00.000Z");
}

#[tokio::test]
async fn upsert_repairs_invalid_ids() {
    let db = test_db().await;
    let mut bad = item("x", "Bad Id", "2024-01-01T00:00:00Z");
    bad.id = "not a valid id!".to_string();
    db.upsert_article(&bad).await.unwrap();

    let all = db.get_latest_articles(10).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].id.starts_with("article_"), "id: {}", all[0].id);
}

// ============================================================================
// Pagination Tests
// ============================================================================

#[tokio::test]
async fn pagination_walks_pages_newest_first() {
    let db = test_db().await;
    for i in 1..=5 {
        db.upsert_article(&item(
            &format!("p{i}"),
            &format!("T{i}"),
            &format!("2024-01-0{i}T00:00:00Z"),
        ))
        .await
        .unwrap();
    }

    let page1 = db.get_articles_page(1, 2).await.unwrap();
    assert_eq!(page1.total, 5);
    assert!(page1.has_more);
    assert_eq!(page1.items[0].title, "T5");
    assert_eq!(page1.items[1].title, "T4");

    let page3 = db.get_articles_page(3, 2).await.unwrap();
    assert_eq!(page3.items.len(), 1);
    assert_eq!(page3.items[0].title, "T1");
    assert!(!page3.has_more);
}

#[tokio::test]
async fn pagination_clamps_out_of_range_input() {
    let db = test_db().await;
    db.upsert_article(&item("a", "A", "2024-01-01T00:00:00Z"))
        .await
        .unwrap();

    let page = db.get_articles_page(0, 0).await.unwrap();
    assert_eq!(page.items.len(), 1);

    let beyond = db.get_articles_page(99, 10).await.unwrap();
    assert!(beyond.items.is_empty());
    assert!(!beyond.has_more);
    assert_eq!(beyond.total, 1);
}

// ============================================================================
// Article Assembly Tests
// ============================================================================

#[tokio::test]
async fn article_detail_assembles_highlights_and_comments_newest_first() {
    let db = test_db().await;
    let base = item("a1", "With extras", "2024-01-01T00:00:00Z");
    db.upsert_article(&base).await.unwrap();

    let h1 = db
        .save_highlight(&base.id, "first selection", Some("note"))
        .await
        .unwrap()
        .unwrap();
    let c1 = db
        .save_comment(&base.id, "first comment", "reader", None)
        .await
        .unwrap()
        .unwrap();

    let article = db.get_article_by_id(&base.id).await.unwrap().unwrap();
    assert_eq!(article.item.title, "With extras");
    assert_eq!(article.highlights.len(), 1);
    assert_eq!(article.highlights[0].id, h1.id);
    assert_eq!(article.highlights[0].comment.as_deref(), Some("note"));
    assert_eq!(article.comments.len(), 1);
    assert_eq!(article.comments[0].id, c1.id);
    assert_eq!(article.comments[0].user_name, "reader");
}

#[tokio::test]
async fn lookup_with_malformed_id_returns_none() {
    let db = test_db().await;
    db.upsert_article(&item("a1", "A", "2024-01-01T00:00:00Z"))
        .await
        .unwrap();

    assert!(db.get_article_by_id("'; DROP TABLE articles; --").await.unwrap().is_none());
    assert!(db.get_article_by_id("").await.unwrap().is_none());
    assert!(db.get_article_by_id("article_Test_missing").await.unwrap().is_none());
    // The table survived the hostile lookup
    assert_eq!(db.get_latest_articles(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn highlights_on_unknown_article_are_rejected_by_foreign_key() {
    let db = test_db().await;
    let result = db
        .save_highlight("article_Test_ghost", "text", None)
        .await;
    assert!(result.is_err(), "foreign key must reject orphan highlights");
}

#[tokio::test]
async fn recent_comments_join_article_titles() {
    let db = test_db().await;
    let a = item("a1", "Titled Article", "2024-01-01T00:00:00Z");
    db.upsert_article(&a).await.unwrap();
    db.save_comment(&a.id, "c1", "reader", None).await.unwrap();
    // created_at has millisecond precision; keep the ordering unambiguous
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    db.save_comment(&a.id, "c2", "reader", Some("uid-1"))
        .await
        .unwrap();

    let recent = db.recent_comments(10).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].article_title.as_deref(), Some("Titled Article"));
    assert_eq!(recent[0].content, "c2");
}

// ============================================================================
// Search Tests
// ============================================================================

#[tokio::test]
async fn search_matches_title_and_description() {
    let db = test_db().await;
    db.upsert_article(&item("a1", "Rust ships generics", "2024-01-01T00:00:00Z"))
        .await
        .unwrap();
    let mut other = item("a2", "Unrelated", "2024-01-02T00:00:00Z");
    other.description = "all about rust tooling".to_string();
    db.upsert_article(&other).await.unwrap();
    db.upsert_article(&item("a3", "Nothing here", "2024-01-03T00:00:00Z"))
        .await
        .unwrap();

    let hits = db.search_articles("rust").await.unwrap();
    // LIKE is case-insensitive for ASCII in SQLite
    assert_eq!(hits.len(), 2);

    assert!(db.search_articles("").await.unwrap().is_empty());
    assert!(db.search_articles("   ").await.unwrap().is_empty());
}

#[tokio::test]
async fn search_treats_like_metacharacters_literally() {
    let db = test_db().await;
    db.upsert_article(&item("a1", "100% complete", "2024-01-01T00:00:00Z"))
        .await
        .unwrap();
    db.upsert_article(&item("a2", "100 percent", "2024-01-02T00:00:00Z"))
        .await
        .unwrap();

    let hits = db.search_articles("100%").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "100% complete");
}

// ============================================================================
// Key/Value Cache Tests
// ============================================================================

#[tokio::test]
async fn cache_set_then_get_roundtrips() {
    let db = test_db().await;
    let value = json!({"items": [1, 2, 3]});
    db.cache_set("latest-news", &value, Some(300)).await.unwrap();

    let got = db.cache_get("latest-news").await.unwrap();
    assert_eq!(got, Some(value));
}

#[tokio::test]
async fn cache_replaces_existing_entries() {
    let db = test_db().await;
    db.cache_set("k", &json!("old"), Some(300)).await.unwrap();
    db.cache_set("k", &json!("new"), Some(300)).await.unwrap();

    assert_eq!(db.cache_get("k").await.unwrap(), Some(json!("new")));
}

#[tokio::test]
async fn cache_without_ttl_never_expires() {
    let db = test_db().await;
    db.cache_set("forever", &json!(true), None).await.unwrap();

    assert_eq!(db.cache_get("forever").await.unwrap(), Some(json!(true)));
    assert_eq!(db.cache_evict_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn cache_miss_on_unknown_key() {
    let db = test_db().await;
    assert_eq!(db.cache_get("nope").await.unwrap(), None);
}
