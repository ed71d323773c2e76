use serde::Serialize;
use std::time::Duration;

use super::fetcher::fetch_raw;
use super::parser::{now_iso, parse_items};
use super::rss2json::fetch_via_third_party;
use crate::config::{Config, SourceConfig, StaticItem};
use crate::storage::{Database, NewsItem};

/// Aggregated result of one ingestion run.
///
/// `processed` counts items extracted from any tier before storage;
/// `saved` counts items whose upsert succeeded. Both definitions apply
/// uniformly across the direct, third-party, static and offline tiers.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Items that survived upsert across all sources and tiers.
    #[serde(rename = "count")]
    pub saved: usize,
    /// Items extracted before storage across all sources and tiers.
    pub processed: usize,
    /// One entry per source whose every tier failed; empty on a clean run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Number of sources that produced items through any tier.
    #[serde(skip)]
    pub sources_ok: usize,
}

impl RunSummary {
    /// True when not a single source produced items through any tier.
    pub fn total_failure(&self) -> bool {
        self.sources_ok == 0
    }
}

/// The source orchestrator: walks every configured source through its
/// fallback tiers and upserts whatever comes out.
///
/// Sources are processed sequentially — one source's full fallback chain
/// completes before the next source begins — which trades throughput for
/// predictable log ordering. A single source's failure never aborts the
/// run, and nothing here raises past [`Ingestor::run`].
pub struct Ingestor {
    db: Database,
    client: reqwest::Client,
    sources: Vec<SourceConfig>,
    rss2json_endpoint: String,
    request_timeout: Duration,
}

impl Ingestor {
    pub fn new(db: Database, client: reqwest::Client, config: &Config) -> Self {
        Self {
            db,
            client,
            sources: config.sources.clone(),
            rss2json_endpoint: config.rss2json_endpoint.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs.max(1)),
        }
    }

    /// Run one full ingestion pass over all configured sources.
    ///
    /// Terminal outcomes per source, in priority order:
    ///
    /// 1. some direct URL yields a body that parses to ≥1 item;
    /// 2. the third-party parser yields ≥1 item;
    /// 3. the source has static placeholder items;
    /// 4. the source contributes nothing and its failure reason joins the
    ///    run's error list.
    ///
    /// If every source lands on outcome 4, a small set of generic offline
    /// placeholders is persisted so readers never see an empty feed.
    /// Repeated runs against unchanged feeds are effectively no-ops: every
    /// item re-derives the same id and the upsert overwrites in place.
    pub async fn run(&self) -> RunSummary {
        tracing::info!(sources = self.sources.len(), "Starting ingestion run");
        let mut summary = RunSummary {
            saved: 0,
            processed: 0,
            errors: Vec::new(),
            sources_ok: 0,
        };

        for source in &self.sources {
            tracing::info!(source = %source.name, "Processing source");
            match self.collect(source).await {
                Ok(items) => {
                    summary.sources_ok += 1;
                    summary.processed += items.len();
                    summary.saved += self.store_items(&items).await;
                }
                Err(reason) => {
                    tracing::error!(source = %source.name, reason = %reason, "Source failed all tiers");
                    summary.errors.push(reason);
                }
            }
        }

        if summary.total_failure() && !self.sources.is_empty() {
            tracing::warn!("All sources failed, saving offline placeholder items");
            let placeholders = offline_placeholders();
            summary.processed += placeholders.len();
            summary.saved += self.store_items(&placeholders).await;
        }

        // Housekeeping: drop expired cache rows while we are here anyway
        match self.db.cache_evict_expired().await {
            Ok(0) => {}
            Ok(evicted) => tracing::debug!(evicted = evicted, "Evicted expired cache entries"),
            Err(e) => tracing::warn!(error = %e, "Cache eviction failed"),
        }

        tracing::info!(
            saved = summary.saved,
            processed = summary.processed,
            errors = summary.errors.len(),
            "Ingestion run completed"
        );
        summary
    }

    /// Walk one source's fallback tiers until some tier yields items.
    ///
    /// A body that parses to zero items is treated like a fetch failure
    /// and falls through to the next tier.
    async fn collect(&self, source: &SourceConfig) -> Result<Vec<NewsItem>, String> {
        let urls = source.candidate_urls();
        let mut reasons: Vec<String>;

        match fetch_raw(&self.client, &urls, self.request_timeout).await {
            Ok(fetched) => {
                let items = parse_items(&fetched.body, &source.name);
                if !items.is_empty() {
                    tracing::info!(
                        source = %source.name,
                        url = %fetched.url,
                        count = items.len(),
                        "Parsed items from direct fetch"
                    );
                    return Ok(items);
                }
                tracing::warn!(
                    source = %source.name,
                    url = %fetched.url,
                    "Fetched body parsed to zero items, falling back"
                );
                reasons = vec![format!("no items parsed from {}", fetched.url)];
            }
            Err(all_failed) => {
                reasons = all_failed.reasons;
            }
        }

        if !source.url.is_empty() {
            if let Some(items) = fetch_via_third_party(
                &self.client,
                &self.rss2json_endpoint,
                &source.url,
                &source.name,
            )
            .await
            {
                if !items.is_empty() {
                    tracing::info!(
                        source = %source.name,
                        count = items.len(),
                        "Got items from third-party parser"
                    );
                    return Ok(items);
                }
                reasons.push("third-party parser returned zero items".to_string());
            } else {
                reasons.push("third-party parser unavailable".to_string());
            }
        }

        if !source.static_items.is_empty() {
            tracing::warn!(source = %source.name, "Using static fallback content");
            return Ok(source
                .static_items
                .iter()
                .map(|item| static_to_news_item(item, &source.name))
                .collect());
        }

        Err(format!(
            "All fallback tiers failed for {}: {}",
            source.name,
            reasons.join("; ")
        ))
    }

    /// Upsert every item individually; a failed upsert is logged and
    /// skipped, never fatal to the run. Returns the number saved.
    async fn store_items(&self, items: &[NewsItem]) -> usize {
        let mut saved = 0;
        for item in items {
            match self.db.upsert_article(item).await {
                Ok(()) => saved += 1,
                Err(e) => {
                    tracing::error!(id = %item.id, error = %e, "Failed to save article, skipping");
                }
            }
        }
        saved
    }
}

fn static_to_news_item(item: &StaticItem, source_name: &str) -> NewsItem {
    NewsItem {
        id: item.id.clone(),
        title: item.title.clone(),
        description: item.description.clone(),
        content: item.content.clone(),
        link: item.link.clone(),
        pub_date: now_iso(),
        source: source_name.to_string(),
    }
}

/// Generic placeholder items persisted when the entire run comes up
/// empty, so the reader UI always has something to show.
fn offline_placeholders() -> Vec<NewsItem> {
    let now = now_iso();
    vec![
        NewsItem {
            id: "fallback-1".to_string(),
            title: "无法获取最新内容 - 请稍后再试".to_string(),
            description: "当前无法连接到 RSS 源，这是一条占位内容。我们正在尝试恢复连接，请稍后刷新页面。"
                .to_string(),
            content: "当前无法连接到 RSS 源，这是一条占位内容。我们正在尝试恢复连接，请稍后刷新页面。"
                .to_string(),
            link: "#".to_string(),
            pub_date: now.clone(),
            source: "系统消息".to_string(),
        },
        NewsItem {
            id: "fallback-2".to_string(),
            title: "网络连接问题".to_string(),
            description: "可能是由于网络连接问题导致无法获取最新内容。您可以检查网络连接或稍后再试。"
                .to_string(),
            content: "可能是由于网络连接问题导致无法获取最新内容。您可以检查网络连接或稍后再试。"
                .to_string(),
            link: "#".to_string(),
            pub_date: now,
            source: "系统消息".to_string(),
        },
    ]
}
