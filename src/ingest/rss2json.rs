use serde::Deserialize;
use url::Url;

use super::extract::{clean_html, generate_safe_id};
use super::parser::now_iso;
use crate::storage::NewsItem;

/// Public feed-to-JSON conversion service used as the second fallback
/// tier when every direct feed URL fails.
pub const DEFAULT_ENDPOINT: &str = "https://api.rss2json.com/v1/api.json";

const USER_AGENT: &str = "Mozilla/5.0 (compatible; RSS Reader/1.0)";

/// Wire shape of the conversion service's response. Only the fields the
/// pipeline consumes are modeled; everything else is ignored.
#[derive(Debug, Deserialize)]
struct ConversionResponse {
    status: String,
    #[serde(default)]
    items: Vec<ConversionItem>,
}

#[derive(Debug, Deserialize)]
struct ConversionItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    content: String,
    #[serde(default, rename = "pubDate")]
    pub_date: String,
}

/// Delegate feed retrieval and parsing to the external conversion
/// service, re-normalizing its output into the pipeline's item shape.
///
/// This tier is explicitly best-effort: transport failures, non-success
/// responses, and a service-reported non-ok status all yield `None`, not
/// an error. Successful items go through the same sanitizer and ID
/// generator as the native parser, so downstream code cannot tell the
/// ingestion paths apart.
pub async fn fetch_via_third_party(
    client: &reqwest::Client,
    endpoint: &str,
    feed_url: &str,
    source_name: &str,
) -> Option<Vec<NewsItem>> {
    tracing::info!(source = %source_name, "Trying third-party feed parser");

    let api_url = match Url::parse_with_params(endpoint, &[("rss_url", feed_url)]) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(endpoint = %endpoint, error = %e, "Invalid third-party endpoint");
            return None;
        }
    };

    let response = match client
        .get(api_url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(source = %source_name, error = %e, "Third-party request failed");
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::warn!(
            source = %source_name,
            status = response.status().as_u16(),
            "Third-party parser returned non-success status"
        );
        return None;
    }

    let parsed: ConversionResponse = match response.json().await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(source = %source_name, error = %e, "Unparsable third-party response");
            return None;
        }
    };

    if parsed.status != "ok" {
        tracing::warn!(source = %source_name, status = %parsed.status, "Third-party parser reported failure");
        return None;
    }

    let items = parsed
        .items
        .into_iter()
        .map(|item| NewsItem {
            id: generate_safe_id(source_name, &item.link, &item.title),
            title: item.title,
            description: clean_html(&item.description),
            content: item.content,
            link: item.link,
            pub_date: if item.pub_date.is_empty() {
                now_iso()
            } else {
                item.pub_date
            },
            source: source_name.to_string(),
        })
        .collect();

    Some(items)
}
