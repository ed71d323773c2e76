use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::extract::{clean_html, extract_atom_link, extract_tag, generate_safe_id};
use crate::storage::NewsItem;

/// Placeholder title for feed entries that carry none.
pub const UNTITLED: &str = "无标题";
/// Placeholder description for feed entries that carry none.
pub const NO_DESCRIPTION: &str = "无描述";

static ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<item>(.*?)</item>").unwrap());
static ENTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").unwrap());

/// Scan a feed document and build a normalized [`NewsItem`] per entry.
///
/// RSS 2.0 `<item>` blocks are tried first; if the document contains
/// none, Atom `<entry>` blocks are scanned instead. Output preserves
/// document order — callers sort by publication date when they need to.
///
/// Field fallbacks per block:
///
/// | field       | RSS                              | Atom                      |
/// |-------------|----------------------------------|---------------------------|
/// | title       | `title`                          | `title`                   |
/// | link        | `link`                           | first `<link href=...>`   |
/// | description | `description`, then `summary`    | `summary`, then `content` |
/// | content     | `content:encoded`, then `content`| `content`                 |
/// | date        | `pubDate`, then `dc:date`        | `published`, then `updated`|
/// | id seed     | `guid`, then `link`              | `id`, then `link`         |
///
/// Missing title/description become their placeholders; a missing date
/// becomes the ingestion time. Non-feed input yields an empty Vec —
/// this function never fails.
pub fn parse_items(xml: &str, source_name: &str) -> Vec<NewsItem> {
    let mut items: Vec<NewsItem> = ITEM_RE
        .captures_iter(xml)
        .map(|caps| parse_rss_item(&caps[1], source_name))
        .collect();

    if items.is_empty() {
        tracing::debug!(
            source = %source_name,
            "No <item> blocks found, trying Atom <entry> blocks"
        );
        items = ENTRY_RE
            .captures_iter(xml)
            .map(|caps| parse_atom_entry(&caps[1], source_name))
            .collect();
    }

    tracing::debug!(source = %source_name, count = items.len(), "Parsed feed items");
    items
}

fn parse_rss_item(block: &str, source_name: &str) -> NewsItem {
    let title = extract_tag(block, "title").unwrap_or_else(|| UNTITLED.to_string());
    let link = extract_tag(block, "link").unwrap_or_default();
    let description = extract_tag(block, "description")
        .or_else(|| extract_tag(block, "summary"))
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());
    let content = extract_tag(block, "content:encoded")
        .or_else(|| extract_tag(block, "content"))
        .unwrap_or_default();
    let pub_date = extract_tag(block, "pubDate")
        .or_else(|| extract_tag(block, "dc:date"))
        .unwrap_or_else(now_iso);
    let guid = extract_tag(block, "guid").unwrap_or_else(|| link.clone());

    let id = generate_safe_id(source_name, &guid, &title);
    tracing::trace!(id = %id, title = %title, "Parsed RSS item");

    NewsItem {
        id,
        title,
        description: clean_html(&description),
        content,
        link,
        pub_date,
        source: source_name.to_string(),
    }
}

fn parse_atom_entry(block: &str, source_name: &str) -> NewsItem {
    let title = extract_tag(block, "title").unwrap_or_else(|| UNTITLED.to_string());
    let link = extract_atom_link(block).unwrap_or_default();
    let description = extract_tag(block, "summary")
        .or_else(|| extract_tag(block, "content"))
        .unwrap_or_else(|| NO_DESCRIPTION.to_string());
    let content = extract_tag(block, "content").unwrap_or_default();
    let pub_date = extract_tag(block, "published")
        .or_else(|| extract_tag(block, "updated"))
        .unwrap_or_else(now_iso);
    let id_seed = extract_tag(block, "id").unwrap_or_else(|| link.clone());

    let id = generate_safe_id(source_name, &id_seed, &title);
    tracing::trace!(id = %id, title = %title, "Parsed Atom entry");

    NewsItem {
        id,
        title,
        description: clean_html(&description),
        content,
        link,
        pub_date,
        source: source_name.to_string(),
    }
}

pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
