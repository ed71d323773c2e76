//! Configuration file parser for gazette.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`,
//! which carries the built-in source list. Unknown keys are accepted by
//! serde but logged as potential typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::util::validate_feed_url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified; missing keys fall back to `Default::default()`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub bind_addr: String,

    /// Path of the SQLite database file.
    pub database_path: String,

    /// Minutes between scheduled ingestion runs. 0 = manual refresh only.
    pub refresh_interval_minutes: u64,

    /// Per-request timeout for feed fetches, in seconds.
    pub request_timeout_secs: u64,

    /// Base delay before retrying a failed ingestion run, in seconds.
    /// The actual delay grows linearly with the attempt number.
    pub retry_base_delay_secs: u64,

    /// Maximum retry attempts after a failed run before waiting for the
    /// next scheduled tick.
    pub retry_max_attempts: u32,

    /// Feed-to-JSON conversion endpoint used as the third-party fallback.
    pub rss2json_endpoint: String,

    /// The feeds to ingest. Defaults to the built-in source list.
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            database_path: "gazette.db".to_string(),
            refresh_interval_minutes: 30,
            request_timeout_secs: 15,
            retry_base_delay_secs: 60,
            retry_max_attempts: 3,
            rss2json_endpoint: crate::ingest::rss2json::DEFAULT_ENDPOINT.to_string(),
            sources: default_sources(),
        }
    }
}

/// One feed source: a primary URL, an ordered list of fallbacks, and
/// optionally hand-authored static items used as the last resort when
/// every network tier fails.
#[derive(Clone, Debug, Deserialize)]
pub struct SourceConfig {
    /// Human-readable feed name (not a URL); becomes `NewsItem::source`.
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub fallback_url: String,
    #[serde(default)]
    pub alternate_urls: Vec<String>,
    #[serde(default)]
    pub static_items: Vec<StaticItem>,
}

impl SourceConfig {
    /// All URLs to try, strictly in order: primary, declared fallback,
    /// then any additional alternates. Empty slots are filtered out.
    pub fn candidate_urls(&self) -> Vec<&str> {
        std::iter::once(self.url.as_str())
            .chain(std::iter::once(self.fallback_url.as_str()))
            .chain(self.alternate_urls.iter().map(String::as_str))
            .filter(|u| !u.is_empty())
            .collect()
    }
}

/// Hand-authored placeholder article attached to a source.
#[derive(Clone, Debug, Deserialize)]
pub struct StaticItem {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub content: String,
    pub link: String,
}

/// The source list of the original deployment, used when no config file
/// overrides it.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "虎嗅".to_string(),
            url: "https://www.huxiu.com/rss/".to_string(),
            fallback_url: "https://rsshub.app/huxiu/article".to_string(),
            alternate_urls: vec![
                "https://feedx.net/rss/huxiu.xml".to_string(),
                "https://rsshub.app/huxiu/tag/103".to_string(),
                "https://rsshub.app/huxiu/collection/38".to_string(),
            ],
            static_items: vec![
                StaticItem {
                    id: "huxiu_fallback_1".to_string(),
                    title: "科技创新如何改变我们的生活".to_string(),
                    description: "探讨最新科技趋势对日常生活的影响".to_string(),
                    content: "随着人工智能、区块链和物联网等技术的发展，我们的生活方式正在发生翻天覆地的变化...".to_string(),
                    link: "https://www.huxiu.com".to_string(),
                },
                StaticItem {
                    id: "huxiu_fallback_2".to_string(),
                    title: "数字经济时代的商业变革".to_string(),
                    description: "分析数字化转型对企业发展的重要性".to_string(),
                    content: "在数字经济时代，企业必须适应新的商业模式和运营方式...".to_string(),
                    link: "https://www.huxiu.com".to_string(),
                },
            ],
        },
        SourceConfig {
            name: "36氪".to_string(),
            url: "https://36kr.com/feed".to_string(),
            fallback_url: "https://rsshub.app/36kr/news/latest".to_string(),
            alternate_urls: vec!["https://feedx.net/rss/36kr.xml".to_string()],
            static_items: Vec::new(),
        },
    ]
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to flag likely typos
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "bind_addr",
                "database_path",
                "refresh_interval_minutes",
                "request_timeout_secs",
                "retry_base_delay_secs",
                "retry_max_attempts",
                "rss2json_endpoint",
                "sources",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown config key (possible typo)");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;
        config.drop_invalid_source_urls();
        Ok(config)
    }

    /// Validate every configured source URL and silently drop the ones
    /// that fail (with a warning). Sources left with no usable URL but
    /// carrying static items are kept — their static tier still works.
    fn drop_invalid_source_urls(&mut self) {
        for source in &mut self.sources {
            let name = source.name.clone();
            let mut keep = |url: &String| -> bool {
                if url.is_empty() {
                    return false;
                }
                match validate_feed_url(url) {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(source = %name, url = %url, error = %e, "Dropping invalid source URL");
                        false
                    }
                }
            };

            if !keep(&source.url) {
                source.url = String::new();
            }
            if !keep(&source.fallback_url) {
                source.fallback_url = String::new();
            }
            source.alternate_urls.retain(&mut keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_temp_config(content: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "gazette-config-test-{}-{}.toml",
            std::process::id(),
            content.len()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/gazette.toml")).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].name, "虎嗅");
        assert!(!config.sources[0].static_items.is_empty());
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let path = write_temp_config("refresh_interval_minutes = 5\n");
        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.refresh_interval_minutes, 5);
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn custom_sources_replace_defaults() {
        let path = write_temp_config(
            r#"
[[sources]]
name = "Example"
url = "https://example.com/feed.xml"
"#,
        );
        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].name, "Example");
        assert_eq!(
            config.sources[0].candidate_urls(),
            vec!["https://example.com/feed.xml"]
        );
    }

    #[test]
    fn invalid_source_urls_are_dropped() {
        let path = write_temp_config(
            r#"
[[sources]]
name = "Sneaky"
url = "file:///etc/passwd"
fallback_url = "https://example.com/ok.xml"
alternate_urls = ["http://127.0.0.1/feed", "https://example.com/alt.xml"]
"#,
        );
        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            config.sources[0].candidate_urls(),
            vec!["https://example.com/ok.xml", "https://example.com/alt.xml"]
        );
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let path = write_temp_config("not [valid toml");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn candidate_urls_preserve_order() {
        let source = SourceConfig {
            name: "S".to_string(),
            url: "https://a".to_string(),
            fallback_url: "https://b".to_string(),
            alternate_urls: vec!["https://c".to_string(), "https://d".to_string()],
            static_items: Vec::new(),
        };
        assert_eq!(
            source.candidate_urls(),
            vec!["https://a", "https://b", "https://c", "https://d"]
        );
    }
}
