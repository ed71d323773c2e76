use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Maximum accepted feed body size (10MB)
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Browser-like User-Agent — several of the configured feeds refuse
/// requests that identify as a bot.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const ACCEPT: &str =
    "application/rss+xml, application/xml, text/xml, application/atom+xml, text/html";

/// Failure of a single URL attempt.
///
/// Every variant advances the fallback ladder to the next URL; none of
/// them is surfaced to the end user individually.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Network-level error (DNS, connection, TLS, body read)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    /// Request exceeded the per-attempt deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the size limit
    #[error("response larger than {MAX_BODY_SIZE} bytes")]
    ResponseTooLarge,
}

/// Every URL in the fallback list failed; carries one reason per attempt
/// for the run's diagnostics.
#[derive(Debug, Error)]
#[error("all URLs failed: {}", .reasons.join("; "))]
pub struct AllFailed {
    pub reasons: Vec<String>,
}

/// A successfully fetched feed body, tagged with the URL that produced it.
#[derive(Debug)]
pub struct FetchedBody {
    pub body: String,
    pub url: String,
}

/// Try each URL strictly in order until one yields an HTTP success with a
/// readable body.
///
/// Each attempt is bounded by `timeout` (the in-flight request is
/// abandoned at the deadline) and sends browser-like `User-Agent`,
/// feed-oriented `Accept`, and `Cache-Control: no-cache` headers.
/// Non-success statuses and network/timeout errors both count as attempt
/// failures and advance to the next URL, with the reason recorded.
///
/// # Errors
///
/// [`AllFailed`] with the per-URL reasons when no URL succeeds. Nothing
/// else escapes this boundary — callers decide the next fallback tier.
pub async fn fetch_raw(
    client: &reqwest::Client,
    urls: &[&str],
    timeout: Duration,
) -> Result<FetchedBody, AllFailed> {
    let mut reasons = Vec::new();

    for url in urls {
        if url.is_empty() {
            continue;
        }

        tracing::debug!(url = %url, "Trying feed URL");
        match fetch_one(client, url, timeout).await {
            Ok(body) => {
                tracing::info!(url = %url, bytes = body.len(), "Fetched feed body");
                return Ok(FetchedBody {
                    body,
                    url: url.to_string(),
                });
            }
            Err(e) => {
                let reason = format!("{}: {}", url, e);
                tracing::warn!(url = %url, error = %e, "Feed URL attempt failed");
                reasons.push(reason);
            }
        }
    }

    if reasons.is_empty() {
        reasons.push("no URLs configured".to_string());
    }
    Err(AllFailed { reasons })
}

async fn fetch_one(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<String, AttemptError> {
    let request = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT, ACCEPT)
        .header(reqwest::header::CACHE_CONTROL, "no-cache");

    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| AttemptError::Timeout(timeout))??;

    if !response.status().is_success() {
        return Err(AttemptError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_BODY_SIZE).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read a response body through its byte stream, failing as soon as the
/// size limit is crossed instead of buffering an unbounded body.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, AttemptError> {
    // Fast path: trust Content-Length when present
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(AttemptError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(AttemptError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(AttemptError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
