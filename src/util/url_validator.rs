use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors raised when a configured feed URL fails validation.
///
/// The service fetches these URLs server-side, so validation rejects
/// targets that would turn the fetcher into an SSRF vector.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL string for use as a feed source.
///
/// Rejects non-HTTP(S) schemes, localhost, and private IP ranges
/// (RFC 1918, link-local, unique-local IPv6). Hostname-based private
/// addresses that only resolve at connect time are out of scope here.
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }

    if let Some(host) = url.host_str() {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(UrlValidationError::Localhost);
        }

        if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            // fc00::/7 unique-local, fe80::/10 link-local
            let segments = v6.segments();
            (segments[0] & 0xfe00) == 0xfc00
                || (segments[0] & 0xffc0) == 0xfe80
                || v6.is_unspecified()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_http_urls() {
        assert!(validate_feed_url("https://www.huxiu.com/rss/").is_ok());
        assert!(validate_feed_url("http://36kr.com/feed").is_ok());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            validate_feed_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_feed_url("ftp://example.com/feed"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn rejects_localhost_and_loopback() {
        assert!(matches!(
            validate_feed_url("http://localhost/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(matches!(
            validate_feed_url("http://127.0.0.1/feed"),
            Err(UrlValidationError::Localhost)
        ));
        assert!(matches!(
            validate_feed_url("http://[::1]/feed"),
            Err(UrlValidationError::Localhost)
        ));
    }

    #[test]
    fn rejects_private_ranges() {
        assert!(matches!(
            validate_feed_url("http://10.0.0.1/feed"),
            Err(UrlValidationError::PrivateIp(_))
        ));
        assert!(matches!(
            validate_feed_url("http://192.168.1.1/feed"),
            Err(UrlValidationError::PrivateIp(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            validate_feed_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
