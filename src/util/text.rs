use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap());
static STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style\b.*?</style>").unwrap());
static IFRAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<iframe\b.*?</iframe>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Strict HTML-to-text cleanup used when serving article content for display.
///
/// Unlike the lenient variant in the ingestion path, this one removes the
/// *content* of `<script>`, `<style>` and `<iframe>` blocks (not just the
/// tags), and collapses runs of whitespace into single spaces.
///
/// Never fails; empty input yields an empty string.
pub fn clean_html_strict(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let without_scripts = SCRIPT_RE.replace_all(input, "");
    let without_styles = STYLE_RE.replace_all(&without_scripts, "");
    let without_iframes = IFRAME_RE.replace_all(&without_styles, "");
    let without_tags = TAG_RE.replace_all(&without_iframes, "");

    let unescaped = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    WS_RE.replace_all(&unescaped, " ").trim().to_string()
}

/// Truncates a string to at most `max` characters, respecting char
/// boundaries. Returns the input unchanged when it already fits.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_script_content() {
        let html = "before<script>alert('x')</script>after";
        assert_eq!(clean_html_strict(html), "beforeafter");
    }

    #[test]
    fn strips_style_and_iframe_blocks() {
        let html = "<style>.a{color:red}</style>text<iframe src=\"x\">inner</iframe>";
        assert_eq!(clean_html_strict(html), "text");
    }

    #[test]
    fn unescapes_entities_and_collapses_whitespace() {
        let html = "<p>a &amp; b</p>\n\n  <p>&quot;c&quot;</p>";
        assert_eq!(clean_html_strict(html), "a & b \"c\"");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean_html_strict("hello world"), "hello world");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("虎嗅网文章", 2), "虎嗅");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 5), "");
    }
}
