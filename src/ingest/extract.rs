use once_cell::sync::Lazy;
use regex::Regex;

static ATOM_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<link[^>]*href=["']([^"']*)["'][^>]*>"#).unwrap());
static TAG_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Extract the inner text of the first `<tagName ...>...</tagName>`
/// occurrence in a raw XML fragment.
///
/// This is deliberately regex-based scraping, not XML parsing: it is
/// case-sensitive, ignores attributes on the opening tag, matches across
/// newlines, and returns `None` instead of failing on anything it does
/// not recognize. Self-closing and CDATA-only tags are only handled to
/// the extent the pattern naturally captures them.
pub fn extract_tag(fragment: &str, tag_name: &str) -> Option<String> {
    let escaped = regex::escape(tag_name);
    let pattern = format!("(?s)<{escaped}[^>]*>(.*?)</{escaped}>");
    let re = Regex::new(&pattern).ok()?;
    re.captures(fragment)
        .map(|caps| caps[1].trim().to_string())
}

/// Extract the `href` attribute of the first `<link ...>` element.
///
/// Atom carries links as attributes rather than text content, so the
/// generic [`extract_tag`] cannot see them.
pub fn extract_atom_link(fragment: &str) -> Option<String> {
    ATOM_LINK_RE
        .captures(fragment)
        .map(|caps| caps[1].to_string())
}

/// Lenient HTML-to-text cleanup used on extracted description fields.
///
/// Strips tag markup and unescapes the five common entities, then trims.
/// Script/style *content* survives tag stripping here — the strict
/// variant in `util::text` handles that on the display path.
pub fn clean_html(input: &str) -> String {
    TAG_STRIP_RE
        .replace_all(input, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}

/// Deterministic article id from `(source, link-or-guid, title)`.
///
/// Computes a 32-bit rolling hash (`h = (h << 5) - h + unit`, wrapped to
/// signed 32-bit on every step) over the UTF-16 code units of
/// `"{source}:{link}:{title}"`, takes the absolute value in lowercase
/// hex, and prefixes it with `article_` plus the first five characters of
/// the source name with non-word characters stripped. The result is
/// capped at 250 characters and always matches `[a-zA-Z0-9_-]+`.
///
/// The same triple always yields the same id (that is what makes storage
/// upserts idempotent); distinct triples may collide, which is tolerated.
pub fn generate_safe_id(source: &str, link_or_guid: &str, title: &str) -> String {
    let seed = format!("{}:{}:{}", source, link_or_guid, title);

    let mut hash: i32 = 0;
    for unit in seed.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    let hex = format!("{:x}", hash.unsigned_abs());

    let prefix: String = source
        .chars()
        .take(5)
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    let mut id = format!("article_{}_{}", prefix, hex);
    id.truncate(250);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    static ID_SHAPE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^article_[A-Za-z0-9_]{0,5}_[0-9a-f]+$").unwrap());

    // ------------------------------------------------------------------
    // extract_tag
    // ------------------------------------------------------------------

    #[test]
    fn extracts_first_occurrence_trimmed() {
        let xml = "<title>  Hello \n</title><title>Second</title>";
        assert_eq!(extract_tag(xml, "title").as_deref(), Some("Hello"));
    }

    #[test]
    fn ignores_attributes_on_opening_tag() {
        let xml = r#"<guid isPermaLink="false">abc-123</guid>"#;
        assert_eq!(extract_tag(xml, "guid").as_deref(), Some("abc-123"));
    }

    #[test]
    fn matches_across_newlines() {
        let xml = "<description>line one\nline two</description>";
        assert_eq!(
            extract_tag(xml, "description").as_deref(),
            Some("line one\nline two")
        );
    }

    #[test]
    fn is_case_sensitive() {
        let xml = "<PubDate>2024</PubDate>";
        assert_eq!(extract_tag(xml, "pubDate"), None);
    }

    #[test]
    fn namespaced_tags_work() {
        let xml = "<content:encoded><![CDATA[body]]></content:encoded>";
        assert_eq!(
            extract_tag(xml, "content:encoded").as_deref(),
            Some("<![CDATA[body]]>")
        );
    }

    #[test]
    fn absent_tag_returns_none() {
        assert_eq!(extract_tag("<item></item>", "title"), None);
        assert_eq!(extract_tag("", "title"), None);
    }

    // ------------------------------------------------------------------
    // extract_atom_link
    // ------------------------------------------------------------------

    #[test]
    fn atom_link_from_href_attribute() {
        let xml = r#"<link rel="alternate" href="http://example.com/post/1" type="text/html"/>"#;
        assert_eq!(
            extract_atom_link(xml).as_deref(),
            Some("http://example.com/post/1")
        );
    }

    #[test]
    fn atom_link_single_quotes() {
        let xml = "<link href='http://example.com/2'/>";
        assert_eq!(extract_atom_link(xml).as_deref(), Some("http://example.com/2"));
    }

    #[test]
    fn atom_link_absent() {
        assert_eq!(extract_atom_link("<entry><title>x</title></entry>"), None);
    }

    // ------------------------------------------------------------------
    // clean_html
    // ------------------------------------------------------------------

    #[test]
    fn clean_strips_tags_and_entities() {
        let html = "<p>A &amp; B &lt;tag&gt;</p>&nbsp;<b>bold</b>";
        assert_eq!(clean_html(html), "A & B <tag> bold");
    }

    #[test]
    fn clean_trims_result() {
        assert_eq!(clean_html("  <i>x</i>  "), "x");
    }

    #[test]
    fn clean_never_fails_on_plain_text() {
        assert_eq!(clean_html("just text"), "just text");
    }

    // ------------------------------------------------------------------
    // generate_safe_id
    // ------------------------------------------------------------------

    #[test]
    fn id_is_deterministic() {
        let a = generate_safe_id("Test", "http://x/1", "Hi");
        let b = generate_safe_id("Test", "http://x/1", "Hi");
        assert_eq!(a, b);
    }

    #[test]
    fn id_matches_expected_shape() {
        let id = generate_safe_id("Test", "http://x/1", "Hi");
        assert!(ID_SHAPE.is_match(&id), "unexpected id shape: {id}");
    }

    #[test]
    fn non_word_source_chars_are_stripped_from_prefix() {
        // CJK characters are not ASCII word characters, so the prefix is empty
        let id = generate_safe_id("虎嗅", "http://x/1", "标题");
        assert!(id.starts_with("article__"), "got: {id}");
        assert!(ID_SHAPE.is_match(&id));
    }

    #[test]
    fn changing_any_argument_changes_the_id() {
        let base = generate_safe_id("Test", "http://x/1", "Hi");
        assert_ne!(base, generate_safe_id("Test2", "http://x/1", "Hi"));
        assert_ne!(base, generate_safe_id("Test", "http://x/2", "Hi"));
        assert_ne!(base, generate_safe_id("Test", "http://x/1", "Ho"));
    }

    proptest! {
        #[test]
        fn id_shape_holds_for_arbitrary_input(
            source in ".{0,40}",
            link in ".{0,200}",
            title in ".{0,200}",
        ) {
            let id = generate_safe_id(&source, &link, &title);
            prop_assert!(ID_SHAPE.is_match(&id), "bad id: {id}");
            prop_assert!(id.len() <= 250);
        }

        #[test]
        fn id_is_pure(source in ".{0,20}", link in ".{0,50}", title in ".{0,50}") {
            prop_assert_eq!(
                generate_safe_id(&source, &link, &title),
                generate_safe_id(&source, &link, &title)
            );
        }
    }
}
