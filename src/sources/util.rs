//! Text normalization helpers shared by the source adapters.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::types::TITLE_MAX_CHARS;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Helper function to validate a URL
pub fn is_valid_url(url: &str) -> bool {
    if let Ok(parsed) = url::Url::parse(url) {
        parsed.scheme() == "http" || parsed.scheme() == "https"
    } else {
        false
    }
}

/// Strip markup from a freeform text field: tags removed, HTML entities
/// decoded, whitespace collapsed.
pub fn strip_html(text: &str) -> String {
    let without_tags = TAG_RE.replace_all(text, " ");

    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&ndash;", "\u{2013}")
        .replace("&mdash;", "\u{2014}")
        .replace("&rsquo;", "\u{2019}")
        .replace("&lsquo;", "\u{2018}")
        .replace("&rdquo;", "\u{201d}")
        .replace("&ldquo;", "\u{201c}")
        .replace("&hellip;", "\u{2026}")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Hard-cap a title built from a free-text field at [`TITLE_MAX_CHARS`]
/// characters. When `ellipsis` is set the adapter signals truncation with a
/// single trailing ellipsis character.
pub fn truncate_title(title: &str, ellipsis: bool) -> String {
    if title.chars().count() <= TITLE_MAX_CHARS {
        return title.to_string();
    }
    let mut truncated: String = title.chars().take(TITLE_MAX_CHARS).collect();
    if ellipsis {
        truncated.push('\u{2026}');
    }
    truncated
}

/// Parse a date string in various formats
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339
    if let Ok(date) = DateTime::parse_from_rfc3339(date_str) {
        return Some(date.with_timezone(&Utc));
    }

    // Try RFC2822
    if let Ok(date) = DateTime::parse_from_rfc2822(date_str) {
        return Some(date.with_timezone(&Utc));
    }

    // Try ISO 8601
    if let Ok(date) = DateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(date.with_timezone(&Utc));
    }

    None
}

/// Parse a date string into epoch milliseconds.
pub fn parse_date_millis(date_str: &str) -> Option<i64> {
    parse_date(date_str).map(|d| d.timestamp_millis())
}

/// Sources reporting unix seconds are normalized to milliseconds.
pub fn unix_seconds_to_millis(seconds: i64) -> i64 {
    seconds * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_decodes_entities() {
        assert_eq!(
            strip_html("<p>Tom &amp; Jerry&#x27;s   <b>adventure</b></p>"),
            "Tom & Jerry's adventure"
        );
        assert_eq!(strip_html("plain text"), "plain text");
        assert_eq!(strip_html("<div><span>a</span>\n\n<span>b</span></div>"), "a b");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(strip_html("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn truncates_long_titles_to_exactly_100_chars() {
        let long = "x".repeat(150);
        let hard = truncate_title(&long, false);
        assert_eq!(hard.chars().count(), 100);

        let marked = truncate_title(&long, true);
        assert_eq!(marked.chars().count(), 101);
        assert!(marked.ends_with('\u{2026}'));
    }

    #[test]
    fn short_titles_pass_through() {
        assert_eq!(truncate_title("short", true), "short");
    }

    #[test]
    fn parses_common_date_formats() {
        assert!(parse_date("2026-08-05T10:30:00Z").is_some());
        assert!(parse_date("Wed, 05 Aug 2026 10:30:00 GMT").is_some());
        assert!(parse_date("not a date").is_none());
    }

    #[test]
    fn converts_unix_seconds() {
        assert_eq!(unix_seconds_to_millis(1_754_000_000), 1_754_000_000_000);
    }
}
