//! Generic HTML listing scrape adapter.
//!
//! Extracts anchor links from a listing page and keeps same-host article
//! links with plausible titles. Per-site heuristics beyond this are
//! intentionally out of scope; a source needing them gets its own adapter
//! registered as an id override.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use super::client;
use super::types::{RawItem, Source, MAX_ITEMS_PER_SOURCE};
use super::util::{strip_html, truncate_title};
use crate::TARGET_WEB_REQUEST;

static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"'#]+)["'][^>]*>(.*?)</a>"#).unwrap());

// Anchors with less text than this are navigation, not articles.
const MIN_TITLE_CHARS: usize = 15;

pub async fn fetch(client: &reqwest::Client, source: &Source) -> Result<Vec<RawItem>> {
    let base = Url::parse(&source.url)
        .map_err(|e| anyhow::anyhow!("Invalid scrape URL {}: {}", source.url, e))?;

    let response = client::get(client, &source.url).await?;
    let body = response.text().await?;

    let items = extract_listing_items(&body, &base, &source.id);
    debug!(target: TARGET_WEB_REQUEST, "Scrape {} produced {} items", source.id, items.len());
    Ok(items)
}

fn extract_listing_items(body: &str, base: &Url, source_id: &str) -> Vec<RawItem> {
    let mut items: Vec<RawItem> = Vec::new();
    for capture in ANCHOR_RE.captures_iter(body) {
        let text = strip_html(&capture[2]);
        if text.chars().count() < MIN_TITLE_CHARS {
            continue;
        }

        let Ok(link) = base.join(&capture[1]) else {
            continue;
        };
        if link.host_str() != base.host_str() {
            continue;
        }
        let link = link.to_string();
        if link == base.as_str() || items.iter().any(|item| item.link == link) {
            continue;
        }

        items.push(RawItem {
            source_id: source_id.to_string(),
            title: truncate_title(&text, false),
            link,
            comments_url: None,
            content: None,
            published_at: None,
        });
        if items.len() >= MAX_ITEMS_PER_SOURCE {
            break;
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_same_host_article_links() {
        let base = Url::parse("https://example.com/news").unwrap();
        let body = r#"
            <nav><a href="/about">About</a></nav>
            <a href="/news/model-release-announcement">Announcing our next generation model family</a>
            <a href="https://example.com/news/safety-update"><span>A safety framework update for 2026</span></a>
            <a href="https://other.example.org/elsewhere">An interesting offsite link with a long title</a>
        "#;

        let items = extract_listing_items(body, &base, "test-scrape");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].link, "https://example.com/news/model-release-announcement");
        assert_eq!(items[1].title, "A safety framework update for 2026");
        assert!(items.iter().all(|i| i.published_at.is_none()));
    }

    #[test]
    fn deduplicates_repeated_links() {
        let base = Url::parse("https://example.com/news").unwrap();
        let body = r#"
            <a href="/news/one">A headline long enough to keep around</a>
            <a href="/news/one">A headline long enough to keep around</a>
        "#;
        let items = extract_listing_items(body, &base, "test-scrape");
        assert_eq!(items.len(), 1);
    }
}
