//! Bluesky author-feed adapter (public XRPC, no credentials).

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use super::client;
use super::types::{RawItem, Source, MAX_ITEMS_PER_SOURCE};
use super::util::{parse_date_millis, strip_html, truncate_title};
use crate::TARGET_WEB_REQUEST;

const XRPC_AUTHOR_FEED: &str = "https://public.api.bsky.app/xrpc/app.bsky.feed.getAuthorFeed";

#[derive(Debug, Deserialize)]
struct AuthorFeedResponse {
    #[serde(default)]
    feed: Vec<FeedEntry>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    post: Post,
    /// Present on reposts; those are someone else's content.
    reason: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Post {
    uri: String,
    author: Author,
    record: PostRecord,
}

#[derive(Debug, Deserialize)]
struct Author {
    handle: String,
}

#[derive(Debug, Deserialize)]
struct PostRecord {
    #[serde(default)]
    text: String,
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
}

pub async fn fetch(client: &reqwest::Client, source: &Source) -> Result<Vec<RawItem>> {
    // For Bluesky sources the registry url field holds the actor handle.
    let url = format!("{}?actor={}&limit=30", XRPC_AUTHOR_FEED, source.url);
    let response = client::get(client, &url).await?;
    let feed: AuthorFeedResponse = response.json().await?;

    let mut items = Vec::new();
    for entry in feed.feed {
        if entry.reason.is_some() {
            continue;
        }

        let Some(rkey) = post_key(&entry.post.uri) else {
            continue;
        };
        let text = strip_html(&entry.post.record.text);
        if text.is_empty() {
            continue;
        }

        items.push(RawItem {
            source_id: source.id.clone(),
            link: format!(
                "https://bsky.app/profile/{}/post/{}",
                entry.post.author.handle, rkey
            ),
            // Post text is free-form; the title is a hard-capped preview
            // and the adapter signals truncation with an ellipsis.
            title: truncate_title(&text, true),
            comments_url: None,
            content: Some(text),
            published_at: entry
                .post
                .record
                .created_at
                .as_deref()
                .and_then(parse_date_millis),
        });
        if items.len() >= MAX_ITEMS_PER_SOURCE {
            break;
        }
    }

    debug!(target: TARGET_WEB_REQUEST, "Bluesky {} produced {} items", source.id, items.len());
    Ok(items)
}

/// The post key is the last path segment of the `at://` record URI.
fn post_key(uri: &str) -> Option<&str> {
    uri.rsplit('/').next().filter(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_key_is_last_uri_segment() {
        assert_eq!(
            post_key("at://did:plc:abc123/app.bsky.feed.post/3kfxyz"),
            Some("3kfxyz")
        );
        assert_eq!(post_key(""), None);
    }

    #[test]
    fn long_post_text_is_capped_with_ellipsis() {
        let text = "a".repeat(240);
        let title = truncate_title(&text, true);
        assert_eq!(title.chars().count(), 101);
        assert!(title.ends_with('\u{2026}'));
    }
}
