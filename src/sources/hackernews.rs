//! Hacker News thread-search adapter, backed by the Algolia search API.
//!
//! Unlike the feed adapters this one surfaces upstream HTTP failures as
//! errors; the orchestrator converts them into failure health records.

use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use super::client;
use super::types::{RawItem, Source, MAX_ITEMS_PER_SOURCE};
use super::util::{strip_html, unix_seconds_to_millis};
use crate::TARGET_WEB_REQUEST;

const HN_ITEM_URL: &str = "https://news.ycombinator.com/item?id=";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    story_text: Option<String>,
    created_at_i: Option<i64>,
}

pub async fn fetch(client: &reqwest::Client, source: &Source) -> Result<Vec<RawItem>> {
    let response = client::get(client, &source.url).await?;
    let search: SearchResponse = response
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to parse HN search from {}: {}", source.url, e))?;

    let mut items = Vec::new();
    for hit in search.hits {
        let comments_url = format!("{}{}", HN_ITEM_URL, hit.object_id);
        // Ask/Show threads carry no external URL; the thread is the item.
        let link = hit.url.clone().filter(|u| !u.is_empty()).unwrap_or_else(|| comments_url.clone());

        items.push(RawItem {
            source_id: source.id.clone(),
            title: hit
                .title
                .as_deref()
                .map(strip_html)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            link,
            comments_url: Some(comments_url),
            content: hit
                .story_text
                .as_deref()
                .map(strip_html)
                .filter(|t| !t.is_empty()),
            published_at: hit.created_at_i.map(unix_seconds_to_millis),
        });
        if items.len() >= MAX_ITEMS_PER_SOURCE {
            break;
        }
    }

    debug!(target: TARGET_WEB_REQUEST, "HN search {} produced {} items", source.id, items.len());
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_map_to_items_with_comment_urls() {
        let payload = r#"{"hits":[
            {"objectID":"41000001","title":"A story","url":"https://example.com/story","created_at_i":1754300000},
            {"objectID":"41000002","title":"Ask HN: Something?","story_text":"<p>Question body that is long enough</p>"}
        ]}"#;
        let search: SearchResponse = serde_json::from_str(payload).unwrap();

        assert_eq!(search.hits.len(), 2);
        assert_eq!(search.hits[0].created_at_i, Some(1754300000));
        // Self-posts fall back to the thread URL as the item link.
        assert!(search.hits[1].url.is_none());
    }
}
