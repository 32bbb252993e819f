//! Comment enrichment: augment persisted digest items with a short AI
//! summary of their source discussion thread.
//!
//! Runs as an independent pass over one digest. Each candidate is handled
//! in its own task; a failure on one item never aborts the rest.

use anyhow::Result;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::db::{Database, DigestItemRecord};
use crate::llm::{complete_with_failover, LlmProvider};
use crate::prompts;
use crate::sources::registry::DISCUSSION_SOURCE_IDS;
use crate::sources::util::strip_html;
use crate::sources::SourceRegistry;
use crate::TARGET_WEB_REQUEST;

// Engagement thresholds: below either, the thread is not worth a summary.
const MIN_SCORE: i64 = 50;
const MIN_COMMENTS: i64 = 10;

const MAX_COMMENTS: usize = 20;
const MAX_COMMENT_CHARS: usize = 500;
const MIN_COMMENT_CHARS: usize = 20;

const DISCUSSION_HOSTS: &[&str] = &[
    "news.ycombinator.com",
    "reddit.com",
    "www.reddit.com",
    "old.reddit.com",
];

const HN_ALGOLIA_SEARCH: &str = "https://hn.algolia.com/api/v1/search";
const HN_ALGOLIA_ITEM: &str = "https://hn.algolia.com/api/v1/items";

#[derive(Debug, Default, serde::Serialize)]
pub struct EnrichmentReport {
    pub candidates: usize,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug)]
struct DiscussionThread {
    score: i64,
    comment_count: i64,
    comments: Vec<String>,
}

enum ItemOutcome {
    Generated,
    Skipped,
    Failed,
}

/// Enrich every eligible, not-yet-enriched item of the digest for `date`.
pub async fn enrich_comments(
    db: &Database,
    http: &reqwest::Client,
    providers: &[LlmProvider],
    registry: &SourceRegistry,
    date: &str,
) -> Result<EnrichmentReport> {
    let Some(digest) = db.digest_for_date(date).await? else {
        return Err(anyhow::anyhow!("No digest exists for {}", date));
    };

    let items = db.digest_items(digest.id).await?;
    let candidates: Vec<DigestItemRecord> = items
        .into_iter()
        .filter(|item| item.comment_summary_source.is_none() && is_eligible(item, registry))
        .collect();

    let mut report = EnrichmentReport {
        candidates: candidates.len(),
        ..Default::default()
    };

    let outcomes = join_all(
        candidates
            .iter()
            .map(|item| enrich_item(db, http, providers, item)),
    )
    .await;

    for outcome in outcomes {
        match outcome {
            ItemOutcome::Generated => report.generated += 1,
            ItemOutcome::Skipped => report.skipped += 1,
            ItemOutcome::Failed => report.failed += 1,
        }
    }

    info!(
        "Comment enrichment for {}: {} candidates, {} generated, {} skipped, {} failed",
        date, report.candidates, report.generated, report.skipped, report.failed
    );
    Ok(report)
}

/// An item qualifies when its URL lives on a discussion platform, its
/// source is a known discussion source, or it carries a comments link.
fn is_eligible(item: &DigestItemRecord, registry: &SourceRegistry) -> bool {
    if item.comments_url.is_some() {
        return true;
    }
    if host_of(&item.source_url)
        .map(|host| DISCUSSION_HOSTS.contains(&host.as_str()))
        .unwrap_or(false)
    {
        return true;
    }
    DISCUSSION_SOURCE_IDS
        .iter()
        .any(|id| registry.display_name(id) == item.source_name)
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

async fn enrich_item(
    db: &Database,
    http: &reqwest::Client,
    providers: &[LlmProvider],
    item: &DigestItemRecord,
) -> ItemOutcome {
    let thread = match fetch_thread(http, item).await {
        Ok(thread) => thread,
        Err(err) => {
            warn!(target: TARGET_WEB_REQUEST, "Thread fetch failed for item {}: {}", item.id, err);
            return ItemOutcome::Failed;
        }
    };

    // Low-engagement threads get an explicit marker, distinct from items
    // never attempted, and no LLM call is made.
    if thread.score < MIN_SCORE || thread.comment_count < MIN_COMMENTS {
        debug!(
            "Item {} below engagement threshold (score {}, comments {})",
            item.id, thread.score, thread.comment_count
        );
        let result = db
            .update_comment_enrichment(
                item.id,
                None,
                Some(thread.comment_count),
                Some(thread.score),
                "skipped",
            )
            .await;
        if let Err(err) = result {
            warn!("Failed to mark item {} skipped: {}", item.id, err);
            return ItemOutcome::Failed;
        }
        return ItemOutcome::Skipped;
    }

    let prompt = prompts::comment_summary_prompt(&item.title, &thread.comments.join("\n"));
    let Some(summary) = complete_with_failover(db, providers, &prompt, 512, 0.3).await else {
        return ItemOutcome::Failed;
    };

    let result = db
        .update_comment_enrichment(
            item.id,
            Some(summary.trim()),
            Some(thread.comment_count),
            Some(thread.score),
            "generated",
        )
        .await;
    match result {
        Ok(()) => ItemOutcome::Generated,
        Err(err) => {
            warn!("Failed to store enrichment for item {}: {}", item.id, err);
            ItemOutcome::Failed
        }
    }
}

/// Fetch the discussion thread behind an item. Reddit threads come from a
/// single JSON listing request; Hacker News goes through Algolia, searching
/// by URL first unless the item already names its thread id.
async fn fetch_thread(
    http: &reqwest::Client,
    item: &DigestItemRecord,
) -> Result<DiscussionThread> {
    let discussion_url = item.comments_url.as_deref().unwrap_or(item.source_url.as_str());
    let host = host_of(discussion_url).unwrap_or_default();

    if host == "news.ycombinator.com" {
        fetch_hn_thread(http, discussion_url, &item.source_url).await
    } else if host.ends_with("reddit.com") {
        fetch_reddit_thread(http, discussion_url).await
    } else {
        // No direct thread link; search HN for a thread about this URL.
        fetch_hn_thread_by_search(http, &item.source_url).await
    }
}

async fn fetch_reddit_thread(http: &reqwest::Client, url: &str) -> Result<DiscussionThread> {
    let listing_url = format!("{}.json", url.trim_end_matches('/'));
    let body: Value = crate::sources::client::get(http, &listing_url)
        .await?
        .json()
        .await?;

    let post = body
        .get(0)
        .and_then(|listing| listing.pointer("/data/children/0/data"))
        .ok_or_else(|| anyhow::anyhow!("Unexpected Reddit listing shape from {}", listing_url))?;
    let score = post.get("score").and_then(Value::as_i64).unwrap_or(0);
    let comment_count = post.get("num_comments").and_then(Value::as_i64).unwrap_or(0);

    let raw_comments: Vec<String> = body
        .get(1)
        .and_then(|listing| listing.pointer("/data/children"))
        .and_then(Value::as_array)
        .map(|children| {
            children
                .iter()
                .filter_map(|child| child.pointer("/data/body").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(DiscussionThread {
        score,
        comment_count,
        comments: clean_comments(raw_comments),
    })
}

async fn fetch_hn_thread(
    http: &reqwest::Client,
    comments_url: &str,
    source_url: &str,
) -> Result<DiscussionThread> {
    // A thread link carries its id directly; only search when it doesn't.
    match Url::parse(comments_url)
        .ok()
        .and_then(|u| u.query_pairs().find(|(k, _)| k == "id").map(|(_, v)| v.to_string()))
    {
        Some(id) => fetch_hn_item(http, &id, None).await,
        None => fetch_hn_thread_by_search(http, source_url).await,
    }
}

async fn fetch_hn_thread_by_search(
    http: &reqwest::Client,
    source_url: &str,
) -> Result<DiscussionThread> {
    let search_url = Url::parse_with_params(
        HN_ALGOLIA_SEARCH,
        &[
            ("query", source_url),
            ("restrictSearchableAttributes", "url"),
            ("tags", "story"),
        ],
    )?;

    let body: Value = crate::sources::client::get(http, search_url.as_str())
        .await?
        .json()
        .await?;
    let hit = body
        .pointer("/hits/0")
        .ok_or_else(|| anyhow::anyhow!("No HN thread found for {}", source_url))?;
    let id = hit
        .get("objectID")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("HN search hit without objectID"))?
        .to_string();
    let comment_count = hit.get("num_comments").and_then(Value::as_i64);

    fetch_hn_item(http, &id, comment_count).await
}

async fn fetch_hn_item(
    http: &reqwest::Client,
    id: &str,
    known_comment_count: Option<i64>,
) -> Result<DiscussionThread> {
    let item_url = format!("{}/{}", HN_ALGOLIA_ITEM, id);
    let body: Value = crate::sources::client::get(http, &item_url).await?.json().await?;

    let score = body.get("points").and_then(Value::as_i64).unwrap_or(0);
    let children = body
        .get("children")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let comment_count = known_comment_count.unwrap_or(children.len() as i64);

    let raw_comments: Vec<String> = children
        .iter()
        .filter_map(|child| child.get("text").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    Ok(DiscussionThread {
        score,
        comment_count,
        comments: clean_comments(raw_comments),
    })
}

/// Normalize top-level comment bodies: markup stripped, hard length cap,
/// short noise discarded, bounded count.
fn clean_comments(raw: Vec<String>) -> Vec<String> {
    raw.iter()
        .map(|body| strip_html(body))
        .filter(|body| body.chars().count() >= MIN_COMMENT_CHARS)
        .map(|body| body.chars().take(MAX_COMMENT_CHARS).collect())
        .take(MAX_COMMENTS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{Source, SourceType};
    use crate::sources::types::Category;

    fn record(source_url: &str, source_name: &str, comments_url: Option<&str>) -> DigestItemRecord {
        DigestItemRecord {
            id: 1,
            digest_id: 1,
            category: "dev".to_string(),
            title: "t".to_string(),
            summary: "s".to_string(),
            why_it_matters: None,
            source_name: source_name.to_string(),
            source_url: source_url.to_string(),
            comments_url: comments_url.map(str::to_string),
            published_at: None,
            position: 0,
            comment_summary: None,
            comment_count: None,
            comment_score: None,
            comment_summary_source: None,
        }
    }

    fn fixture_registry() -> SourceRegistry {
        SourceRegistry::new(vec![Source::new(
            "reddit-rust",
            "r/rust",
            SourceType::Feed,
            "https://www.reddit.com/r/rust/.rss",
            Category::Dev,
        )])
    }

    #[test]
    fn eligibility_covers_hosts_sources_and_comment_links() {
        let registry = fixture_registry();

        // Discussion-platform host.
        assert!(is_eligible(
            &record("https://news.ycombinator.com/item?id=1", "X", None),
            &registry
        ));
        // Known discussion source by name.
        assert!(is_eligible(
            &record("https://blog.example.com/post", "r/rust", None),
            &registry
        ));
        // Platform comments link on an otherwise ordinary item.
        assert!(is_eligible(
            &record(
                "https://blog.example.com/post",
                "X",
                Some("https://news.ycombinator.com/item?id=2")
            ),
            &registry
        ));
        // None of the above.
        assert!(!is_eligible(
            &record("https://blog.example.com/post", "X", None),
            &registry
        ));
    }

    #[test]
    fn below_threshold_thread_is_detected() {
        let thread = DiscussionThread {
            score: 5,
            comment_count: 2,
            comments: vec![],
        };
        assert!(thread.score < MIN_SCORE || thread.comment_count < MIN_COMMENTS);

        let busy = DiscussionThread {
            score: 120,
            comment_count: 48,
            comments: vec![],
        };
        assert!(!(busy.score < MIN_SCORE || busy.comment_count < MIN_COMMENTS));
    }

    #[test]
    fn comments_are_cleaned_bounded_and_filtered() {
        let mut raw = vec![
            "<p>A perfectly reasonable comment about the article</p>".to_string(),
            "short".to_string(),
            "x".repeat(900),
        ];
        raw.extend((0..30).map(|i| format!("Another comment with enough length to pass {}", i)));

        let cleaned = clean_comments(raw);
        assert_eq!(cleaned.len(), MAX_COMMENTS);
        assert_eq!(cleaned[0], "A perfectly reasonable comment about the article");
        assert!(cleaned.iter().all(|c| c.chars().count() <= MAX_COMMENT_CHARS));
        assert!(cleaned.iter().all(|c| c != "short"));
    }

    #[test]
    fn reddit_listing_shape_parses() {
        let body: Value = serde_json::from_str(
            r#"[
                {"data": {"children": [{"data": {"score": 321, "num_comments": 45}}]}},
                {"data": {"children": [
                    {"data": {"body": "First top-level comment with plenty of substance"}},
                    {"data": {"body": "meh"}}
                ]}}
            ]"#,
        )
        .unwrap();

        let post = body.get(0).and_then(|l| l.pointer("/data/children/0/data")).unwrap();
        assert_eq!(post.get("score").and_then(Value::as_i64), Some(321));
        assert_eq!(post.get("num_comments").and_then(Value::as_i64), Some(45));

        let comments: Vec<String> = body
            .get(1)
            .and_then(|l| l.pointer("/data/children"))
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .filter_map(|c| c.pointer("/data/body").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        assert_eq!(clean_comments(comments).len(), 1);
    }
}
