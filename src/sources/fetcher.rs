//! Fetch orchestration across every configured source.

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::registry::SourceRegistry;
use super::types::{FetchOutput, RawItem, Source, SourceFetchResult, SourceType};
use super::{bluesky, feed, hackernews, jobs, scrape};
use crate::TARGET_WEB_REQUEST;

/// Fetch one source through the adapter the registry resolves for it.
pub async fn fetch_source(
    client: &reqwest::Client,
    registry: &SourceRegistry,
    source: &Source,
) -> anyhow::Result<Vec<RawItem>> {
    match registry.adapter_for(source) {
        SourceType::Feed => feed::fetch(client, source).await,
        SourceType::JobBoard => jobs::fetch(client, source, &registry.job_keywords).await,
        SourceType::Bluesky => bluesky::fetch(client, source).await,
        SourceType::Scrape => scrape::fetch(client, source).await,
        SourceType::ThreadSearch => hackernews::fetch(client, source).await,
    }
}

/// Run every adapter concurrently and merge the results. A failure in one
/// source never aborts the others: each future settles independently and
/// errors become failure health records with the error string preserved.
pub async fn fetch_all(client: &reqwest::Client, registry: &SourceRegistry) -> FetchOutput {
    let futures = registry.sources.iter().map(|source| async move {
        let result = fetch_source(client, registry, source).await;
        (source, result)
    });

    let mut output = FetchOutput::default();
    for (source, result) in join_all(futures).await {
        match result {
            Ok(items) => {
                debug!(target: TARGET_WEB_REQUEST, "Source {} fetched {} items", source.id, items.len());
                output.health.push(SourceFetchResult {
                    source_id: source.id.clone(),
                    item_count: items.len(),
                    error: None,
                });
                output.items.extend(items);
            }
            Err(err) => {
                warn!(target: TARGET_WEB_REQUEST, "Source {} failed: {}", source.id, err);
                output.health.push(SourceFetchResult {
                    source_id: source.id.clone(),
                    item_count: 0,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let before = output.items.len();
    output.items = apply_freshness_filter(output.items, registry, Utc::now().timestamp_millis());
    info!(
        target: TARGET_WEB_REQUEST,
        "Fetched {} items across {} sources, {} within freshness windows",
        before,
        registry.sources.len(),
        output.items.len()
    );

    output
}

/// Per-category freshness filter. Items without a publish timestamp are
/// kept unconditionally; dated items older than their source category's
/// window are dropped.
pub fn apply_freshness_filter(
    items: Vec<RawItem>,
    registry: &SourceRegistry,
    now_millis: i64,
) -> Vec<RawItem> {
    items
        .into_iter()
        .filter(|item| {
            let Some(published_at) = item.published_at else {
                return true;
            };
            let Some(category) = registry.category_of(&item.source_id) else {
                return true;
            };
            let max_age_millis = registry.freshness_days_for(category) * 24 * 60 * 60 * 1000;
            now_millis - published_at <= max_age_millis
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::types::{Category, Source};

    fn fixture_registry() -> SourceRegistry {
        SourceRegistry::new(vec![
            Source::new("ai-src", "AI Source", SourceType::Feed, "https://a.example/feed", Category::Ai),
            Source::new("jobs-src", "Jobs Source", SourceType::JobBoard, "https://j.example/api", Category::Jobs),
        ])
    }

    fn item(source_id: &str, published_at: Option<i64>) -> RawItem {
        RawItem {
            source_id: source_id.to_string(),
            title: "t".to_string(),
            link: format!("https://example.com/{}", published_at.unwrap_or_default()),
            comments_url: None,
            content: None,
            published_at,
        }
    }

    #[test]
    fn freshness_is_per_category() {
        let registry = fixture_registry();
        let now = 1_754_500_000_000;
        let day = 24 * 60 * 60 * 1000;

        let items = vec![
            item("ai-src", Some(now - day)),        // within ai window (2d)
            item("ai-src", Some(now - 3 * day)),    // past ai window
            item("jobs-src", Some(now - 3 * day)),  // within jobs window (10d)
            item("jobs-src", Some(now - 12 * day)), // past jobs window
        ];

        let kept = apply_freshness_filter(items, &registry, now);
        let kept: Vec<_> = kept.iter().map(|i| i.published_at.unwrap()).collect();
        assert_eq!(kept, vec![now - day, now - 3 * day]);
    }

    #[test]
    fn undated_items_are_kept() {
        let registry = fixture_registry();
        let kept = apply_freshness_filter(vec![item("ai-src", None)], &registry, 1_754_500_000_000);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn unknown_source_items_are_kept() {
        let registry = fixture_registry();
        let kept = apply_freshness_filter(
            vec![item("mystery", Some(0))],
            &registry,
            1_754_500_000_000,
        );
        assert_eq!(kept.len(), 1);
    }
}
