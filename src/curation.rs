//! Curation pipeline: cross-run dedup, per-source capping, category split.
//!
//! All three stages are pure over in-memory item lists so they can be
//! tested without a store or network.

use std::collections::HashSet;

use tracing::debug;

use crate::db::AccumulatedItem;
use crate::sources::{Category, SourceRegistry};

/// Drop items already published in a recent digest: exact link match
/// against prior `source_url`s, or case-insensitive title match. URL dedup
/// alone misses syndicated reposts whose mirrors differ.
pub fn dedupe(
    items: Vec<AccumulatedItem>,
    recent_digest_items: &[(String, String)],
) -> Vec<AccumulatedItem> {
    let seen_urls: HashSet<&str> = recent_digest_items
        .iter()
        .map(|(_, url)| url.as_str())
        .collect();
    let seen_titles: HashSet<String> = recent_digest_items
        .iter()
        .map(|(title, _)| title.to_lowercase())
        .collect();

    let before = items.len();
    let kept: Vec<AccumulatedItem> = items
        .into_iter()
        .filter(|item| {
            !seen_urls.contains(item.link.as_str())
                && !seen_titles.contains(&item.title.to_lowercase())
        })
        .collect();

    debug!("Cross-run dedup kept {} of {} items", kept.len(), before);
    kept
}

/// Keep at most `max` items per source, preferring the newest. Undated
/// items rank last; ties keep their original order.
pub fn cap_per_source(items: Vec<AccumulatedItem>, max: usize) -> Vec<AccumulatedItem> {
    let mut groups: Vec<(String, Vec<AccumulatedItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(id, _)| *id == item.source_id) {
            Some((_, group)) => group.push(item),
            None => groups.push((item.source_id.clone(), vec![item])),
        }
    }

    let mut capped = Vec::new();
    for (_, mut group) in groups {
        group.sort_by(|a, b| {
            b.published_at
                .unwrap_or(i64::MIN)
                .cmp(&a.published_at.unwrap_or(i64::MIN))
        });
        group.truncate(max);
        capped.extend(group);
    }
    capped
}

/// Partition into job and news items by the registry's source categories.
/// Sources missing from the registry fail open into news so an unknown id
/// is never silently dropped.
pub fn split_jobs_and_news(
    items: Vec<AccumulatedItem>,
    registry: &SourceRegistry,
) -> (Vec<AccumulatedItem>, Vec<AccumulatedItem>) {
    items
        .into_iter()
        .partition(|item| registry.category_of(&item.source_id) == Some(Category::Jobs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{Source, SourceType};

    fn item(source_id: &str, title: &str, link: &str, published_at: Option<i64>) -> AccumulatedItem {
        AccumulatedItem {
            id: 0,
            source_id: source_id.to_string(),
            title: title.to_string(),
            link: link.to_string(),
            normalized_link: link.to_string(),
            comments_url: None,
            content: None,
            published_at,
            date: "2026-08-06".to_string(),
            summarized_at: None,
        }
    }

    #[test]
    fn dedupe_matches_urls_exactly_and_titles_case_insensitively() {
        let recent = vec![(
            "Vue 4 Released".to_string(),
            "https://vue.com/4".to_string(),
        )];
        let items = vec![
            item("a", "vue 4 released", "https://other.com/mirror", None),
            item("a", "Something Else", "https://vue.com/4", None),
            item("a", "Genuinely New", "https://new.example/post", None),
        ];

        let kept = dedupe(items, &recent);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Genuinely New");
    }

    #[test]
    fn dedupe_without_recent_digests_keeps_everything() {
        let items = vec![item("a", "One", "https://x/1", None)];
        assert_eq!(dedupe(items, &[]).len(), 1);
    }

    #[test]
    fn cap_keeps_newest_per_source() {
        let items = vec![
            item("sourceA", "a1", "https://x/1", Some(400)),
            item("sourceA", "a2", "https://x/2", Some(300)),
            item("sourceA", "a3", "https://x/3", Some(200)),
            item("sourceA", "a4", "https://x/4", Some(100)),
            item("sourceB", "b1", "https://x/5", Some(50)),
        ];

        let capped = cap_per_source(items, 2);
        let titles: Vec<&str> = capped.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn cap_ranks_undated_items_last() {
        let items = vec![
            item("s", "undated", "https://x/1", None),
            item("s", "dated", "https://x/2", Some(100)),
        ];
        let capped = cap_per_source(items, 1);
        assert_eq!(capped[0].title, "dated");
    }

    #[test]
    fn cap_breaks_ties_by_original_order() {
        let items = vec![
            item("s", "first", "https://x/1", Some(100)),
            item("s", "second", "https://x/2", Some(100)),
        ];
        let capped = cap_per_source(items, 1);
        assert_eq!(capped[0].title, "first");
    }

    #[test]
    fn split_defaults_unknown_sources_to_news() {
        let registry = SourceRegistry::new(vec![
            Source::new("board", "Board", SourceType::JobBoard, "https://b/api", Category::Jobs),
            Source::new("blog", "Blog", SourceType::Feed, "https://b/rss", Category::Ai),
        ]);
        let items = vec![
            item("board", "Job", "https://x/1", None),
            item("blog", "Post", "https://x/2", None),
            item("unregistered", "Mystery", "https://x/3", None),
        ];

        let (jobs, news) = split_jobs_and_news(items, &registry);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source_id, "board");
        assert_eq!(news.len(), 2);
        assert!(news.iter().any(|i| i.source_id == "unregistered"));
    }
}
