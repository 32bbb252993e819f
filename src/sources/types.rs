//! Type definitions shared by the source adapters and the fetch orchestrator.

use serde::Serialize;
use tokio::time::Duration;

/// Content category a source feeds into. Categories drive freshness
/// windows, per-category output limits, and the jobs/news split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ai,
    Dev,
    Jobs,
    Sport,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ai => "ai",
            Category::Dev => "dev",
            Category::Jobs => "jobs",
            Category::Sport => "sport",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        match s {
            "ai" => Some(Category::Ai),
            "dev" => Some(Category::Dev),
            "jobs" => Some(Category::Jobs),
            "sport" => Some(Category::Sport),
            _ => None,
        }
    }

    pub fn all() -> &'static [Category] {
        &[Category::Ai, Category::Dev, Category::Jobs, Category::Sport]
    }
}

/// Adapter families. A source's type selects its adapter unless the
/// registry carries an id-specific override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// RSS/Atom (with JSON-feed fallback parsing).
    Feed,
    /// JSON job-board API.
    JobBoard,
    /// Bluesky author feed.
    Bluesky,
    /// Generic HTML listing page.
    Scrape,
    /// Thread-search API (Hacker News via Algolia).
    ThreadSearch,
}

/// One configured external source.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub kind: SourceType,
    pub url: String,
    pub category: Category,
}

impl Source {
    pub fn new(id: &str, name: &str, kind: SourceType, url: &str, category: Category) -> Self {
        Source {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            url: url.to_string(),
            category,
        }
    }
}

/// A normalized item produced by a source adapter, ephemeral until
/// accumulated. `link` is the dedup key within a source.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub source_id: String,
    pub title: String,
    pub link: String,
    pub comments_url: Option<String>,
    pub content: Option<String>,
    /// Publish time in epoch milliseconds, when the source provides one.
    pub published_at: Option<i64>,
}

/// Per-source outcome of one fetch attempt, persisted as source health.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFetchResult {
    pub source_id: String,
    pub item_count: usize,
    pub error: Option<String>,
}

impl SourceFetchResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Merged result of a full fetch pass across every configured source.
#[derive(Debug, Default)]
pub struct FetchOutput {
    pub items: Vec<RawItem>,
    pub health: Vec<SourceFetchResult>,
}

// Every adapter caps its own output to bound prompt size downstream.
pub const MAX_ITEMS_PER_SOURCE: usize = 20;
// Hard cap for titles built from free-text fields (posts, comments).
pub const TITLE_MAX_CHARS: usize = 100;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);
