//! Static source registry and the category tables derived from it.
//!
//! The registry is immutable configuration built once at startup and passed
//! explicitly into the orchestrator and curation pipeline, so tests can
//! substitute small fixture source lists.

use std::collections::HashMap;

use super::types::{Category, Source, SourceType};

/// Source ids whose adapter differs from what their declared type implies.
/// Checked before type dispatch, so an entry here wins over `Source::kind`.
const ADAPTER_OVERRIDES: &[(&str, SourceType)] = &[
    // "Who is hiring" threads are job postings but live behind the HN
    // search API rather than a job-board endpoint.
    ("hn-hiring", SourceType::ThreadSearch),
];

/// Source ids whose items are backed by a discussion platform even when the
/// item link points elsewhere. Used by comment enrichment eligibility.
pub const DISCUSSION_SOURCE_IDS: &[&str] = &[
    "hn-frontpage",
    "hn-ai",
    "hn-hiring",
    "reddit-rust",
    "reddit-ml",
    "reddit-soccer",
];

#[derive(Debug, Clone)]
pub struct SourceRegistry {
    pub sources: Vec<Source>,
    pub category_limits: HashMap<Category, usize>,
    pub freshness_days: HashMap<Category, i64>,
    pub job_keywords: Vec<String>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        SourceRegistry::new(default_sources())
    }
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        let category_limits = HashMap::from([
            (Category::Ai, 10),
            (Category::Dev, 8),
            (Category::Jobs, 6),
            (Category::Sport, 5),
        ]);
        let freshness_days = HashMap::from([
            (Category::Ai, 2),
            (Category::Dev, 4),
            (Category::Jobs, 10),
            (Category::Sport, 2),
        ]);
        let job_keywords = [
            "rust",
            "golang",
            "typescript",
            "python",
            "backend",
            "devops",
            "platform",
            "infrastructure",
            "distributed",
            "machine learning",
            "remote",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        SourceRegistry {
            sources,
            category_limits,
            freshness_days,
            job_keywords,
        }
    }

    /// Resolve the adapter for a source: id overrides first, then type.
    pub fn adapter_for(&self, source: &Source) -> SourceType {
        ADAPTER_OVERRIDES
            .iter()
            .find(|(id, _)| *id == source.id)
            .map(|(_, kind)| *kind)
            .unwrap_or(source.kind)
    }

    pub fn source_by_id(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.id == id)
    }

    /// Display name for a source id, falling back to the id itself for
    /// sources that have since been removed from the registry.
    pub fn display_name(&self, id: &str) -> String {
        self.source_by_id(id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Category for a source id. Unknown ids return `None`; the curation
    /// split treats those as news.
    pub fn category_of(&self, source_id: &str) -> Option<Category> {
        self.source_by_id(source_id).map(|s| s.category)
    }

    pub fn limit_for(&self, category: Category) -> usize {
        self.category_limits.get(&category).copied().unwrap_or(5)
    }

    pub fn freshness_days_for(&self, category: Category) -> i64 {
        self.freshness_days.get(&category).copied().unwrap_or(3)
    }

    /// Sum of all configured category limits, used as the overall selection
    /// budget given to the model.
    pub fn total_limit(&self) -> usize {
        self.category_limits.values().sum()
    }

    pub fn is_known_category(&self, name: &str) -> bool {
        Category::parse(name)
            .map(|c| self.category_limits.contains_key(&c))
            .unwrap_or(false)
    }
}

/// The production source table. For `Bluesky` sources `url` holds the actor
/// handle rather than an endpoint; for `ThreadSearch` sources it holds the
/// Algolia search URL.
pub fn default_sources() -> Vec<Source> {
    use Category::*;
    use SourceType::*;

    let s = Source::new;
    vec![
        // AI news
        s("hf-blog", "Hugging Face Blog", Feed, "https://huggingface.co/blog/feed.xml", Ai),
        s("openai-news", "OpenAI News", Feed, "https://openai.com/news/rss.xml", Ai),
        s("deepmind-blog", "Google DeepMind Blog", Feed, "https://deepmind.google/blog/rss.xml", Ai),
        s("google-ai-blog", "Google AI Blog", Feed, "https://blog.google/technology/ai/rss/", Ai),
        s("arxiv-cs-ai", "arXiv cs.AI", Feed, "https://arxiv.org/rss/cs.AI", Ai),
        s("simon-willison", "Simon Willison", Feed, "https://simonwillison.net/atom/everything/", Ai),
        s("verge-ai", "The Verge AI", Feed, "https://www.theverge.com/rss/ai-artificial-intelligence/index.xml", Ai),
        s("techcrunch-ai", "TechCrunch AI", Feed, "https://techcrunch.com/category/artificial-intelligence/feed/", Ai),
        s("venturebeat-ai", "VentureBeat AI", Feed, "https://venturebeat.com/category/ai/feed/", Ai),
        s("mit-tech-review", "MIT Technology Review", Feed, "https://www.technologyreview.com/feed/", Ai),
        s("reddit-ml", "r/MachineLearning", Feed, "https://www.reddit.com/r/MachineLearning/.rss", Ai),
        s("hn-ai", "Hacker News AI", ThreadSearch, "https://hn.algolia.com/api/v1/search_by_date?tags=story&query=LLM&numericFilters=points>30", Ai),
        s("anthropic-news", "Anthropic News", Scrape, "https://www.anthropic.com/news", Ai),
        s("mistral-news", "Mistral AI News", Scrape, "https://mistral.ai/news", Ai),
        s("bsky-karpathy", "Andrej Karpathy (Bluesky)", Bluesky, "karpathy.bsky.social", Ai),
        s("bsky-hf", "Hugging Face (Bluesky)", Bluesky, "huggingface.bsky.social", Ai),
        // Dev news
        s("rust-blog", "Rust Blog", Feed, "https://blog.rust-lang.org/feed.xml", Dev),
        s("go-blog", "Go Blog", Feed, "https://go.dev/blog/feed.atom", Dev),
        s("github-blog", "GitHub Blog", Feed, "https://github.blog/feed/", Dev),
        s("ars-technica", "Ars Technica", Feed, "https://feeds.arstechnica.com/arstechnica/technology-lab", Dev),
        s("lobsters", "Lobsters", Feed, "https://lobste.rs/rss", Dev),
        s("dev-to", "DEV Community", Feed, "https://dev.to/feed", Dev),
        s("daring-fireball", "Daring Fireball", Feed, "https://daringfireball.net/feeds/json", Dev),
        s("reddit-rust", "r/rust", Feed, "https://www.reddit.com/r/rust/.rss", Dev),
        s("hn-frontpage", "Hacker News", ThreadSearch, "https://hn.algolia.com/api/v1/search?tags=front_page", Dev),
        s("bsky-rustlang", "Rust Language (Bluesky)", Bluesky, "rustlang.bsky.social", Dev),
        s("changelog", "The Changelog", Feed, "https://changelog.com/feed", Dev),
        // Jobs
        s("remoteok", "Remote OK", JobBoard, "https://remoteok.com/api", Jobs),
        s("remotive", "Remotive", JobBoard, "https://remotive.com/api/remote-jobs", Jobs),
        s("jobicy", "Jobicy", JobBoard, "https://jobicy.com/api/v2/remote-jobs", Jobs),
        s("arbeitnow", "Arbeitnow", JobBoard, "https://www.arbeitnow.com/api/job-board-api", Jobs),
        s("wwr-programming", "We Work Remotely", Feed, "https://weworkremotely.com/categories/remote-programming-jobs.rss", Jobs),
        s("hn-hiring", "HN Who Is Hiring", JobBoard, "https://hn.algolia.com/api/v1/search_by_date?tags=story&query=%22who%20is%20hiring%22", Jobs),
        // Sport
        s("bbc-sport", "BBC Sport", Feed, "https://feeds.bbci.co.uk/sport/rss.xml", Sport),
        s("espn", "ESPN", Feed, "https://www.espn.com/espn/rss/news", Sport),
        s("guardian-football", "The Guardian Football", Feed, "https://www.theguardian.com/football/rss", Sport),
        s("reddit-soccer", "r/soccer", Feed, "https://www.reddit.com/r/soccer/.rss", Sport),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_override_wins_over_declared_type() {
        let registry = SourceRegistry::default();
        let hiring = registry.source_by_id("hn-hiring").unwrap();
        assert_eq!(hiring.kind, SourceType::JobBoard);
        assert_eq!(registry.adapter_for(hiring), SourceType::ThreadSearch);

        let feed = registry.source_by_id("rust-blog").unwrap();
        assert_eq!(registry.adapter_for(feed), SourceType::Feed);
    }

    #[test]
    fn unknown_source_has_no_category() {
        let registry = SourceRegistry::default();
        assert_eq!(registry.category_of("no-such-source"), None);
        assert_eq!(registry.category_of("rust-blog"), Some(Category::Dev));
    }

    #[test]
    fn total_limit_is_sum_of_categories() {
        let registry = SourceRegistry::default();
        assert_eq!(registry.total_limit(), 10 + 8 + 6 + 5);
    }
}
