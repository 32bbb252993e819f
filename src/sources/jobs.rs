//! JSON job-board adapter.
//!
//! Handles the two payload shapes the configured boards use: a bare array
//! of postings and a `{"jobs": [...]}` wrapper. Postings are relevance
//! filtered against the registry keyword allow-list before the item cap.

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::client;
use super::types::{RawItem, Source, MAX_ITEMS_PER_SOURCE};
use super::util::{parse_date_millis, strip_html, unix_seconds_to_millis};
use crate::TARGET_WEB_REQUEST;

#[derive(Debug, Deserialize)]
struct JobBoardWrapper {
    #[serde(default, alias = "data", alias = "results")]
    jobs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct JobPosting {
    #[serde(alias = "title", alias = "jobTitle")]
    position: Option<String>,
    #[serde(alias = "apply_url", alias = "link")]
    url: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(alias = "company_name", alias = "companyName")]
    company: Option<String>,
    #[serde(alias = "excerpt", alias = "jobDescription")]
    description: Option<String>,
    #[serde(alias = "publication_date", alias = "created_at", alias = "pubDate")]
    date: Option<String>,
    /// Unix seconds, used by boards that expose numeric timestamps.
    epoch: Option<i64>,
}

pub async fn fetch(
    client: &reqwest::Client,
    source: &Source,
    keywords: &[String],
) -> Result<Vec<RawItem>> {
    let response = client::get(client, &source.url).await?;
    let body = response.text().await?;

    let parsed: Value = serde_json::from_str(&body)
        .map_err(|err| anyhow::anyhow!("Failed to parse job board {}: {}", source.url, err))?;

    let raw_postings = match parsed {
        Value::Array(entries) => entries,
        Value::Object(_) => {
            let wrapper: JobBoardWrapper = serde_json::from_value(parsed)?;
            wrapper.jobs
        }
        _ => return Err(anyhow::anyhow!("Unexpected job board payload from {}", source.url)),
    };

    let total = raw_postings.len();
    let mut items = Vec::new();
    for value in raw_postings {
        // Boards mix metadata objects (legal notices, paging info) into the
        // array; skip anything that doesn't deserialize as a posting.
        let Ok(posting) = serde_json::from_value::<JobPosting>(value) else {
            continue;
        };
        let Some(link) = posting.url.clone().filter(|u| !u.is_empty()) else {
            continue;
        };
        if !matches_keywords(&posting, keywords) {
            continue;
        }

        items.push(RawItem {
            source_id: source.id.clone(),
            title: posting_title(&posting),
            link,
            comments_url: None,
            content: posting
                .description
                .as_deref()
                .map(strip_html)
                .filter(|d| !d.is_empty()),
            published_at: posting
                .epoch
                .map(unix_seconds_to_millis)
                .or_else(|| posting.date.as_deref().and_then(parse_date_millis)),
        });
        if items.len() >= MAX_ITEMS_PER_SOURCE {
            break;
        }
    }

    debug!(
        target: TARGET_WEB_REQUEST,
        "Job board {} kept {} of {} postings", source.id, items.len(), total
    );
    Ok(items)
}

/// Case-insensitive keyword/tag match; non-matching postings are dropped
/// before the item cap is applied.
fn matches_keywords(posting: &JobPosting, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }

    let haystack = format!(
        "{} {}",
        posting.position.as_deref().unwrap_or_default(),
        posting.tags.join(" ")
    )
    .to_lowercase();

    keywords.iter().any(|kw| haystack.contains(&kw.to_lowercase()))
}

fn posting_title(posting: &JobPosting) -> String {
    let position = posting
        .position
        .as_deref()
        .map(strip_html)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    match posting.company.as_deref().map(strip_html).filter(|c| !c.is_empty()) {
        Some(company) => format!("{} at {}", position, company),
        None => position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(position: &str, tags: &[&str]) -> JobPosting {
        JobPosting {
            position: Some(position.to_string()),
            url: Some("https://example.com/job".to_string()),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            company: None,
            description: None,
            date: None,
            epoch: None,
        }
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let keywords = vec!["rust".to_string(), "devops".to_string()];
        assert!(matches_keywords(&posting("Senior RUST Engineer", &[]), &keywords));
        assert!(matches_keywords(&posting("SRE", &["DevOps", "aws"]), &keywords));
        assert!(!matches_keywords(&posting("Account Manager", &["sales"]), &keywords));
    }

    #[test]
    fn title_includes_company_when_present() {
        let mut p = posting("Backend Engineer", &[]);
        p.company = Some("Acme".to_string());
        assert_eq!(posting_title(&p), "Backend Engineer at Acme");
        p.company = None;
        assert_eq!(posting_title(&p), "Backend Engineer");
    }
}
