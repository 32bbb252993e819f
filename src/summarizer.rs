//! AI summarization engine: prompt construction, provider failover,
//! response validation and recovery, per-category output limits.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::db::{AccumulatedItem, NewDigestItem};
use crate::llm::{LlmError, LlmProvider, UsageRecord, UsageStatus};
use crate::prompts;
use crate::sources::{Category, SourceRegistry};
use crate::TARGET_LLM_REQUEST;

const MAX_OUTPUT_TOKENS: u32 = 4096;
const TEMPERATURE: f32 = 0.2;
// Bounded per-item preview so forty sources can't blow up the prompt.
const PREVIEW_CHARS: usize = 200;

/// Engine failure that still surfaces the usage records accumulated before
/// the failure, so the cost of failed attempts is not lost.
#[derive(Debug)]
pub struct DigestError {
    pub message: String,
    pub usage: Vec<UsageRecord>,
}

impl fmt::Display for DigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DigestError {}

#[derive(Debug, Default)]
pub struct SummarizeOutcome {
    pub items: Vec<NewDigestItem>,
    pub usage: Vec<UsageRecord>,
}

/// One validated element of the model response.
#[derive(Debug)]
struct SelectedElement {
    item_index: usize,
    title: String,
    summary: String,
    why_it_matters: Option<String>,
    category: String,
}

pub struct Summarizer {
    providers: Vec<LlmProvider>,
}

impl Summarizer {
    pub fn new(providers: Vec<LlmProvider>) -> Self {
        Summarizer { providers }
    }

    /// Summarize one category group of curated items into digest items.
    /// Providers are tried in chain order until one yields a parseable
    /// response; every attempt appends a usage record.
    pub async fn summarize(
        &self,
        items: &[AccumulatedItem],
        registry: &SourceRegistry,
        categories: &[Category],
    ) -> Result<SummarizeOutcome, DigestError> {
        // Zero input items for a category is a skip, not an error.
        if items.is_empty() {
            return Ok(SummarizeOutcome::default());
        }
        if self.providers.is_empty() {
            return Err(DigestError {
                message: "No LLM providers configured".to_string(),
                usage: Vec::new(),
            });
        }

        let limits = category_limits(registry, categories);
        let max_items: usize = limits.values().sum();
        let prompt = prompts::digest_selection_prompt(
            &build_item_block(items, registry),
            max_items,
            &limits_description(&limits),
        );

        let mut usage: Vec<UsageRecord> = Vec::new();
        let mut last_error = String::new();

        for (attempt, provider) in self.providers.iter().enumerate() {
            let was_fallback = attempt > 0;
            if was_fallback {
                info!(target: TARGET_LLM_REQUEST, "Falling back to provider {}", provider.name());
            }

            match provider
                .complete(None, &prompt, MAX_OUTPUT_TOKENS, TEMPERATURE)
                .await
            {
                Ok(completion) => {
                    usage.push(success_record(provider, was_fallback, &completion));

                    match process_response(&completion.text, items, registry, &limits) {
                        Ok(selected) => {
                            info!(
                                target: TARGET_LLM_REQUEST,
                                "Provider {} selected {} of {} items",
                                provider.name(),
                                selected.len(),
                                items.len()
                            );
                            return Ok(SummarizeOutcome { items: selected, usage });
                        }
                        Err(parse_err) => {
                            warn!(
                                target: TARGET_LLM_REQUEST,
                                "Unusable response from {}: {}", provider.name(), parse_err
                            );
                            last_error = parse_err;
                        }
                    }
                }
                Err(err) => {
                    warn!(target: TARGET_LLM_REQUEST, "Provider {} failed: {}", provider.name(), err);
                    usage.push(failure_record(provider, was_fallback, &err));
                    last_error = err.message().to_string();
                }
            }
        }

        Err(DigestError {
            message: format!("All providers exhausted: {}", last_error),
            usage,
        })
    }
}

fn success_record(
    provider: &LlmProvider,
    was_fallback: bool,
    completion: &crate::llm::Completion,
) -> UsageRecord {
    UsageRecord {
        model: provider.model().to_string(),
        provider: provider.name().to_string(),
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
        total_tokens: match (completion.input_tokens, completion.output_tokens) {
            (Some(i), Some(o)) => Some(i + o),
            _ => None,
        },
        latency_ms: Some(completion.latency_ms),
        was_fallback,
        error: None,
        status: UsageStatus::Success,
    }
}

fn failure_record(provider: &LlmProvider, was_fallback: bool, err: &LlmError) -> UsageRecord {
    UsageRecord {
        model: provider.model().to_string(),
        provider: provider.name().to_string(),
        input_tokens: None,
        output_tokens: None,
        total_tokens: None,
        latency_ms: None,
        was_fallback,
        error: Some(err.message().to_string()),
        status: err.status(),
    }
}

/// Candidate block shown to the model: items grouped by source, each line
/// numbered with its index into the input list.
fn build_item_block(items: &[AccumulatedItem], registry: &SourceRegistry) -> String {
    let mut groups: Vec<(&str, Vec<(usize, &AccumulatedItem)>)> = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match groups.iter_mut().find(|(id, _)| *id == item.source_id) {
            Some((_, group)) => group.push((index, item)),
            None => groups.push((item.source_id.as_str(), vec![(index, item)])),
        }
    }

    let mut block = String::new();
    for (source_id, group) in groups {
        block.push_str(&format!("### {}\n", registry.display_name(source_id)));
        for (index, item) in group {
            match &item.content {
                Some(content) => {
                    let preview: String = content.chars().take(PREVIEW_CHARS).collect();
                    block.push_str(&format!("[{}] {} — {}\n", index, item.title, preview));
                }
                None => block.push_str(&format!("[{}] {}\n", index, item.title)),
            }
        }
        block.push('\n');
    }
    block
}

fn category_limits(registry: &SourceRegistry, categories: &[Category]) -> HashMap<String, usize> {
    categories
        .iter()
        .map(|c| (c.as_str().to_string(), registry.limit_for(*c)))
        .collect()
}

fn limits_description(limits: &HashMap<String, usize>) -> String {
    let mut entries: Vec<(&String, &usize)> = limits.iter().collect();
    entries.sort();
    entries
        .iter()
        .map(|(category, limit)| format!("{}: up to {}", category, limit))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full response post-processing: fence stripping, parse with truncation
/// recovery, per-element validation, category caps, and mapping back to the
/// input items. Only a completely unusable response is an error.
fn process_response(
    response: &str,
    items: &[AccumulatedItem],
    registry: &SourceRegistry,
    limits: &HashMap<String, usize>,
) -> Result<Vec<NewDigestItem>, String> {
    let body = strip_code_fences(response);
    let elements = parse_json_array(body)?;
    let selected = validate_elements(elements, items.len(), limits);

    // The model is never trusted with URLs: source fields are recovered
    // from the original input item through item_index.
    Ok(selected
        .into_iter()
        .map(|element| {
            let input = &items[element.item_index];
            NewDigestItem {
                category: element.category,
                title: element.title,
                summary: element.summary,
                why_it_matters: element.why_it_matters,
                source_name: registry.display_name(&input.source_id),
                source_url: input.link.clone(),
                comments_url: input.comments_url.clone(),
                published_at: input.published_at,
            }
        })
        .collect())
}

/// Strip a Markdown code-fence wrapper if the model added one.
fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(without_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Opening fence may carry a language tag; drop that first line.
    let without_open = match without_open.find('\n') {
        Some(newline) => &without_open[newline + 1..],
        None => without_open,
    };
    without_open.trim_end().strip_suffix("```").unwrap_or(without_open).trim()
}

fn parse_json_array(body: &str) -> Result<Vec<Value>, String> {
    match serde_json::from_str::<Vec<Value>>(body) {
        Ok(values) => Ok(values),
        Err(first_err) => {
            // Token-limit truncation chops the tail off mid-element; trim
            // to the last complete object and close the array.
            if let Some(recovered) = recover_truncated(body) {
                if let Ok(values) = serde_json::from_str::<Vec<Value>>(&recovered) {
                    debug!(target: TARGET_LLM_REQUEST, "Recovered truncated response ({} elements)", values.len());
                    return Ok(values);
                }
            }
            Err(format!("Response is not a JSON array: {}", first_err))
        }
    }
}

fn recover_truncated(body: &str) -> Option<String> {
    let end = body.rfind('}')?;
    let mut recovered = body[..=end].to_string();
    recovered.push(']');
    Some(recovered)
}

/// Drop malformed elements individually and enforce per-category caps in
/// response order (first seen wins).
fn validate_elements(
    elements: Vec<Value>,
    input_len: usize,
    limits: &HashMap<String, usize>,
) -> Vec<SelectedElement> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut selected = Vec::new();

    for element in elements {
        let Some(item_index) = element.get("item_index").and_then(Value::as_u64) else {
            debug!(target: TARGET_LLM_REQUEST, "Dropping element without numeric item_index");
            continue;
        };
        let item_index = item_index as usize;
        if item_index >= input_len {
            debug!(target: TARGET_LLM_REQUEST, "Dropping element with out-of-range index {}", item_index);
            continue;
        }

        let title = element.get("title").and_then(Value::as_str);
        let summary = element.get("summary").and_then(Value::as_str);
        let category = element.get("category").and_then(Value::as_str);
        let source_name = element.get("source_name").and_then(Value::as_str);
        let (Some(title), Some(summary), Some(category), Some(_)) =
            (title, summary, category, source_name)
        else {
            debug!(target: TARGET_LLM_REQUEST, "Dropping element missing required fields");
            continue;
        };

        let Some(&limit) = limits.get(category) else {
            debug!(target: TARGET_LLM_REQUEST, "Dropping element with unknown category {}", category);
            continue;
        };
        let count = counts.entry(category.to_string()).or_insert(0);
        if *count >= limit {
            continue;
        }
        *count += 1;

        selected.push(SelectedElement {
            item_index,
            title: title.to_string(),
            summary: summary.to_string(),
            why_it_matters: element
                .get("why_it_matters")
                .and_then(Value::as_str)
                .map(str::to_string),
            category: category.to_string(),
        });
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{Source, SourceType};

    fn fixture_registry() -> SourceRegistry {
        SourceRegistry::new(vec![
            Source::new("blog", "The Blog", SourceType::Feed, "https://b/rss", Category::Ai),
            Source::new("board", "The Board", SourceType::JobBoard, "https://b/api", Category::Jobs),
        ])
    }

    fn input(source_id: &str, link: &str) -> AccumulatedItem {
        AccumulatedItem {
            id: 1,
            source_id: source_id.to_string(),
            title: "Input title".to_string(),
            link: link.to_string(),
            normalized_link: link.to_string(),
            comments_url: None,
            content: Some("Body content for preview".to_string()),
            published_at: Some(1_754_300_000_000),
            date: "2026-08-06".to_string(),
            summarized_at: None,
        }
    }

    fn ai_limits() -> HashMap<String, usize> {
        HashMap::from([("ai".to_string(), 10)])
    }

    #[test]
    fn strips_code_fence_wrappers() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("[1, 2]"), "[1, 2]");
    }

    #[test]
    fn recovers_truncated_arrays() {
        let truncated = r#"[{"item_index": 0, "title": "t", "summary": "s", "category": "ai", "source_name": "n"}, {"item_index": 1, "ti"#;
        let values = parse_json_array(truncated).unwrap();
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn unrecoverable_garbage_is_an_error() {
        assert!(parse_json_array("no json here").is_err());
    }

    #[test]
    fn drops_out_of_range_index_and_missing_fields() {
        let elements = serde_json::from_str::<Vec<Value>>(
            r#"[
                {"item_index": 99, "title": "t", "summary": "s", "category": "ai", "source_name": "n"},
                {"item_index": 0, "title": "t", "category": "ai", "source_name": "n"},
                {"item_index": 1, "title": "ok", "summary": "s", "category": "ai", "source_name": "n"}
            ]"#,
        )
        .unwrap();

        let selected = validate_elements(elements, 3, &ai_limits());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].item_index, 1);
        assert_eq!(selected[0].title, "ok");
    }

    #[test]
    fn category_caps_are_first_seen_wins() {
        let elements: Vec<Value> = (0..12)
            .map(|i| {
                serde_json::json!({
                    "item_index": i,
                    "title": format!("t{}", i),
                    "summary": "s",
                    "category": "ai",
                    "source_name": "n"
                })
            })
            .collect();

        let selected = validate_elements(elements, 12, &ai_limits());
        assert_eq!(selected.len(), 10);
        let indices: Vec<usize> = selected.iter().map(|e| e.item_index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn unknown_category_is_dropped() {
        let elements = serde_json::from_str::<Vec<Value>>(
            r#"[{"item_index": 0, "title": "t", "summary": "s", "category": "crypto", "source_name": "n"}]"#,
        )
        .unwrap();
        assert!(validate_elements(elements, 1, &ai_limits()).is_empty());
    }

    #[test]
    fn source_url_comes_from_input_not_model() {
        let registry = fixture_registry();
        let items = vec![input("blog", "https://b/article-1")];
        let response = r#"[{"item_index": 0, "title": "Rewritten", "summary": "s",
            "why_it_matters": "w", "category": "ai", "source_name": "Totally Invented"}]"#;

        let digest_items = process_response(response, &items, &registry, &ai_limits()).unwrap();
        assert_eq!(digest_items.len(), 1);
        assert_eq!(digest_items[0].source_url, "https://b/article-1");
        assert_eq!(digest_items[0].source_name, "The Blog");
        assert_eq!(digest_items[0].published_at, Some(1_754_300_000_000));
        assert_eq!(digest_items[0].why_it_matters.as_deref(), Some("w"));
    }

    #[test]
    fn item_block_groups_by_source_with_indices() {
        let registry = fixture_registry();
        let items = vec![
            input("blog", "https://b/1"),
            input("board", "https://b/2"),
            input("blog", "https://b/3"),
        ];

        let block = build_item_block(&items, &registry);
        assert!(block.contains("### The Blog"));
        assert!(block.contains("### The Board"));
        assert!(block.contains("[0]"));
        assert!(block.contains("[2]"));
        // Preview is bounded.
        assert!(!block.contains(&"x".repeat(PREVIEW_CHARS + 1)));
    }

    #[test]
    fn failover_accounting_marks_second_attempt() {
        // The usage-record constructors implement the accounting rule: one
        // record per attempt, fallback flagged from the second attempt on.
        let provider = LlmProvider::Ollama {
            client: ollama_rs::Ollama::new("http://localhost".to_string(), 11434),
            model: "llama3.1".to_string(),
        };

        let failure = failure_record(&provider, false, &LlmError::RateLimited("429".to_string()));
        assert_eq!(failure.status, UsageStatus::RateLimited);
        assert!(!failure.was_fallback);
        assert_eq!(failure.error.as_deref(), Some("429"));

        let completion = crate::llm::Completion {
            text: "[]".to_string(),
            input_tokens: Some(100),
            output_tokens: Some(50),
            latency_ms: 1200,
        };
        let success = success_record(&provider, true, &completion);
        assert_eq!(success.status, UsageStatus::Success);
        assert!(success.was_fallback);
        assert_eq!(success.total_tokens, Some(150));
    }
}
