//! End-to-end digest flows: generate, rebuild, and incremental summarize.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::curation::{dedupe, split_jobs_and_news};
use crate::db::{Database, NewDigestItem};
use crate::llm::{build_provider_chain, LlmProvider};
use crate::sources::{client, fetch_all, Category, SourceRegistry};
use crate::summarizer::Summarizer;

/// Everything a pipeline run needs, built once at startup and shared.
pub struct PipelineContext {
    pub db: Database,
    pub http: reqwest::Client,
    pub registry: SourceRegistry,
    pub providers: Vec<LlmProvider>,
}

impl PipelineContext {
    pub async fn new(config: &AppConfig, registry: SourceRegistry) -> Result<Self> {
        Ok(PipelineContext {
            db: Database::new(&config.database_path).await?,
            http: client::create_http_client()?,
            registry,
            providers: build_provider_chain(&config.providers),
        })
    }
}

/// Outcome of a digest trigger, serialized directly into endpoint replies.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DigestOutcome {
    Created {
        date: String,
        digest_id: i64,
        item_count: usize,
        /// Per-category failures that did not abort the other category.
        category_errors: Vec<String>,
    },
    Duplicate {
        date: String,
    },
    /// Everything in the window was already published; success with zero
    /// output, distinct from a failed fetch phase.
    NothingNew {
        date: String,
    },
}

pub fn today() -> String {
    Utc::now().date_naive().to_string()
}

/// Idempotent daily generation: no-op if today's digest already exists.
pub async fn generate_digest(ctx: &PipelineContext) -> Result<DigestOutcome> {
    let date = today();
    if ctx.db.digest_for_date(&date).await?.is_some() {
        info!("Digest for {} already exists, skipping generation", date);
        return Ok(DigestOutcome::Duplicate { date });
    }

    run_fetch_phase(ctx, &date).await?;
    summarize_into_digest(ctx, &date, false).await
}

/// Delete-then-regenerate for the current date only.
pub async fn rebuild_digest(ctx: &PipelineContext) -> Result<DigestOutcome> {
    let date = today();
    if ctx.db.delete_digest(&date).await? {
        info!("Rebuilding digest for {}", date);
    }

    run_fetch_phase(ctx, &date).await?;
    // The deleted digest consumed its inputs; rebuild re-reads the whole
    // accumulation window regardless of summarized markers.
    summarize_into_digest(ctx, &date, true).await
}

/// Incremental summarize: append newly accumulated items to today's
/// digest, creating it if absent. No fetch phase.
pub async fn summarize_incremental(ctx: &PipelineContext) -> Result<DigestOutcome> {
    let date = today();
    summarize_into_digest(ctx, &date, false).await
}

/// Fetch every source, persist health telemetry, and stage the raw items.
/// Zero items across the entire fetch phase is terminal for the run.
async fn run_fetch_phase(ctx: &PipelineContext, date: &str) -> Result<()> {
    let output = fetch_all(&ctx.http, &ctx.registry).await;

    for result in &output.health {
        if let Err(err) = ctx.db.record_source_health(result).await {
            error!("Failed to record health for {}: {}", result.source_id, err);
        }
    }

    if output.items.is_empty() {
        return Err(anyhow::anyhow!(
            "All sources failed: fetch phase produced zero raw items"
        ));
    }

    let inserted = ctx.db.store_raw_items(&output.items, date).await?;
    if inserted == 0 {
        // Post-write verification: a zero-row write after a non-empty fetch
        // is either an all-duplicate refetch or a silently failing store.
        warn!(
            "Stored 0 of {} fetched items for {}; all were previously accumulated",
            output.items.len(),
            date
        );
    } else {
        info!("Accumulated {} new items for {}", inserted, date);
    }

    Ok(())
}

async fn summarize_into_digest(
    ctx: &PipelineContext,
    date: &str,
    include_summarized: bool,
) -> Result<DigestOutcome> {
    let window = if include_summarized {
        ctx.db.load_recent_raw_items(date).await?
    } else {
        ctx.db.load_unsummarized_recent(date).await?
    };

    let recent_keys = ctx.db.recent_digest_item_keys(date, 7).await?;
    let deduped = dedupe(window, &recent_keys);
    if deduped.is_empty() {
        info!("Nothing new to summarize for {}", date);
        return Ok(DigestOutcome::NothingNew { date: date.to_string() });
    }

    let (job_items, news_items) = split_jobs_and_news(deduped, &ctx.registry);
    let summarizer = Summarizer::new(ctx.providers.clone());

    let mut digest_items: Vec<NewDigestItem> = Vec::new();
    let mut consumed_ids: Vec<i64> = Vec::new();
    let mut category_errors: Vec<String> = Vec::new();

    // News and jobs run as separate engine invocations so a provider
    // failure in one category leaves the other intact.
    let groups: [(&str, &[Category], &Vec<_>); 2] = [
        ("news", &[Category::Ai, Category::Dev, Category::Sport], &news_items),
        ("jobs", &[Category::Jobs], &job_items),
    ];

    for (label, categories, items) in groups {
        if items.is_empty() {
            continue;
        }
        match summarizer.summarize(items, &ctx.registry, categories).await {
            Ok(outcome) => {
                ctx.db.record_ai_usage_best_effort(&outcome.usage).await;
                digest_items.extend(outcome.items);
                consumed_ids.extend(items.iter().map(|item| item.id));
            }
            Err(err) => {
                error!("Summarization failed for {} items: {}", label, err.message);
                ctx.db.record_ai_usage_best_effort(&err.usage).await;
                category_errors.push(format!("{}: {}", label, err.message));
            }
        }
    }

    if digest_items.is_empty() {
        if category_errors.is_empty() {
            return Ok(DigestOutcome::NothingNew { date: date.to_string() });
        }
        return Err(anyhow::anyhow!(
            "Digest generation failed: {}",
            category_errors.join("; ")
        ));
    }

    let digest = ctx.db.get_or_create_digest(date).await?;
    let appended = ctx.db.append_digest_items(digest.id, &digest_items).await?;
    ctx.db
        .mark_summarized(&consumed_ids, &Utc::now().to_rfc3339())
        .await?;

    let digest = ctx
        .db
        .digest_for_date(date)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Digest vanished after append"))?;
    info!(
        "Digest {} for {} now has {} items ({} appended)",
        digest.id, date, digest.item_count, appended
    );

    Ok(DigestOutcome::Created {
        date: date.to_string(),
        digest_id: digest.id,
        item_count: digest.item_count as usize,
        category_errors,
    })
}
