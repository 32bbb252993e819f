use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use herald::api;
use herald::assistant;
use herald::config::AppConfig;
use herald::enrichment;
use herald::logging::configure_logging;
use herald::pipeline::{self, today, PipelineContext};
use herald::scheduler;
use herald::sources::SourceRegistry;

#[derive(Parser)]
#[command(name = "herald", about = "Multi-source daily digest service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server and the scheduled generation loop.
    Serve,
    /// One-shot digest generation (cron entry point; idempotent per date).
    Generate,
    /// Delete and regenerate today's digest.
    Rebuild,
    /// Append newly accumulated items to today's digest.
    Summarize,
    /// Enrich today's digest items with discussion summaries.
    Enrich,
    /// Ask a question against today's digest.
    Ask { question: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let config = AppConfig::from_env()?;
    let mut registry = SourceRegistry::default();
    if !config.disabled_sources.is_empty() {
        registry
            .sources
            .retain(|source| !config.disabled_sources.contains(&source.id));
        info!("{} sources enabled after exclusions", registry.sources.len());
    }
    let ctx = Arc::new(PipelineContext::new(&config, registry).await?);

    match Cli::parse().command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let admin_token = config
                .admin_token
                .clone()
                .ok_or_else(|| anyhow::anyhow!("ADMIN_TOKEN must be set in serve mode"))?;

            let scheduler_ctx = ctx.clone();
            let interval = config.digest_interval;
            tokio::spawn(async move {
                scheduler::digest_loop(scheduler_ctx, interval).await;
            });

            api::serve(ctx, admin_token, config.port).await?;
        }
        Command::Generate => {
            let outcome = pipeline::generate_digest(&ctx).await?;
            info!("Generate outcome: {:?}", outcome);
        }
        Command::Rebuild => {
            let outcome = pipeline::rebuild_digest(&ctx).await?;
            info!("Rebuild outcome: {:?}", outcome);
        }
        Command::Summarize => {
            let outcome = pipeline::summarize_incremental(&ctx).await?;
            info!("Summarize outcome: {:?}", outcome);
        }
        Command::Enrich => {
            let report = enrichment::enrich_comments(
                &ctx.db,
                &ctx.http,
                &ctx.providers,
                &ctx.registry,
                &today(),
            )
            .await?;
            info!(
                "Enrichment: {} candidates, {} generated, {} skipped, {} failed",
                report.candidates, report.generated, report.skipped, report.failed
            );
        }
        Command::Ask { question } => {
            let answer = assistant::answer_question(&ctx, &question).await?;
            println!("{}", answer);
        }
    }

    Ok(())
}
