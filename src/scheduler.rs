//! Scheduled digest generation loop.

use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::pipeline::{self, DigestOutcome, PipelineContext};

/// Periodically trigger digest generation. Generation is idempotent per
/// date, so waking up again after today's digest exists is a cheap no-op.
/// There is no synchronous caller on this path; outcomes are only logged.
pub async fn digest_loop(ctx: Arc<PipelineContext>, interval: Duration) {
    info!("Digest scheduler running every {}s", interval.as_secs());

    loop {
        match pipeline::generate_digest(&ctx).await {
            Ok(DigestOutcome::Created {
                date, item_count, ..
            }) => {
                info!("Scheduled run created digest for {} with {} items", date, item_count);
            }
            Ok(DigestOutcome::Duplicate { date }) => {
                info!("Scheduled run skipped; digest for {} exists", date);
            }
            Ok(DigestOutcome::NothingNew { date }) => {
                info!("Scheduled run found nothing new for {}", date);
            }
            Err(err) => {
                error!("Scheduled digest run failed: {:#}", err);
            }
        }

        sleep(interval).await;
    }
}
