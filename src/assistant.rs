//! Interactive digest assistant: rate-limited Q&A over today's digest.

use anyhow::Result;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::llm::complete_with_failover;
use crate::pipeline::{today, PipelineContext};
use crate::prompts;

const WINDOW_MILLIS: i64 = 24 * 60 * 60 * 1000;
const MAX_REQUESTS_PER_WINDOW: usize = 5;

/// Fixed-window request counter keyed by caller fingerprint. The map entry
/// API serializes check-then-insert per key, so concurrent requests from
/// the same fingerprint cannot both slip under the limit.
#[derive(Default)]
pub struct RateLimiter {
    requests: DashMap<String, Vec<i64>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter::default()
    }

    /// Returns whether the request is allowed, recording it if so. Entries
    /// older than the window are pruned on access.
    pub fn check_and_record(&self, fingerprint: &str, now_millis: i64) -> bool {
        let mut entry = self.requests.entry(fingerprint.to_string()).or_default();
        entry.retain(|&at| now_millis - at < WINDOW_MILLIS);

        if entry.len() >= MAX_REQUESTS_PER_WINDOW {
            debug!("Rate limit hit for fingerprint {}", fingerprint);
            return false;
        }
        entry.push(now_millis);
        true
    }
}

/// Answer a reader question against today's digest. The rate limit must be
/// checked by the caller before any AI work happens.
pub async fn answer_question(ctx: &PipelineContext, question: &str) -> Result<String> {
    let date = today();
    let Some(digest) = ctx.db.digest_for_date(&date).await? else {
        return Ok("No digest has been published yet today.".to_string());
    };

    let items = ctx.db.digest_items(digest.id).await?;
    let mut block = String::new();
    for item in &items {
        block.push_str(&format!(
            "[{}] {} — {}\n",
            item.category, item.title, item.summary
        ));
    }

    let prompt = prompts::assistant_prompt(&block, question);
    complete_with_failover(&ctx.db, &ctx.providers, &prompt, 512, 0.3)
        .await
        .map(|answer| answer.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("No provider could answer the question"))
}

/// Current time for rate limiting; a parameter on `check_and_record` so
/// tests can drive the clock.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_five_requests_per_window() {
        let limiter = RateLimiter::new();
        let now = 1_754_500_000_000;

        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            assert!(limiter.check_and_record("fp-1", now));
        }
        assert!(!limiter.check_and_record("fp-1", now));
        // A different fingerprint is unaffected.
        assert!(limiter.check_and_record("fp-2", now));
    }

    #[test]
    fn window_expiry_frees_capacity() {
        let limiter = RateLimiter::new();
        let start = 1_754_500_000_000;

        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            assert!(limiter.check_and_record("fp", start));
        }
        assert!(!limiter.check_and_record("fp", start + 1000));
        // Just past the 24h window the oldest entries are pruned.
        assert!(limiter.check_and_record("fp", start + WINDOW_MILLIS + 1));
    }
}
