use super::core::Database;
use crate::llm::UsageRecord;

impl Database {
    /// Append one audit row per LLM call, success or failure.
    pub async fn record_ai_usage(&self, entry: &UsageRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO ai_usage
                (created_at, model, provider, input_tokens, output_tokens,
                 total_tokens, latency_ms, was_fallback, error, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&entry.model)
        .bind(&entry.provider)
        .bind(entry.input_tokens.map(|t| t as i64))
        .bind(entry.output_tokens.map(|t| t as i64))
        .bind(entry.total_tokens.map(|t| t as i64))
        .bind(entry.latency_ms.map(|t| t as i64))
        .bind(entry.was_fallback)
        .bind(&entry.error)
        .bind(entry.status.as_str())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Best-effort variant: audit records must never fail the pipeline.
    pub async fn record_ai_usage_best_effort(&self, entries: &[UsageRecord]) {
        for entry in entries {
            if let Err(err) = self.record_ai_usage(entry).await {
                tracing::error!(target: crate::TARGET_DB, "Failed to record AI usage: {}", err);
            }
        }
    }
}
