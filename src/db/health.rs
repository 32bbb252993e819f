use sqlx::Row;
use tracing::debug;

use super::core::Database;
use crate::sources::SourceFetchResult;
use crate::TARGET_DB;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct SourceHealthRecord {
    pub source_id: String,
    pub last_success_at: Option<String>,
    pub last_error_at: Option<String>,
    pub last_error: Option<String>,
    pub item_count: i64,
    pub consecutive_failures: i64,
}

impl Database {
    /// Upsert one health row per fetch attempt. Any success resets the
    /// consecutive failure counter.
    pub async fn record_source_health(
        &self,
        result: &SourceFetchResult,
    ) -> Result<(), sqlx::Error> {
        let now = chrono::Utc::now().to_rfc3339();

        if result.is_success() {
            sqlx::query(
                r#"
                INSERT INTO source_health (source_id, last_success_at, item_count, consecutive_failures)
                VALUES (?1, ?2, ?3, 0)
                ON CONFLICT(source_id) DO UPDATE SET
                    last_success_at = ?2,
                    item_count = ?3,
                    consecutive_failures = 0
                "#,
            )
            .bind(&result.source_id)
            .bind(&now)
            .bind(result.item_count as i64)
            .execute(self.pool())
            .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO source_health (source_id, last_error_at, last_error, item_count, consecutive_failures)
                VALUES (?1, ?2, ?3, 0, 1)
                ON CONFLICT(source_id) DO UPDATE SET
                    last_error_at = ?2,
                    last_error = ?3,
                    consecutive_failures = source_health.consecutive_failures + 1
                "#,
            )
            .bind(&result.source_id)
            .bind(&now)
            .bind(&result.error)
            .execute(self.pool())
            .await?;
        }

        debug!(target: TARGET_DB, "Recorded health for {}", result.source_id);
        Ok(())
    }

    pub async fn source_health(&self) -> Result<Vec<SourceHealthRecord>, sqlx::Error> {
        sqlx::query_as::<_, SourceHealthRecord>(
            "SELECT * FROM source_health ORDER BY source_id",
        )
        .fetch_all(self.pool())
        .await
    }

    pub async fn count_source_health_rows(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM source_health")
            .fetch_one(self.pool())
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(source_id: &str, count: usize) -> SourceFetchResult {
        SourceFetchResult {
            source_id: source_id.to_string(),
            item_count: count,
            error: None,
        }
    }

    fn failed(source_id: &str, error: &str) -> SourceFetchResult {
        SourceFetchResult {
            source_id: source_id.to_string(),
            item_count: 0,
            error: Some(error.to_string()),
        }
    }

    #[tokio::test]
    async fn failures_accumulate_and_success_resets() {
        let db = Database::in_memory().await;

        db.record_source_health(&failed("src", "timeout")).await.unwrap();
        db.record_source_health(&failed("src", "500")).await.unwrap();

        let health = db.source_health().await.unwrap();
        assert_eq!(health.len(), 1);
        assert_eq!(health[0].consecutive_failures, 2);
        assert_eq!(health[0].last_error.as_deref(), Some("500"));
        assert!(health[0].last_success_at.is_none());

        db.record_source_health(&ok("src", 7)).await.unwrap();
        let health = db.source_health().await.unwrap();
        assert_eq!(health[0].consecutive_failures, 0);
        assert_eq!(health[0].item_count, 7);
        // The error trail is history, not state; it survives the success.
        assert!(health[0].last_error_at.is_some());
    }
}
