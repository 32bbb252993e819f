use chrono::{Days, NaiveDate};
use sqlx::Row;
use tracing::{debug, error};
use url::Url;
use urlnorm::UrlNormalizer;

use super::core::{Database, MAX_BATCH_STATEMENTS};
use crate::sources::RawItem;
use crate::TARGET_DB;

/// A raw item persisted in the accumulation staging area.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccumulatedItem {
    pub id: i64,
    pub source_id: String,
    pub title: String,
    pub link: String,
    /// Canonical form of `link`, the dedup key within a source.
    pub normalized_link: String,
    pub comments_url: Option<String>,
    pub content: Option<String>,
    pub published_at: Option<i64>,
    pub date: String,
    pub summarized_at: Option<String>,
}

/// Normalize a link into the stable dedup key stored alongside the source
/// id. Unparseable links fall through unchanged.
fn normalize_link(link: &str) -> String {
    match Url::parse(link) {
        Ok(parsed) => UrlNormalizer::default().compute_normalization_string(&parsed),
        Err(_) => link.to_string(),
    }
}

impl Database {
    /// Idempotent insert-or-ignore keyed on `(source_id, link)`, batched in
    /// transactions bounded by the store's statement limit. Returns the
    /// number of rows actually inserted so callers can verify the write.
    pub async fn store_raw_items(
        &self,
        items: &[RawItem],
        date: &str,
    ) -> Result<usize, sqlx::Error> {
        let mut inserted = 0usize;

        for chunk in items.chunks(MAX_BATCH_STATEMENTS) {
            let mut tx = self.pool().begin().await?;
            for item in chunk {
                if item.link.trim().is_empty() {
                    error!(target: TARGET_DB, "Skipping item with empty link from {}", item.source_id);
                    continue;
                }
                let result = sqlx::query(
                    r#"
                    INSERT INTO accumulated_items
                        (source_id, title, link, normalized_link, comments_url, content, published_at, date)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(source_id, normalized_link) DO NOTHING
                    "#,
                )
                .bind(&item.source_id)
                .bind(&item.title)
                .bind(&item.link)
                .bind(normalize_link(&item.link))
                .bind(&item.comments_url)
                .bind(&item.content)
                .bind(item.published_at)
                .bind(date)
                .execute(&mut *tx)
                .await?;
                inserted += result.rows_affected() as usize;
            }
            tx.commit().await?;
        }

        debug!(target: TARGET_DB, "Stored {} of {} raw items for {}", inserted, items.len(), date);
        Ok(inserted)
    }

    /// All accumulated items from `date` and the prior calendar day. The
    /// rolling window tolerates adapters that only fetched in an earlier
    /// cron slot.
    pub async fn load_recent_raw_items(
        &self,
        date: &str,
    ) -> Result<Vec<AccumulatedItem>, sqlx::Error> {
        self.load_window(date, false).await
    }

    /// As [`load_recent_raw_items`], restricted to rows not yet consumed by
    /// a summarization pass.
    pub async fn load_unsummarized_recent(
        &self,
        date: &str,
    ) -> Result<Vec<AccumulatedItem>, sqlx::Error> {
        self.load_window(date, true).await
    }

    async fn load_window(
        &self,
        date: &str,
        unsummarized_only: bool,
    ) -> Result<Vec<AccumulatedItem>, sqlx::Error> {
        let prior = prior_day(date);
        let sql = if unsummarized_only {
            "SELECT * FROM accumulated_items WHERE date IN (?1, ?2) AND summarized_at IS NULL ORDER BY id"
        } else {
            "SELECT * FROM accumulated_items WHERE date IN (?1, ?2) ORDER BY id"
        };

        sqlx::query_as::<_, AccumulatedItem>(sql)
            .bind(date)
            .bind(prior)
            .fetch_all(self.pool())
            .await
    }

    /// Stamp rows consumed by a summarization pass.
    pub async fn mark_summarized(
        &self,
        item_ids: &[i64],
        timestamp: &str,
    ) -> Result<(), sqlx::Error> {
        for chunk in item_ids.chunks(MAX_BATCH_STATEMENTS) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "UPDATE accumulated_items SET summarized_at = ? WHERE id IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql).bind(timestamp);
            for id in chunk {
                query = query.bind(id);
            }
            query.execute(self.pool()).await?;
        }
        Ok(())
    }

    pub async fn count_accumulated(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM accumulated_items")
            .fetch_one(self.pool())
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}

/// Prior calendar day for an ISO date string; falls back to the same day
/// on unparseable input.
fn prior_day(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .map(|d| d.to_string())
        .unwrap_or_else(|| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(source_id: &str, link: &str) -> RawItem {
        RawItem {
            source_id: source_id.to_string(),
            title: "A title".to_string(),
            link: link.to_string(),
            comments_url: None,
            content: None,
            published_at: Some(1_754_300_000_000),
        }
    }

    #[tokio::test]
    async fn storing_same_item_twice_leaves_one_row() {
        let db = Database::in_memory().await;
        let items = vec![raw("src", "https://example.com/a")];

        let first = db.store_raw_items(&items, "2026-08-06").await.unwrap();
        let second = db.store_raw_items(&items, "2026-08-06").await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert_eq!(db.count_accumulated().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn same_link_from_different_sources_is_kept() {
        let db = Database::in_memory().await;
        let items = vec![raw("src-a", "https://example.com/a"), raw("src-b", "https://example.com/a")];

        let inserted = db.store_raw_items(&items, "2026-08-06").await.unwrap();
        assert_eq!(inserted, 2);
    }

    #[tokio::test]
    async fn recent_window_spans_two_days() {
        let db = Database::in_memory().await;
        db.store_raw_items(&[raw("s", "https://example.com/today")], "2026-08-06")
            .await
            .unwrap();
        db.store_raw_items(&[raw("s", "https://example.com/yesterday")], "2026-08-05")
            .await
            .unwrap();
        db.store_raw_items(&[raw("s", "https://example.com/old")], "2026-08-01")
            .await
            .unwrap();

        let recent = db.load_recent_raw_items("2026-08-06").await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn mark_summarized_removes_from_unsummarized_load() {
        let db = Database::in_memory().await;
        db.store_raw_items(
            &[raw("s", "https://example.com/a"), raw("s", "https://example.com/b")],
            "2026-08-06",
        )
        .await
        .unwrap();

        let pending = db.load_unsummarized_recent("2026-08-06").await.unwrap();
        assert_eq!(pending.len(), 2);

        db.mark_summarized(&[pending[0].id], "2026-08-06T12:00:00Z")
            .await
            .unwrap();

        let pending = db.load_unsummarized_recent("2026-08-06").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].link, "https://example.com/b");
    }

    #[tokio::test]
    async fn batches_larger_than_statement_limit_are_chunked() {
        let db = Database::in_memory().await;
        let items: Vec<RawItem> = (0..250)
            .map(|i| raw("bulk", &format!("https://example.com/item/{}", i)))
            .collect();

        let inserted = db.store_raw_items(&items, "2026-08-06").await.unwrap();
        assert_eq!(inserted, 250);
    }
}
