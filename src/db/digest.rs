use chrono::{Days, NaiveDate};
use sqlx::Row;
use tracing::{debug, info};

use super::core::Database;
use crate::TARGET_DB;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct DigestRecord {
    pub id: i64,
    pub date: String,
    pub item_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct DigestItemRecord {
    pub id: i64,
    pub digest_id: i64,
    pub category: String,
    pub title: String,
    pub summary: String,
    pub why_it_matters: Option<String>,
    pub source_name: String,
    pub source_url: String,
    pub comments_url: Option<String>,
    pub published_at: Option<i64>,
    pub position: i64,
    pub comment_summary: Option<String>,
    pub comment_count: Option<i64>,
    pub comment_score: Option<i64>,
    pub comment_summary_source: Option<String>,
}

/// A curated item ready for persistence; `position` is assigned by the
/// store at insert time and never reused.
#[derive(Debug, Clone)]
pub struct NewDigestItem {
    pub category: String,
    pub title: String,
    pub summary: String,
    pub why_it_matters: Option<String>,
    pub source_name: String,
    pub source_url: String,
    pub comments_url: Option<String>,
    pub published_at: Option<i64>,
}

impl Database {
    /// Digest row for a date, creating it when absent.
    pub async fn get_or_create_digest(&self, date: &str) -> Result<DigestRecord, sqlx::Error> {
        sqlx::query(
            "INSERT INTO digests (date, item_count, created_at) VALUES (?1, 0, ?2) \
             ON CONFLICT(date) DO NOTHING",
        )
        .bind(date)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        let digest = self.digest_for_date(date).await?;
        digest.ok_or_else(|| sqlx::Error::RowNotFound)
    }

    pub async fn digest_for_date(&self, date: &str) -> Result<Option<DigestRecord>, sqlx::Error> {
        sqlx::query_as::<_, DigestRecord>("SELECT * FROM digests WHERE date = ?1")
            .bind(date)
            .fetch_optional(self.pool())
            .await
    }

    pub async fn list_digests(&self) -> Result<Vec<DigestRecord>, sqlx::Error> {
        sqlx::query_as::<_, DigestRecord>("SELECT * FROM digests ORDER BY date DESC")
            .fetch_all(self.pool())
            .await
    }

    pub async fn digest_items(&self, digest_id: i64) -> Result<Vec<DigestItemRecord>, sqlx::Error> {
        sqlx::query_as::<_, DigestItemRecord>(
            "SELECT * FROM digest_items WHERE digest_id = ?1 ORDER BY position",
        )
        .bind(digest_id)
        .fetch_all(self.pool())
        .await
    }

    /// Append items to a digest. Positions are dense, 0-based, and continue
    /// from the current maximum; `item_count` is kept consistent with the
    /// owned items in the same transaction.
    pub async fn append_digest_items(
        &self,
        digest_id: i64,
        items: &[NewDigestItem],
    ) -> Result<usize, sqlx::Error> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool().begin().await?;

        let next_position: i64 =
            sqlx::query("SELECT COALESCE(MAX(position) + 1, 0) AS next FROM digest_items WHERE digest_id = ?1")
                .bind(digest_id)
                .fetch_one(&mut *tx)
                .await?
                .get("next");

        for (offset, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO digest_items
                    (digest_id, category, title, summary, why_it_matters,
                     source_name, source_url, comments_url, published_at, position)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(digest_id)
            .bind(&item.category)
            .bind(&item.title)
            .bind(&item.summary)
            .bind(&item.why_it_matters)
            .bind(&item.source_name)
            .bind(&item.source_url)
            .bind(&item.comments_url)
            .bind(item.published_at)
            .bind(next_position + offset as i64)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE digests SET item_count = \
             (SELECT COUNT(*) FROM digest_items WHERE digest_id = ?1) WHERE id = ?1",
        )
        .bind(digest_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(target: TARGET_DB, "Appended {} items to digest {}", items.len(), digest_id);
        Ok(items.len())
    }

    /// Titles and source URLs of every digest item published within the
    /// trailing `days` window, used by cross-run dedup.
    pub async fn recent_digest_item_keys(
        &self,
        date: &str,
        days: u64,
    ) -> Result<Vec<(String, String)>, sqlx::Error> {
        let cutoff = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.checked_sub_days(Days::new(days)))
            .map(|d| d.to_string())
            .unwrap_or_else(|| date.to_string());

        sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT di.title, di.source_url
            FROM digest_items di
            JOIN digests d ON d.id = di.digest_id
            WHERE d.date >= ?1
            "#,
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await
    }

    /// Delete a digest and its items. Returns whether a digest existed.
    pub async fn delete_digest(&self, date: &str) -> Result<bool, sqlx::Error> {
        let Some(digest) = self.digest_for_date(date).await? else {
            return Ok(false);
        };

        let mut tx = self.pool().begin().await?;
        sqlx::query("DELETE FROM digest_items WHERE digest_id = ?1")
            .bind(digest.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM digests WHERE id = ?1")
            .bind(digest.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(target: TARGET_DB, "Deleted digest {} for {}", digest.id, date);
        Ok(true)
    }

    /// Store the outcome of a comment-enrichment attempt on one item.
    pub async fn update_comment_enrichment(
        &self,
        item_id: i64,
        comment_summary: Option<&str>,
        comment_count: Option<i64>,
        comment_score: Option<i64>,
        summary_source: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE digest_items
            SET comment_summary = ?2, comment_count = ?3, comment_score = ?4,
                comment_summary_source = ?5
            WHERE id = ?1
            "#,
        )
        .bind(item_id)
        .bind(comment_summary)
        .bind(comment_count)
        .bind(comment_score)
        .bind(summary_source)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item(title: &str, url: &str, category: &str) -> NewDigestItem {
        NewDigestItem {
            category: category.to_string(),
            title: title.to_string(),
            summary: "summary".to_string(),
            why_it_matters: None,
            source_name: "Test Source".to_string(),
            source_url: url.to_string(),
            comments_url: None,
            published_at: None,
        }
    }

    #[tokio::test]
    async fn positions_are_dense_and_continue_across_appends() {
        let db = Database::in_memory().await;
        let digest = db.get_or_create_digest("2026-08-06").await.unwrap();

        db.append_digest_items(
            digest.id,
            &[new_item("a", "https://x/1", "ai"), new_item("b", "https://x/2", "jobs")],
        )
        .await
        .unwrap();
        db.append_digest_items(digest.id, &[new_item("c", "https://x/3", "dev")])
            .await
            .unwrap();

        let items = db.digest_items(digest.id).await.unwrap();
        let positions: Vec<i64> = items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let digest = db.digest_for_date("2026-08-06").await.unwrap().unwrap();
        assert_eq!(digest.item_count, 3);
    }

    #[tokio::test]
    async fn rebuild_replaces_rather_than_merges() {
        let db = Database::in_memory().await;
        let digest = db.get_or_create_digest("2026-08-06").await.unwrap();
        db.append_digest_items(digest.id, &[new_item("old-item", "https://x/old", "ai")])
            .await
            .unwrap();

        assert!(db.delete_digest("2026-08-06").await.unwrap());
        assert!(db.digest_for_date("2026-08-06").await.unwrap().is_none());

        let rebuilt = db.get_or_create_digest("2026-08-06").await.unwrap();
        db.append_digest_items(rebuilt.id, &[new_item("new-item", "https://x/new", "ai")])
            .await
            .unwrap();

        let items = db.digest_items(rebuilt.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "new-item");
        assert_eq!(rebuilt.item_count, 0);
        let rebuilt = db.digest_for_date("2026-08-06").await.unwrap().unwrap();
        assert_eq!(rebuilt.item_count, 1);
        // Old items are gone entirely, not merely detached.
        let leftovers = db
            .recent_digest_item_keys("2026-08-06", 7)
            .await
            .unwrap()
            .iter()
            .filter(|(title, _)| title == "old-item")
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn recent_keys_respect_window() {
        let db = Database::in_memory().await;
        let recent = db.get_or_create_digest("2026-08-05").await.unwrap();
        db.append_digest_items(recent.id, &[new_item("recent", "https://x/r", "ai")])
            .await
            .unwrap();
        let ancient = db.get_or_create_digest("2026-07-01").await.unwrap();
        db.append_digest_items(ancient.id, &[new_item("ancient", "https://x/a", "ai")])
            .await
            .unwrap();

        let keys = db.recent_digest_item_keys("2026-08-06", 7).await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].0, "recent");
    }

    #[tokio::test]
    async fn enrichment_update_sets_marker_columns() {
        let db = Database::in_memory().await;
        let digest = db.get_or_create_digest("2026-08-06").await.unwrap();
        db.append_digest_items(digest.id, &[new_item("t", "https://x/1", "dev")])
            .await
            .unwrap();
        let item = &db.digest_items(digest.id).await.unwrap()[0];

        db.update_comment_enrichment(item.id, None, Some(2), Some(5), "skipped")
            .await
            .unwrap();

        let item = &db.digest_items(digest.id).await.unwrap()[0];
        assert_eq!(item.comment_summary_source.as_deref(), Some("skipped"));
        assert_eq!(item.comment_summary, None);
        assert_eq!(item.comment_score, Some(5));
    }
}
