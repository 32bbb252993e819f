use super::core::Database;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            -- Raw items staged for summarization. Append-only audit trail;
            -- re-fetching the same (source_id, link) within a day is a no-op.
            CREATE TABLE IF NOT EXISTS accumulated_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                title TEXT NOT NULL,
                link TEXT NOT NULL,
                normalized_link TEXT NOT NULL,
                comments_url TEXT,
                content TEXT,
                published_at INTEGER,
                date TEXT NOT NULL,
                summarized_at TEXT,
                UNIQUE(source_id, normalized_link)
            );
            CREATE INDEX IF NOT EXISTS idx_accumulated_date ON accumulated_items (date);
            CREATE INDEX IF NOT EXISTS idx_accumulated_summarized ON accumulated_items (summarized_at);

            CREATE TABLE IF NOT EXISTS digests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL UNIQUE,
                item_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS digest_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                digest_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                why_it_matters TEXT,
                source_name TEXT NOT NULL,
                source_url TEXT NOT NULL,
                comments_url TEXT,
                published_at INTEGER,
                position INTEGER NOT NULL,
                comment_summary TEXT,
                comment_count INTEGER,
                comment_score INTEGER,
                comment_summary_source TEXT,
                FOREIGN KEY (digest_id) REFERENCES digests (id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_digest_items_digest_id ON digest_items (digest_id);

            -- One row per source, upserted after every fetch attempt.
            CREATE TABLE IF NOT EXISTS source_health (
                source_id TEXT PRIMARY KEY,
                last_success_at TEXT,
                last_error_at TEXT,
                last_error TEXT,
                item_count INTEGER NOT NULL DEFAULT 0,
                consecutive_failures INTEGER NOT NULL DEFAULT 0
            );

            -- Append-only audit of every LLM call, success or failure.
            CREATE TABLE IF NOT EXISTS ai_usage (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                model TEXT NOT NULL,
                provider TEXT NOT NULL,
                input_tokens INTEGER,
                output_tokens INTEGER,
                total_tokens INTEGER,
                latency_ms INTEGER,
                was_fallback INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                status TEXT NOT NULL
            );
            "#,
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
