use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use std::str::FromStr;
use tokio::time::Duration;
use tracing::info;

use crate::TARGET_DB;

/// Maximum statements bundled into one write transaction; the backing
/// store rejects larger batches.
pub const MAX_BATCH_STATEMENTS: usize = 100;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Get access to the database pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        info!(target: TARGET_DB, "Creating database pool for: {}", database_url);

        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite://{}", database_url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        let db = Database { pool };
        db.initialize_schema().await?;

        info!(target: TARGET_DB, "Database pool created");
        Ok(db)
    }

    /// An isolated in-memory database for tests.
    #[cfg(test)]
    pub async fn in_memory() -> Self {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("in-memory connect options");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .expect("in-memory pool");

        let db = Database { pool };
        db.initialize_schema().await.expect("schema init");
        db
    }
}
