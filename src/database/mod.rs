//! Persistence layer for `SummaryRecord` (SPEC_FULL §6.5). Kept intentionally
//! thin: a single table, a narrow repository trait, and a sqlite-backed
//! implementation, following the teacher's sqlx repository pattern
//! (`database/repositories/session.rs`) without its heavier WAL/PRAGMA
//! tuning, since this store isn't on the batch hot path.

pub mod models;
pub mod repository;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

pub use models::SummaryRecord;
pub use repository::{SqlxSummaryRecordStore, SummaryRecordStore};

/// Database connection pool type alias.
pub type DbPool = Pool<Sqlite>;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize the sqlite connection pool, creating the database file and
/// the `summary_records` table if they don't already exist.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    let connect_options = SqliteConnectOptions::from_str(database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(connect_options)
        .await?;

    run_migrations(&pool).await?;

    tracing::info!(max_connections, "database pool initialized");
    Ok(pool)
}

/// Create the `summary_records` table if it doesn't already exist. No
/// migration framework: the schema is a single table, so an inline
/// `CREATE TABLE IF NOT EXISTS` is enough.
async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summary_records (
            id TEXT PRIMARY KEY,
            original_text TEXT NOT NULL,
            summary_text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            user_id TEXT,
            original_length INTEGER NOT NULL,
            summary_length INTEGER NOT NULL,
            processing_time_ms INTEGER NOT NULL,
            error_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_summary_records_user_id ON summary_records(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_pool_creates_table() {
        let pool = init_pool("sqlite::memory:", 1).await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM summary_records")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
