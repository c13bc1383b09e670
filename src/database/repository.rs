//! `SummaryRecordStore` repository trait and sqlite implementation,
//! grounded in the teacher's `database/repositories/session.rs`
//! `sqlx::query_as(...).bind(...).fetch_*(&self.pool).await?` pattern.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::SummaryRecord;
use crate::error::{Error, Result};

#[async_trait]
pub trait SummaryRecordStore: Send + Sync {
    async fn insert(&self, record: &SummaryRecord) -> Result<()>;
    async fn get(&self, id: &str) -> Result<SummaryRecord>;
    async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<SummaryRecord>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

pub struct SqlxSummaryRecordStore {
    pool: SqlitePool,
}

impl SqlxSummaryRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryRecordStore for SqlxSummaryRecordStore {
    async fn insert(&self, record: &SummaryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO summary_records
                (id, original_text, summary_text, created_at, user_id,
                 original_length, summary_length, processing_time_ms, error_message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.original_text)
        .bind(&record.summary_text)
        .bind(record.created_at)
        .bind(&record.user_id)
        .bind(record.original_length)
        .bind(record.summary_length)
        .bind(record.processing_time_ms)
        .bind(&record.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<SummaryRecord> {
        sqlx::query_as::<_, SummaryRecord>("SELECT * FROM summary_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("SummaryRecord", id))
    }

    async fn list_by_user(&self, user_id: &str, limit: i64) -> Result<Vec<SummaryRecord>> {
        let records = sqlx::query_as::<_, SummaryRecord>(
            "SELECT * FROM summary_records WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM summary_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_pool;

    async fn store() -> SqlxSummaryRecordStore {
        let pool = init_pool("sqlite::memory:", 1).await.unwrap();
        SqlxSummaryRecordStore::new(pool)
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = store().await;
        let record = SummaryRecord::new_success("r1", "original", "summary", Some("u1".into()), 42);
        store.insert(&record).await.unwrap();

        let fetched = store.get("r1").await.unwrap();
        assert_eq!(fetched.summary_text, "summary");
        assert_eq!(fetched.processing_time_ms, 42);
    }

    #[tokio::test]
    async fn get_missing_record_returns_not_found() {
        let store = store().await;
        let err = store.get("missing").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InternalInvariant);
    }

    #[tokio::test]
    async fn list_by_user_orders_newest_first() {
        let store = store().await;
        store
            .insert(&SummaryRecord::new_success("r1", "a", "sa", Some("u1".into()), 1))
            .await
            .unwrap();
        store
            .insert(&SummaryRecord::new_success("r2", "b", "sb", Some("u1".into()), 1))
            .await
            .unwrap();

        let records = store.list_by_user("u1", 10).await.unwrap();
        assert_eq!(records.len(), 2);
    }
}
