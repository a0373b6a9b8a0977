use async_trait::async_trait;
use chrono::Utc;
use exam_core::model::SessionKey;
use sqlx::Row;

use super::SqliteRepository;
use crate::repository::{ProgressStore, StorageError};

fn unavailable(err: sqlx::Error) -> StorageError {
    StorageError::Unavailable(err.to_string())
}

#[async_trait]
impl ProgressStore for SqliteRepository {
    async fn get(&self, key: &SessionKey) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT payload FROM progress_snapshots WHERE key = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        row.map(|row| {
            row.try_get::<String, _>("payload")
                .map_err(|err| StorageError::Serialization(err.to_string()))
        })
        .transpose()
    }

    async fn set(&self, key: &SessionKey, payload: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO progress_snapshots (key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key.as_str())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        tracing::trace!(key = %key, bytes = payload.len(), "progress snapshot stored");
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM progress_snapshots WHERE key = ?1")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
