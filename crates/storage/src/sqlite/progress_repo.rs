use async_trait::async_trait;
use lingua_core::model::{RemoteProgressRecord, UserId};

use crate::repository::{RemoteError, RemoteProgressRepository};

use super::SqliteRepository;
use super::mapping::map_progress_row;

fn net(err: sqlx::Error) -> RemoteError {
    RemoteError::Network(err.to_string())
}

#[async_trait]
impl RemoteProgressRepository for SqliteRepository {
    async fn fetch_all(&self, user_id: &UserId) -> Result<Vec<RemoteProgressRecord>, RemoteError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, tense_id, progress, status, updated_at
            FROM user_progress
            WHERE user_id = ?1
            ORDER BY tense_id
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(net)?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn upsert_many(&self, records: &[RemoteProgressRecord]) -> Result<(), RemoteError> {
        let mut tx = self.pool.begin().await.map_err(net)?;

        for record in records {
            sqlx::query(
                r"
                INSERT INTO user_progress (user_id, tense_id, progress, status, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(user_id, tense_id) DO UPDATE SET
                    progress = excluded.progress,
                    status = excluded.status,
                    updated_at = excluded.updated_at
                ",
            )
            .bind(record.user_id.as_str())
            .bind(record.tense_id.as_str())
            .bind(i64::from(record.progress.value()))
            .bind(record.status.as_str())
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(net)?;
        }

        tx.commit().await.map_err(net)?;
        Ok(())
    }
}
