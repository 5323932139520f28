//! File record repository
//!
//! Postgres implementation of `FileRepository`. Updates are guarded by the
//! record's `version` column: `UPDATE .. WHERE id = .. AND version = ..`
//! with a version bump, so two writers racing on the same record cannot
//! both win; the loser sees `AppError::Conflict` and must re-read.

use async_trait::async_trait;
use filegate_core::models::FileRecord;
use filegate_core::{AppError, FileRepository};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::transaction::TransactionGuard;

const SELECT_COLUMNS: &str = "id, file_name, path, storage_key, size, content_type, \
     content_hash, provider, status, uploaded_at, validated_at, scanned_at, \
     rejection_reason, deleted_at, version";

const UPDATE_SQL: &str = "UPDATE files SET status = $2, size = $3, content_type = $4, \
     content_hash = $5, validated_at = $6, scanned_at = $7, rejection_reason = $8, \
     deleted_at = $9, version = version + 1 WHERE id = $1 AND version = $10";

async fn update_row<'e, E>(executor: E, record: &FileRecord) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let result = sqlx::query(UPDATE_SQL)
        .bind(record.id)
        .bind(record.status)
        .bind(record.size)
        .bind(&record.content_type)
        .bind(&record.content_hash)
        .bind(record.validated_at)
        .bind(record.scanned_at)
        .bind(&record.rejection_reason)
        .bind(record.deleted_at)
        .bind(record.version)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Postgres-backed file record repository
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

impl PgFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_by_storage_key(
        &self,
        storage_key: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE storage_key = $1",
            SELECT_COLUMNS
        ))
        .bind(storage_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_by_hash(&self, content_hash: &str) -> Result<Option<FileRecord>, AppError> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {} FROM files WHERE content_hash = $1 AND deleted_at IS NULL LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn exists_by_hash(&self, content_hash: &str) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM files WHERE content_hash = $1 AND deleted_at IS NULL)",
        )
        .bind(content_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists.0)
    }

    async fn add(&self, record: &FileRecord) -> Result<(), AppError> {
        let result = sqlx::query(
            "INSERT INTO files (id, file_name, path, storage_key, size, content_type, \
             content_hash, provider, status, uploaded_at, validated_at, scanned_at, \
             rejection_reason, deleted_at, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(record.id)
        .bind(&record.file_name)
        .bind(&record.path)
        .bind(&record.storage_key)
        .bind(record.size)
        .bind(&record.content_type)
        .bind(&record.content_hash)
        .bind(&record.provider)
        .bind(record.status)
        .bind(record.uploaded_at)
        .bind(record.validated_at)
        .bind(record.scanned_at)
        .bind(&record.rejection_reason)
        .bind(record.deleted_at)
        .bind(record.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::Conflict(format!(
                    "file record already exists for storage key {}",
                    record.storage_key
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, record: &FileRecord) -> Result<(), AppError> {
        let rows = update_row(&self.pool, record).await?;
        if rows == 0 {
            return Err(AppError::Conflict(format!(
                "stale version {} for file record {}",
                record.version, record.id
            )));
        }
        Ok(())
    }

    async fn update_batch(&self, records: &[FileRecord]) -> Result<(), AppError> {
        let mut tx = TransactionGuard::begin(&self.pool)
            .await
            .map_err(AppError::from)?;

        for record in records {
            let rows = update_row(&mut **tx, record).await?;
            if rows == 0 {
                // Guard drop rolls the whole batch back
                return Err(AppError::Conflict(format!(
                    "stale version {} for file record {}",
                    record.version, record.id
                )));
            }
        }

        tx.commit().await.map_err(AppError::from)?;
        tracing::debug!(count = records.len(), "Batch-updated file records");
        Ok(())
    }
}
