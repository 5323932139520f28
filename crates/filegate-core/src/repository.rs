//! Persistence collaborator interface
//!
//! The file lifecycle core does not implement in-memory mutual exclusion
//! across records; per-record serialization of transitions is delegated to
//! the repository through the `version` precondition on `update`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::FileRecord;

/// Repository for `FileRecord` aggregates.
///
/// Implementations must treat `update` as conditional on the record's
/// `version` field: a concurrent writer that got there first leaves the
/// caller with `AppError::Conflict`, never a silent lost update.
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, AppError>;

    async fn get_by_storage_key(&self, storage_key: &str)
        -> Result<Option<FileRecord>, AppError>;

    async fn get_by_hash(&self, content_hash: &str) -> Result<Option<FileRecord>, AppError>;

    async fn exists_by_hash(&self, content_hash: &str) -> Result<bool, AppError>;

    /// Insert a new record. The storage key is unique; inserting a second
    /// record under the same key is an error.
    async fn add(&self, record: &FileRecord) -> Result<(), AppError>;

    /// Update an existing record iff its stored version matches
    /// `record.version`; bumps the version on success. Returns
    /// `AppError::Conflict` when the precondition fails.
    async fn update(&self, record: &FileRecord) -> Result<(), AppError>;

    /// Update several records atomically: either every row is written or
    /// none are. Each row carries the same version precondition as
    /// `update`.
    async fn update_batch(&self, records: &[FileRecord]) -> Result<(), AppError>;
}
