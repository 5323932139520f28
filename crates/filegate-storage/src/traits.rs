//! Storage abstraction trait
//!
//! This module defines the `Storage` trait the lifecycle core consumes.
//! The core itself only calls `get_metadata` and `remove`/`remove_batch`;
//! the orchestrator additionally drives `upload`, `download` and the
//! presign operations without interpreting their results.

use async_trait::async_trait;
use filegate_core::models::ActualMetadata;
use std::time::Duration;
use thiserror::Error;

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
}

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A key that could not be removed during a batch removal.
#[derive(Debug)]
pub struct BatchRemoveFailure {
    pub key: String,
    pub error: StorageError,
}

/// Storage abstraction trait
///
/// All storage backends must implement this trait. The lifecycle core works
/// against trait objects and never couples to a concrete backend.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload an object under the given storage key.
    async fn upload(&self, storage_key: &str, content_type: &str, data: Vec<u8>)
        -> StorageResult<()>;

    /// Download an object by its storage key.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Remove an object by its storage key.
    async fn remove(&self, storage_key: &str) -> StorageResult<()>;

    /// Remove several objects, collecting per-key failures instead of
    /// aborting on the first.
    ///
    /// The default implementation iterates `remove`; backends with true
    /// batch semantics override it.
    async fn remove_batch(&self, storage_keys: &[String]) -> Vec<BatchRemoveFailure> {
        let mut failures = Vec::new();
        for key in storage_keys {
            if let Err(error) = self.remove(key).await {
                failures.push(BatchRemoveFailure {
                    key: key.clone(),
                    error,
                });
            }
        }
        failures
    }

    /// Fetch complete object metadata for a storage key.
    async fn get_metadata(&self, storage_key: &str) -> StorageResult<ActualMetadata>;

    /// Check if an object exists.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Backend reachability probe. Never errors, only reports a boolean.
    async fn health(&self) -> bool;

    /// Generate a presigned/temporary URL for direct download.
    async fn presigned_get_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Generate a presigned PUT URL for client-direct uploads. Backends
    /// without presign support return a `ConfigError`.
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
