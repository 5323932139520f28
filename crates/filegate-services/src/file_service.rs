//! File lifecycle orchestrator
//!
//! Thin coordinating service over the repository, storage and scanner
//! collaborators. The one ordering rule that matters: a record is durably
//! persisted before its bytes reach the storage backend, so a notification
//! arriving immediately after the upload always finds a matching record.

use std::sync::Arc;
use std::time::Duration;

use filegate_core::config::LifecyclePolicy;
use filegate_core::models::{FileRecord, FileStatus, NewFileRecord};
use filegate_core::{AppError, FileRepository};
use filegate_scan::cache::content_hash;
use filegate_scan::protocol::THREAT_UNKNOWN;
use filegate_storage::Storage;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::EventPublisher;
use crate::reconciler::ReconcileOutcome;
use crate::scanner::MalwareScanner;

/// Parameters for a server-side upload.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_name: String,
    pub path: String,
    pub content_type: String,
    pub provider: String,
    pub data: Vec<u8>,
}

pub struct FileService {
    repository: Arc<dyn FileRepository>,
    storage: Arc<dyn Storage>,
    scanner: Option<Arc<dyn MalwareScanner>>,
    publisher: Arc<dyn EventPublisher>,
    policy: LifecyclePolicy,
}

impl FileService {
    pub fn new(
        repository: Arc<dyn FileRepository>,
        storage: Arc<dyn Storage>,
        scanner: Option<Arc<dyn MalwareScanner>>,
        publisher: Arc<dyn EventPublisher>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            repository,
            storage,
            scanner,
            publisher,
            policy,
        }
    }

    /// Upload a new object.
    ///
    /// Duplicate content is refused before any storage write. The record
    /// is persisted first, then the bytes are uploaded; the `file.uploaded`
    /// event is delivered only after both succeeded.
    pub async fn upload(&self, upload: NewUpload) -> Result<FileRecord, AppError> {
        let hash = content_hash(&upload.data);
        if self.repository.exists_by_hash(&hash).await? {
            return Err(AppError::DuplicateContent(format!(
                "content of {} already stored (hash {})",
                upload.file_name, hash
            )));
        }

        let (record, event) = FileRecord::create(
            NewFileRecord {
                file_name: upload.file_name,
                path: upload.path,
                size: upload.data.len() as i64,
                content_type: upload.content_type.clone(),
                content_hash: Some(hash),
                provider: upload.provider,
            },
            &self.policy,
        )?;

        // Persist before upload; a storage notification racing this call
        // must be able to find the record.
        self.repository.add(&record).await?;
        self.storage
            .upload(&record.storage_key, &upload.content_type, upload.data)
            .await
            .map_err(|e| {
                AppError::Storage(format!("upload of {} failed: {}", record.storage_key, e))
            })?;

        self.deliver_all(std::slice::from_ref(&event)).await;
        tracing::info!(
            file_id = %record.id,
            storage_key = %record.storage_key,
            status = %record.status,
            "File uploaded"
        );
        Ok(record)
    }

    /// Scan a validated object and settle its lifecycle.
    ///
    /// Runs after reconciliation moved the record to `Uploaded`. A clean
    /// verdict makes the record `Available`; an infected one removes the
    /// object (best effort) and rejects the record. A scan that fails after
    /// exhausting its retries propagates as an error and is never treated
    /// as clean.
    pub async fn scan_stored(
        &self,
        storage_key: &str,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, AppError> {
        let Some(scanner) = &self.scanner else {
            return Err(AppError::PreconditionFailed(
                "scanning is not configured".to_string(),
            ));
        };
        let Some(mut record) = self.repository.get_by_storage_key(storage_key).await? else {
            return Err(AppError::NotFound(format!(
                "no file record for storage key {}",
                storage_key
            )));
        };

        if record.status != FileStatus::Uploaded {
            if record.status.is_terminal() {
                return Ok(ReconcileOutcome::AlreadyProcessed);
            }
            return Err(AppError::PreconditionFailed(format!(
                "file {} is {} and not ready to scan",
                record.id, record.status
            )));
        }

        let data = self.storage.download(storage_key).await.map_err(|e| {
            AppError::Storage(format!("download of {} for scan failed: {}", storage_key, e))
        })?;

        let verdict = scanner
            .scan(&data, cancel)
            .await
            .map_err(|e| AppError::Scan(format!("scan of {} failed: {}", storage_key, e)))?;

        if verdict.clean {
            let event = record.mark_scanned()?;
            self.repository.update(&record).await?;
            self.deliver_all(std::slice::from_ref(&event)).await;
            return Ok(ReconcileOutcome::Accepted);
        }

        let threat = verdict.threat.unwrap_or_else(|| THREAT_UNKNOWN.to_string());
        if let Err(e) = self.storage.remove(storage_key).await {
            tracing::warn!(
                storage_key,
                error = %e,
                "Best-effort cleanup of infected object failed"
            );
        }
        let reason = format!("malware detected: {}", threat);
        let event = record.reject(reason.clone())?;
        self.repository.update(&record).await?;
        self.deliver_all(std::slice::from_ref(&event)).await;
        tracing::warn!(storage_key, threat, "Infected upload rejected");
        Ok(ReconcileOutcome::Rejected { reason })
    }

    /// Download the object bytes; only `Available`, non-deleted records
    /// are servable.
    pub async fn download(&self, id: Uuid) -> Result<Vec<u8>, AppError> {
        let record = self.get_servable(id).await?;
        self.storage
            .download(&record.storage_key)
            .await
            .map_err(|e| {
                AppError::Storage(format!("download of {} failed: {}", record.storage_key, e))
            })
    }

    /// Produce a presigned download URL; gated like `download`.
    pub async fn presigned_download(
        &self,
        id: Uuid,
        expires_in: Duration,
    ) -> Result<String, AppError> {
        let record = self.get_servable(id).await?;
        self.storage
            .presigned_get_url(&record.storage_key, expires_in)
            .await
            .map_err(|e| {
                AppError::Storage(format!("presign of {} failed: {}", record.storage_key, e))
            })
    }

    /// Delete one object: remove from storage, tombstone the record, then
    /// deliver the `file.deleted` event.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let Some(mut record) = self.repository.get_by_id(id).await? else {
            return Err(AppError::NotFound(format!("no file record with id {}", id)));
        };
        self.storage.remove(&record.storage_key).await.map_err(|e| {
            AppError::Storage(format!("removal of {} failed: {}", record.storage_key, e))
        })?;
        let event = record.mark_deleted();
        self.repository.update(&record).await?;
        self.deliver_all(std::slice::from_ref(&event)).await;
        Ok(())
    }

    /// Delete several objects.
    ///
    /// All records are tombstoned in memory, storage removal runs as one
    /// batch call with partial failures collected, and the record updates
    /// land atomically. Events are delivered only after durable
    /// persistence; a persistence failure leaves the store untouched and
    /// delivers nothing.
    pub async fn delete_batch(&self, ids: &[Uuid]) -> Result<(), AppError> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(record) = self.repository.get_by_id(*id).await? else {
                return Err(AppError::NotFound(format!("no file record with id {}", id)));
            };
            records.push(record);
        }

        let mut events = Vec::with_capacity(records.len());
        for record in &mut records {
            events.push(record.mark_deleted());
        }

        let keys: Vec<String> = records.iter().map(|r| r.storage_key.clone()).collect();
        let failures = self.storage.remove_batch(&keys).await;
        for failure in &failures {
            tracing::warn!(
                storage_key = %failure.key,
                error = %failure.error,
                "Batch removal failed for key"
            );
        }

        self.repository.update_batch(&records).await?;
        self.deliver_all(&events).await;
        tracing::info!(
            count = records.len(),
            storage_failures = failures.len(),
            "Batch delete completed"
        );
        Ok(())
    }

    async fn get_servable(&self, id: Uuid) -> Result<FileRecord, AppError> {
        let Some(record) = self.repository.get_by_id(id).await? else {
            return Err(AppError::NotFound(format!("no file record with id {}", id)));
        };
        if !record.can_serve() {
            return Err(AppError::PreconditionFailed(format!(
                "file {} is not available for download (status {})",
                id, record.status
            )));
        }
        Ok(record)
    }

    async fn deliver_all(&self, events: &[filegate_core::models::FileEvent]) {
        for event in events {
            if let Err(e) = self.publisher.publish(event).await {
                tracing::warn!(
                    event_type = %event.event_type,
                    file_id = %event.file_id,
                    error = %e,
                    "Lifecycle event delivery failed"
                );
            }
        }
    }
}
