//! Upload-notification reconciliation
//!
//! When the storage backend reports a finished upload, the reconciler
//! compares the observed object metadata against the expected record and
//! either advances the lifecycle or rejects the record. The policy is fail
//! closed: an object that cannot be proven valid is removed from storage
//! and its record rejected, so nothing stays both unvalidated and
//! retrievable.

use std::sync::Arc;

use filegate_core::config::LifecyclePolicy;
use filegate_core::models::{ActualMetadata, FileEvent, FileRecord, FileStatus};
use filegate_core::{AppError, FileRepository};
use filegate_storage::Storage;

use crate::events::EventPublisher;

/// Result of reconciling one upload notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The record had already left `Pending`; duplicate notifications are
    /// ignored.
    AlreadyProcessed,
    /// Metadata checked out (or validation is off); the record advanced.
    Accepted,
    /// Metadata did not match; the object was removed and the record
    /// rejected.
    Rejected { reason: String },
}

pub struct Reconciler {
    repository: Arc<dyn FileRepository>,
    storage: Arc<dyn Storage>,
    publisher: Arc<dyn EventPublisher>,
    policy: LifecyclePolicy,
}

impl Reconciler {
    pub fn new(
        repository: Arc<dyn FileRepository>,
        storage: Arc<dyn Storage>,
        publisher: Arc<dyn EventPublisher>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            repository,
            storage,
            publisher,
            policy,
        }
    }

    /// Reconcile an upload notification against the expected record.
    ///
    /// `NotFound` is terminal for the caller: a notification for a key
    /// without a record means the persist-before-upload ordering was
    /// violated somewhere upstream. Concurrent duplicate notifications are
    /// serialized by the repository's version precondition; the loser of
    /// the race gets `AppError::Conflict` and can safely treat the upload
    /// as processed.
    pub async fn reconcile(
        &self,
        storage_key: &str,
        actual: ActualMetadata,
    ) -> Result<ReconcileOutcome, AppError> {
        let Some(mut record) = self.repository.get_by_storage_key(storage_key).await? else {
            return Err(AppError::NotFound(format!(
                "no file record for storage key {}",
                storage_key
            )));
        };

        if record.status != FileStatus::Pending {
            tracing::debug!(
                storage_key,
                status = %record.status,
                "Duplicate upload notification ignored"
            );
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        if !self.policy.validation_enabled {
            let event = self.advance(&mut record)?;
            self.repository.update(&record).await?;
            self.deliver(&event).await;
            return Ok(ReconcileOutcome::Accepted);
        }

        match self.validate(&record, &actual).await {
            Ok(violations) if violations.is_empty() => {
                let event = self.advance(&mut record)?;
                self.repository.update(&record).await?;
                self.deliver(&event).await;
                tracing::info!(storage_key, status = %record.status, "Upload validated");
                Ok(ReconcileOutcome::Accepted)
            }
            Ok(violations) => {
                let reason = violations.join("; ");
                self.reject_and_clean(record, reason).await
            }
            // Fail closed: a record that cannot be proven valid is
            // rejected, not left pending.
            Err(e) => {
                let reason = format!("validation error: {}", e);
                self.reject_and_clean(record, reason).await
            }
        }
    }

    /// Next transition after successful validation: `Uploaded` while a
    /// scan is still outstanding, straight to `Available` otherwise.
    fn advance(&self, record: &mut FileRecord) -> Result<FileEvent, AppError> {
        if self.policy.scanning_enabled {
            record.mark_uploaded()
        } else {
            record.mark_validated()
        }
    }

    /// Resolve the observed content type, fetching complete metadata from
    /// storage when the notification omitted it (some backends do not
    /// include the content type in upload notifications).
    async fn resolve_content_type(
        &self,
        storage_key: &str,
        actual: &ActualMetadata,
    ) -> Result<Option<String>, AppError> {
        if actual.content_type.is_some() {
            return Ok(actual.content_type.clone());
        }
        tracing::debug!(storage_key, "Notification lacks content type, fetching metadata");
        let full = self
            .storage
            .get_metadata(storage_key)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(full.content_type)
    }

    /// Compare observed metadata against the record, accumulating every
    /// violated rule instead of stopping at the first.
    async fn validate(
        &self,
        record: &FileRecord,
        actual: &ActualMetadata,
    ) -> Result<Vec<String>, AppError> {
        let content_type = self
            .resolve_content_type(&record.storage_key, actual)
            .await?;

        let mut violations = Vec::new();

        if actual.size != record.size {
            violations.push(format!(
                "size mismatch: expected {} bytes, storage reported {}",
                record.size, actual.size
            ));
        }
        if self.policy.max_file_size_bytes > 0 && actual.size > self.policy.max_file_size_bytes {
            violations.push(format!(
                "size {} exceeds configured maximum {}",
                actual.size, self.policy.max_file_size_bytes
            ));
        }
        match content_type {
            Some(ct) if ct.eq_ignore_ascii_case(&record.content_type) => {}
            Some(ct) => violations.push(format!(
                "content type mismatch: expected {}, storage reported {}",
                record.content_type, ct
            )),
            None => violations.push(format!(
                "content type missing: expected {}",
                record.content_type
            )),
        }

        Ok(violations)
    }

    /// Best-effort removal of the object, then reject the record. A failed
    /// removal is observed but never blocks the rejection.
    async fn reject_and_clean(
        &self,
        mut record: FileRecord,
        reason: String,
    ) -> Result<ReconcileOutcome, AppError> {
        if let Err(e) = self.storage.remove(&record.storage_key).await {
            tracing::warn!(
                storage_key = %record.storage_key,
                error = %e,
                "Best-effort cleanup of rejected object failed"
            );
        }
        let event = record.reject(reason.clone())?;
        self.repository.update(&record).await?;
        self.deliver(&event).await;
        tracing::warn!(storage_key = %record.storage_key, reason, "Upload rejected");
        Ok(ReconcileOutcome::Rejected { reason })
    }

    async fn deliver(&self, event: &FileEvent) {
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
