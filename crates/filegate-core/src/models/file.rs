use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

use super::event::FileEvent;
use crate::config::LifecyclePolicy;
use crate::error::AppError;

/// Lifecycle status of a stored object
///
/// `Available` and `Rejected` are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "file_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Uploaded,
    Available,
    Rejected,
}

impl FileStatus {
    /// Whether the transition table permits moving from `self` to `to`.
    pub fn can_transition_to(self, to: FileStatus) -> bool {
        use FileStatus::*;
        matches!(
            (self, to),
            (Pending, Uploaded)
                | (Pending, Available)
                | (Pending, Rejected)
                | (Uploaded, Available)
                | (Uploaded, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Available | FileStatus::Rejected)
    }
}

impl Display for FileStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileStatus::Pending => write!(f, "pending"),
            FileStatus::Uploaded => write!(f, "uploaded"),
            FileStatus::Available => write!(f, "available"),
            FileStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for FileStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FileStatus::Pending),
            "uploaded" => Ok(FileStatus::Uploaded),
            "available" => Ok(FileStatus::Available),
            "rejected" => Ok(FileStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid file status: {}", s)),
        }
    }
}

/// Derive the storage key for a record: `path/file_name` with leading and
/// trailing separators trimmed from each part. Derived once at creation and
/// immutable thereafter; every backend sees the same key layout.
pub fn derive_storage_key(path: &str, file_name: &str) -> String {
    let path = path.trim_matches('/');
    let name = file_name.trim_matches('/');
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", path, name)
    }
}

/// Parameters for creating a new file record
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub file_name: String,
    pub path: String,
    /// Declared size in bytes; may be 0 when the record is created ahead of
    /// a client-direct (presigned) upload.
    pub size: i64,
    pub content_type: String,
    pub content_hash: Option<String>,
    pub provider: String,
}

/// The file lifecycle aggregate: one per logical uploaded object.
///
/// `id` and `storage_key` never change after creation. `status` only moves
/// through the transition methods below; direct assignment from outside the
/// aggregate is a bug. Each transition returns the lifecycle event it
/// raised; callers accumulate events and deliver them only after the record
/// has been durably persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct FileRecord {
    pub id: Uuid,
    pub file_name: String,
    pub path: String,
    pub storage_key: String,
    pub size: i64,
    pub content_type: String,
    pub content_hash: Option<String>,
    /// Opaque tag naming the storage backend that owns the object.
    pub provider: String,
    pub status: FileStatus,
    pub uploaded_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub scanned_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    /// Deletion tombstone. Deletion is a separate axis from `status`: the
    /// record keeps its terminal status and this marks the object as gone
    /// from storage.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter, bumped by the repository on every
    /// update. Makes the reconciler's check-then-transition atomic against
    /// duplicate notifications racing each other.
    pub version: i64,
}

impl FileRecord {
    /// Create a new record and its `file.uploaded` event.
    ///
    /// If neither validation nor scanning is enabled there is nothing left
    /// to gate serving on, so the record starts `Available`; otherwise it
    /// starts `Pending` and waits for reconciliation.
    pub fn create(
        new: NewFileRecord,
        policy: &LifecyclePolicy,
    ) -> Result<(FileRecord, FileEvent), AppError> {
        if new.size < 0 {
            return Err(AppError::PreconditionFailed(format!(
                "file size must be >= 0, got {}",
                new.size
            )));
        }
        if new.file_name.trim_matches('/').is_empty() {
            return Err(AppError::PreconditionFailed(
                "file name must not be empty".to_string(),
            ));
        }

        let status = if policy.validation_enabled || policy.scanning_enabled {
            FileStatus::Pending
        } else {
            FileStatus::Available
        };

        let record = FileRecord {
            id: Uuid::new_v4(),
            storage_key: derive_storage_key(&new.path, &new.file_name),
            file_name: new.file_name,
            path: new.path,
            size: new.size,
            content_type: new.content_type,
            content_hash: new.content_hash,
            provider: new.provider,
            status,
            uploaded_at: Utc::now(),
            validated_at: None,
            scanned_at: None,
            rejection_reason: None,
            deleted_at: None,
            version: 0,
        };
        let event = FileEvent::uploaded(&record);
        Ok((record, event))
    }

    /// Apply a status change, enforcing the transition table.
    fn transition(&mut self, to: FileStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(to) {
            return Err(AppError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Validation passed, scan still outstanding: `Pending` -> `Uploaded`.
    pub fn mark_uploaded(&mut self) -> Result<FileEvent, AppError> {
        self.transition(FileStatus::Uploaded)?;
        Ok(FileEvent::validated(self))
    }

    /// Validation passed and no scan is configured: straight to `Available`.
    pub fn mark_validated(&mut self) -> Result<FileEvent, AppError> {
        self.transition(FileStatus::Available)?;
        self.validated_at = Some(Utc::now());
        Ok(FileEvent::validated(self))
    }

    /// A clean scan completed: `Uploaded` (or `Pending`) -> `Available`.
    pub fn mark_scanned(&mut self) -> Result<FileEvent, AppError> {
        self.transition(FileStatus::Available)?;
        self.scanned_at = Some(Utc::now());
        Ok(FileEvent::scanned(self))
    }

    /// Reject the record from any non-terminal state.
    ///
    /// A non-empty, human-readable reason is required; rejection with a
    /// blank reason is a precondition error, not a transition error.
    pub fn reject(&mut self, reason: impl Into<String>) -> Result<FileEvent, AppError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(AppError::PreconditionFailed(
                "rejection requires a non-empty reason".to_string(),
            ));
        }
        self.transition(FileStatus::Rejected)?;
        self.rejection_reason = Some(reason);
        Ok(FileEvent::rejected(self))
    }

    /// Record removal of the underlying object from storage.
    ///
    /// Deletion does not change `status`; it sets the `deleted_at`
    /// tombstone and raises a `file.deleted` event.
    pub fn mark_deleted(&mut self) -> FileEvent {
        self.deleted_at = Some(Utc::now());
        FileEvent::deleted(self)
    }

    /// Whether a download or presigned-download URL may be produced.
    pub fn can_serve(&self) -> bool {
        self.status == FileStatus::Available && self.deleted_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileEventType;

    fn policy(validation: bool, scanning: bool) -> LifecyclePolicy {
        LifecyclePolicy {
            validation_enabled: validation,
            scanning_enabled: scanning,
            max_file_size_bytes: 0,
        }
    }

    fn new_record() -> NewFileRecord {
        NewFileRecord {
            file_name: "report.pdf".to_string(),
            path: "docs/2026".to_string(),
            size: 1024,
            content_type: "application/pdf".to_string(),
            content_hash: Some("abc123".to_string()),
            provider: "local".to_string(),
        }
    }

    fn pending_record() -> FileRecord {
        FileRecord::create(new_record(), &policy(true, true)).unwrap().0
    }

    #[test]
    fn test_storage_key_derivation() {
        assert_eq!(derive_storage_key("docs/2026", "report.pdf"), "docs/2026/report.pdf");
        assert_eq!(derive_storage_key("/docs/", "/report.pdf"), "docs/report.pdf");
        assert_eq!(derive_storage_key("", "report.pdf"), "report.pdf");
        assert_eq!(derive_storage_key("/", "report.pdf"), "report.pdf");
    }

    #[test]
    fn test_create_pending_when_any_gate_enabled() {
        for (v, s) in [(true, true), (true, false), (false, true)] {
            let (record, event) = FileRecord::create(new_record(), &policy(v, s)).unwrap();
            assert_eq!(record.status, FileStatus::Pending);
            assert_eq!(event.event_type, FileEventType::FileUploaded);
        }
    }

    #[test]
    fn test_create_available_when_no_gates() {
        let (record, event) = FileRecord::create(new_record(), &policy(false, false)).unwrap();
        assert_eq!(record.status, FileStatus::Available);
        assert!(record.can_serve());
        assert_eq!(event.event_type, FileEventType::FileUploaded);
        assert_eq!(event.file_id, record.id);
        assert_eq!(event.storage_key, record.storage_key);
    }

    #[test]
    fn test_create_rejects_negative_size() {
        let mut new = new_record();
        new.size = -1;
        assert!(matches!(
            FileRecord::create(new, &policy(true, true)),
            Err(AppError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_transition_table_exhaustive() {
        use FileStatus::*;
        let all = [Pending, Uploaded, Available, Rejected];
        let allowed = [
            (Pending, Uploaded),
            (Pending, Available),
            (Pending, Rejected),
            (Uploaded, Available),
            (Uploaded, Rejected),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "transition {} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_illegal_transition_carries_pair() {
        let (mut record, _) = FileRecord::create(new_record(), &policy(false, false)).unwrap();
        match record.mark_uploaded() {
            Err(AppError::InvalidStateTransition { from, to }) => {
                assert_eq!(from, FileStatus::Available);
                assert_eq!(to, FileStatus::Uploaded);
            }
            other => panic!("expected InvalidStateTransition, got {:?}", other.map(|e| e.event_type)),
        }
    }

    #[test]
    fn test_mark_uploaded_then_scanned() {
        let mut record = pending_record();
        let event = record.mark_uploaded().unwrap();
        assert_eq!(record.status, FileStatus::Uploaded);
        assert_eq!(event.event_type, FileEventType::FileValidated);
        assert!(record.validated_at.is_none());

        let event = record.mark_scanned().unwrap();
        assert_eq!(record.status, FileStatus::Available);
        assert_eq!(event.event_type, FileEventType::FileScanned);
        assert!(record.scanned_at.is_some());
        assert!(record.can_serve());
    }

    #[test]
    fn test_mark_validated_sets_timestamp() {
        let mut record = pending_record();
        let event = record.mark_validated().unwrap();
        assert_eq!(record.status, FileStatus::Available);
        assert_eq!(event.event_type, FileEventType::FileValidated);
        assert!(record.validated_at.is_some());
    }

    #[test]
    fn test_reject_from_pending_and_uploaded() {
        let mut record = pending_record();
        let event = record.reject("size mismatch").unwrap();
        assert_eq!(record.status, FileStatus::Rejected);
        assert_eq!(record.rejection_reason.as_deref(), Some("size mismatch"));
        assert_eq!(event.reason.as_deref(), Some("size mismatch"));
        assert!(!record.can_serve());

        let mut record = pending_record();
        record.mark_uploaded().unwrap();
        record.reject("malware detected: Eicar-Test-Signature").unwrap();
        assert_eq!(record.status, FileStatus::Rejected);
    }

    #[test]
    fn test_reject_requires_reason() {
        for reason in ["", "   ", "\t\n"] {
            let mut record = pending_record();
            assert!(matches!(
                record.reject(reason),
                Err(AppError::PreconditionFailed(_))
            ));
            // Status untouched on precondition failure
            assert_eq!(record.status, FileStatus::Pending);
            assert!(record.rejection_reason.is_none());
        }
    }

    #[test]
    fn test_terminal_states_refuse_everything() {
        let mut available = pending_record();
        available.mark_validated().unwrap();
        assert!(available.mark_uploaded().is_err());
        assert!(available.mark_scanned().is_err());
        assert!(available.reject("late").is_err());

        let mut rejected = pending_record();
        rejected.reject("bad").unwrap();
        assert!(rejected.mark_uploaded().is_err());
        assert!(rejected.mark_validated().is_err());
        assert!(rejected.mark_scanned().is_err());
        assert!(rejected.reject("again").is_err());
        // Original reason survives the failed second reject
        assert_eq!(rejected.rejection_reason.as_deref(), Some("bad"));
    }

    #[test]
    fn test_mark_deleted_is_not_a_status_change() {
        let mut record = pending_record();
        record.mark_validated().unwrap();
        let event = record.mark_deleted();
        assert_eq!(event.event_type, FileEventType::FileDeleted);
        assert_eq!(record.status, FileStatus::Available);
        assert!(record.deleted_at.is_some());
        // Tombstoned records are no longer servable
        assert!(!record.can_serve());
    }
}
