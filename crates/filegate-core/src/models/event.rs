use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::file::FileRecord;

/// Lifecycle event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileEventType {
    FileUploaded,
    FileValidated,
    FileScanned,
    FileRejected,
    FileDeleted,
}

impl Display for FileEventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileEventType::FileUploaded => write!(f, "file.uploaded"),
            FileEventType::FileValidated => write!(f, "file.validated"),
            FileEventType::FileScanned => write!(f, "file.scanned"),
            FileEventType::FileRejected => write!(f, "file.rejected"),
            FileEventType::FileDeleted => write!(f, "file.deleted"),
        }
    }
}

impl FromStr for FileEventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file.uploaded" => Ok(FileEventType::FileUploaded),
            "file.validated" => Ok(FileEventType::FileValidated),
            "file.scanned" => Ok(FileEventType::FileScanned),
            "file.rejected" => Ok(FileEventType::FileRejected),
            "file.deleted" => Ok(FileEventType::FileDeleted),
            _ => Err(anyhow::anyhow!("Invalid file event type: {}", s)),
        }
    }
}

/// A lifecycle event raised by a `FileRecord` transition.
///
/// Transitions return the event they raised; callers deliver it to the
/// external publisher only after the record update has been durably
/// persisted, so "raised but undelivered" never hides inside the aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEvent {
    /// Opaque event id, unique per occurrence.
    pub id: Uuid,
    pub event_type: FileEventType,
    pub file_id: Uuid,
    pub storage_key: String,
    /// Present on `file.uploaded` events only.
    pub file_name: Option<String>,
    /// Present on `file.rejected` events only.
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl FileEvent {
    fn new(event_type: FileEventType, record: &FileRecord) -> Self {
        FileEvent {
            id: Uuid::new_v4(),
            event_type,
            file_id: record.id,
            storage_key: record.storage_key.clone(),
            file_name: None,
            reason: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn uploaded(record: &FileRecord) -> Self {
        let mut event = Self::new(FileEventType::FileUploaded, record);
        event.file_name = Some(record.file_name.clone());
        event
    }

    pub fn validated(record: &FileRecord) -> Self {
        Self::new(FileEventType::FileValidated, record)
    }

    pub fn scanned(record: &FileRecord) -> Self {
        Self::new(FileEventType::FileScanned, record)
    }

    pub fn rejected(record: &FileRecord) -> Self {
        let mut event = Self::new(FileEventType::FileRejected, record);
        event.reason = record.rejection_reason.clone();
        event
    }

    pub fn deleted(record: &FileRecord) -> Self {
        Self::new(FileEventType::FileDeleted, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display_round_trip() {
        let all = [
            FileEventType::FileUploaded,
            FileEventType::FileValidated,
            FileEventType::FileScanned,
            FileEventType::FileRejected,
            FileEventType::FileDeleted,
        ];
        for event_type in all {
            let parsed: FileEventType = event_type.to_string().parse().unwrap();
            assert_eq!(parsed, event_type);
        }
        assert!("file.unknown".parse::<FileEventType>().is_err());
    }
}
