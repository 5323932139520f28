#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use filegate_core::config::LifecyclePolicy;
use filegate_core::models::{ActualMetadata, FileEvent, FileRecord, NewFileRecord};
use filegate_core::{AppError, FileRepository};
use filegate_scan::{ScanError, ScanVerdict};
use filegate_services::{EventPublisher, MalwareScanner};
use filegate_storage::{BatchRemoveFailure, Storage, StorageBackend, StorageError, StorageResult};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Chronological log of collaborator calls, shared between the fake
/// repository and fake storage so tests can assert ordering.
pub type OpLog = Arc<Mutex<Vec<String>>>;

pub fn op_log() -> OpLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn default_policy() -> LifecyclePolicy {
    LifecyclePolicy {
        validation_enabled: true,
        scanning_enabled: false,
        max_file_size_bytes: 0,
    }
}

pub fn pending_record(storage_key_path: &str, file_name: &str, size: i64) -> FileRecord {
    let (record, _event) = FileRecord::create(
        NewFileRecord {
            file_name: file_name.to_string(),
            path: storage_key_path.to_string(),
            size,
            content_type: "image/png".to_string(),
            content_hash: None,
            provider: "local".to_string(),
        },
        &default_policy(),
    )
    .unwrap();
    record
}

pub fn actual_metadata(key: &str, size: i64, content_type: Option<&str>) -> ActualMetadata {
    ActualMetadata {
        key: key.to_string(),
        size,
        etag: "etag-1".to_string(),
        content_type: content_type.map(str::to_string),
        last_modified: Utc::now(),
        version_id: None,
    }
}

pub struct InMemoryRepository {
    records: Mutex<HashMap<Uuid, FileRecord>>,
    pub fail_update_batch: AtomicBool,
    ops: OpLog,
}

impl InMemoryRepository {
    pub fn new(ops: OpLog) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_update_batch: AtomicBool::new(false),
            ops,
        }
    }

    pub fn seed(&self, record: FileRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn get(&self, id: Uuid) -> Option<FileRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl FileRepository for InMemoryRepository {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, AppError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_storage_key(
        &self,
        storage_key: &str,
    ) -> Result<Option<FileRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.storage_key == storage_key)
            .cloned())
    }

    async fn get_by_hash(&self, content_hash: &str) -> Result<Option<FileRecord>, AppError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.content_hash.as_deref() == Some(content_hash) && r.deleted_at.is_none())
            .cloned())
    }

    async fn exists_by_hash(&self, content_hash: &str) -> Result<bool, AppError> {
        Ok(self.get_by_hash(content_hash).await?.is_some())
    }

    async fn add(&self, record: &FileRecord) -> Result<(), AppError> {
        self.ops.lock().unwrap().push("repo.add".to_string());
        let mut records = self.records.lock().unwrap();
        if records
            .values()
            .any(|r| r.storage_key == record.storage_key)
        {
            return Err(AppError::Conflict(format!(
                "storage key {} already exists",
                record.storage_key
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &FileRecord) -> Result<(), AppError> {
        self.ops.lock().unwrap().push("repo.update".to_string());
        let mut records = self.records.lock().unwrap();
        match records.get(&record.id) {
            Some(stored) if stored.version == record.version => {
                let mut updated = record.clone();
                updated.version += 1;
                records.insert(record.id, updated);
                Ok(())
            }
            Some(stored) => Err(AppError::Conflict(format!(
                "version precondition failed: stored {} given {}",
                stored.version, record.version
            ))),
            None => Err(AppError::NotFound(format!(
                "no file record with id {}",
                record.id
            ))),
        }
    }

    async fn update_batch(&self, records: &[FileRecord]) -> Result<(), AppError> {
        self.ops.lock().unwrap().push("repo.update_batch".to_string());
        if self.fail_update_batch.load(Ordering::SeqCst) {
            return Err(AppError::Internal("simulated batch failure".to_string()));
        }
        let mut stored = self.records.lock().unwrap();
        for record in records {
            match stored.get(&record.id) {
                Some(existing) if existing.version == record.version => {}
                Some(existing) => {
                    return Err(AppError::Conflict(format!(
                        "version precondition failed: stored {} given {}",
                        existing.version, record.version
                    )))
                }
                None => {
                    return Err(AppError::NotFound(format!(
                        "no file record with id {}",
                        record.id
                    )))
                }
            }
        }
        for record in records {
            let mut updated = record.clone();
            updated.version += 1;
            stored.insert(record.id, updated);
        }
        Ok(())
    }
}

pub struct RecordingStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    pub metadata_response: Mutex<Option<ActualMetadata>>,
    pub metadata_calls: AtomicUsize,
    pub removed: Mutex<Vec<String>>,
    pub fail_remove: AtomicBool,
    ops: OpLog,
}

impl RecordingStorage {
    pub fn new(ops: OpLog) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            metadata_response: Mutex::new(None),
            metadata_calls: AtomicUsize::new(0),
            removed: Mutex::new(Vec::new()),
            fail_remove: AtomicBool::new(false),
            ops,
        }
    }

    pub fn put(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn removed_keys(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn upload(
        &self,
        storage_key: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<()> {
        self.ops.lock().unwrap().push("storage.upload".to_string());
        self.objects
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), data);
        Ok(())
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(storage_key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))
    }

    async fn remove(&self, storage_key: &str) -> StorageResult<()> {
        self.ops.lock().unwrap().push("storage.remove".to_string());
        self.removed.lock().unwrap().push(storage_key.to_string());
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(storage_key.to_string()));
        }
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    async fn get_metadata(&self, storage_key: &str) -> StorageResult<ActualMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| StorageError::BackendError(format!("no metadata for {}", storage_key)))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(storage_key))
    }

    async fn health(&self) -> bool {
        true
    }

    async fn presigned_get_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "https://storage.test/{}?expires={}",
            storage_key,
            expires_in.as_secs()
        ))
    }

    async fn presigned_put_url(
        &self,
        storage_key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "https://storage.test/put/{}?expires={}",
            storage_key,
            expires_in.as_secs()
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<FileEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<FileEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &FileEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Scanner returning a fixed verdict; `None` simulates an unreachable
/// daemon.
pub struct StubScanner {
    verdict: Option<ScanVerdict>,
    pub calls: AtomicUsize,
}

impl StubScanner {
    pub fn returning(verdict: ScanVerdict) -> Self {
        Self {
            verdict: Some(verdict),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            verdict: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MalwareScanner for StubScanner {
    async fn scan(
        &self,
        _data: &[u8],
        _cancel: &CancellationToken,
    ) -> Result<ScanVerdict, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.verdict {
            Some(verdict) => Ok(verdict.clone()),
            None => Err(ScanError::Connection("scanner unreachable".to_string())),
        }
    }
}
