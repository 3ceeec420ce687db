//! In-memory adapters with failure injection, used as test doubles.

use crate::{
    models::{FileRecord, HealthRecord},
    services::{
        metadata_store::{MetadataStore, PersistenceError, PersistenceResult},
        object_store::{ObjectStore, ObjectStoreError, ObjectStoreResult},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::Mutex;
use uuid::Uuid;

/// A stored payload and the content type it was written with.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    fail_puts: Arc<AtomicBool>,
    fail_removes: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `put` fail as if the bucket were unreachable.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectStoreResult<String> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::unavailable("put", "injected failure"));
        }
        self.objects.lock().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("memory/{}", key))
    }

    async fn remove(&self, key: &str) -> ObjectStoreResult<()> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::unavailable("remove", "injected failure"));
        }
        self.objects.lock().await.remove(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Which [`MemoryMetadataStore`] calls should fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetadataCall {
    RecordHealthCheck,
    CreateFile,
    FindFile,
    DeleteFile,
}

#[derive(Clone, Default)]
pub struct MemoryMetadataStore {
    health_checks: Arc<Mutex<Vec<HealthRecord>>>,
    files: Arc<Mutex<HashMap<Uuid, FileRecord>>>,
    failing: Arc<Mutex<HashMap<MetadataCall, bool>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail(&self, call: MetadataCall, fail: bool) {
        self.failing.lock().await.insert(call, fail);
    }

    pub async fn health_check_count(&self) -> usize {
        self.health_checks.lock().await.len()
    }

    pub async fn file_count(&self) -> usize {
        self.files.lock().await.len()
    }

    async fn check(&self, call: MetadataCall) -> PersistenceResult<()> {
        let failing = self.failing.lock().await;
        if failing.get(&call).copied().unwrap_or(false) {
            return Err(PersistenceError::Unavailable(format!(
                "injected failure for {:?}",
                call
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn record_health_check(&self, at: DateTime<Utc>) -> PersistenceResult<HealthRecord> {
        self.check(MetadataCall::RecordHealthCheck).await?;
        let mut rows = self.health_checks.lock().await;
        let record = HealthRecord {
            id: i32::try_from(rows.len() + 1).unwrap_or(i32::MAX),
            timestamp: at,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn create_file(&self, record: &FileRecord) -> PersistenceResult<Uuid> {
        self.check(MetadataCall::CreateFile).await?;
        let mut files = self.files.lock().await;
        if files.contains_key(&record.id) {
            return Err(PersistenceError::Unavailable(format!(
                "duplicate key value violates primary key: {}",
                record.id
            )));
        }
        files.insert(record.id, record.clone());
        Ok(record.id)
    }

    async fn find_file(&self, id: Uuid) -> PersistenceResult<Option<FileRecord>> {
        self.check(MetadataCall::FindFile).await?;
        Ok(self.files.lock().await.get(&id).cloned())
    }

    async fn delete_file(&self, id: Uuid) -> PersistenceResult<u64> {
        self.check(MetadataCall::DeleteFile).await?;
        Ok(u64::from(self.files.lock().await.remove(&id).is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_failures_are_reported() {
        let objects = MemoryObjectStore::new();
        objects.fail_puts(true);
        assert!(
            objects
                .put("k", Bytes::from_static(b"x"), "text/plain")
                .await
                .is_err()
        );
        assert!(objects.is_empty().await);

        let metadata = MemoryMetadataStore::new();
        metadata.fail(MetadataCall::FindFile, true).await;
        assert!(metadata.find_file(Uuid::new_v4()).await.is_err());
        metadata.fail(MetadataCall::FindFile, false).await;
        assert!(metadata.find_file(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_rows_affected() {
        let metadata = MemoryMetadataStore::new();
        let record = FileRecord::new(Uuid::new_v4(), "a.txt", "memory/a", 1, "text/plain", Utc::now());
        metadata.create_file(&record).await.unwrap();

        assert_eq!(metadata.delete_file(record.id).await.unwrap(), 1);
        assert_eq!(metadata.delete_file(record.id).await.unwrap(), 0);
    }
}
