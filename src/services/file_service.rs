//! Coordinates the object store and the metadata store for
//! uploads, lookups and deletes, and writes health-check rows. Every adapter
//! call is timed and counted; failures are logged here with their full
//! context so handlers only have to pick a status code.
//!
//! Nothing is retried or compensated. A failed metadata insert after a
//! successful upload leaves the object orphaned, and a failed row delete after
//! a successful object removal leaves the row dangling. Both are logged.

use crate::{
    models::{FileRecord, HealthRecord, file_record},
    observability::{millis, track_db_query, track_object_store_op},
    services::{
        metadata_store::{MetadataStore, PersistenceError},
        object_store::{ObjectStore, ObjectStoreError},
    },
};
use bytes::Bytes;
use chrono::Utc;
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FileServiceError {
    #[error("file `{0}` not found")]
    NotFound(Uuid),
    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type FileServiceResult<T> = Result<T, FileServiceError>;

/// A validated upload, ready to be stored.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Shared handler state. Cloning is cheap; both adapters are reference counted.
#[derive(Clone)]
pub struct FileService {
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl FileService {
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { objects, metadata }
    }

    /// Insert one health-check row stamped with the current time.
    pub async fn record_health_check(&self) -> Result<HealthRecord, PersistenceError> {
        let start = Instant::now();
        debug!("starting database health check operation");

        let result = track_db_query(
            "healthcheck_create",
            self.metadata.record_health_check(Utc::now()),
        )
        .await;

        match &result {
            Ok(record) => info!(
                operation = "database_check",
                record_id = record.id,
                duration_ms = millis(start.elapsed()),
                "database health check completed"
            ),
            Err(err) => error!(
                operation = "database_check",
                error = %err,
                error_debug = ?err,
                duration_ms = millis(start.elapsed()),
                "database health check failed"
            ),
        }
        result
    }

    /// Store the payload, then persist its metadata.
    ///
    /// No metadata is written when the store write fails.
    pub async fn upload_file(&self, upload: NewUpload) -> FileServiceResult<FileRecord> {
        let start = Instant::now();
        let id = Uuid::new_v4();
        let key = file_record::storage_key(id, &upload.file_name);
        let file_size = i64::try_from(upload.data.len()).unwrap_or(i64::MAX);

        let location = track_object_store_op(
            "put",
            self.objects.put(&key, upload.data, &upload.content_type),
        )
        .await
        .map_err(|err| {
            error!(
                operation = "object_put",
                backend = self.objects.backend(),
                file_id = %id,
                storage_key = %key,
                error = %err,
                duration_ms = millis(start.elapsed()),
                "failed to store uploaded file"
            );
            err
        })?;

        let record = FileRecord::new(
            id,
            upload.file_name,
            location,
            file_size,
            upload.content_type,
            Utc::now(),
        );

        track_db_query("file_create", self.metadata.create_file(&record))
            .await
            .map_err(|err| {
                error!(
                    operation = "file_create",
                    file_id = %id,
                    storage_key = %key,
                    orphaned_object = %record.storage_url,
                    error = %err,
                    duration_ms = millis(start.elapsed()),
                    "failed to save file metadata; stored object is orphaned"
                );
                err
            })?;

        info!(
            operation = "file_upload",
            file_id = %id,
            storage_key = %key,
            file_size,
            content_type = %record.content_type,
            duration_ms = millis(start.elapsed()),
            "file uploaded"
        );
        Ok(record)
    }

    /// Look up a file's metadata. A missing row is [`FileServiceError::NotFound`].
    pub async fn find_file(&self, id: Uuid) -> FileServiceResult<FileRecord> {
        let start = Instant::now();
        let found = track_db_query("file_find", self.metadata.find_file(id))
            .await
            .map_err(|err| {
                error!(
                    operation = "file_find",
                    file_id = %id,
                    error = %err,
                    duration_ms = millis(start.elapsed()),
                    "failed to fetch file metadata"
                );
                err
            })?;

        found.ok_or(FileServiceError::NotFound(id))
    }

    /// Remove the stored object, then its metadata row.
    ///
    /// The row is kept whenever the object removal fails.
    pub async fn delete_file(&self, id: Uuid) -> FileServiceResult<()> {
        let start = Instant::now();
        let record = self.find_file(id).await?;
        let key = record.storage_key();

        track_object_store_op("remove", self.objects.remove(&key))
            .await
            .map_err(|err| {
                error!(
                    operation = "object_remove",
                    backend = self.objects.backend(),
                    file_id = %id,
                    storage_key = %key,
                    error = %err,
                    duration_ms = millis(start.elapsed()),
                    "failed to delete stored file; metadata kept"
                );
                err
            })?;

        let rows = track_db_query("file_delete", self.metadata.delete_file(id))
            .await
            .map_err(|err| {
                error!(
                    operation = "file_delete",
                    file_id = %id,
                    storage_key = %key,
                    error = %err,
                    duration_ms = millis(start.elapsed()),
                    "failed to delete file metadata; row now points at a removed object"
                );
                err
            })?;

        if rows == 0 {
            warn!(
                operation = "file_delete",
                file_id = %id,
                "metadata delete affected no rows"
            );
        }

        info!(
            operation = "file_delete",
            file_id = %id,
            storage_key = %key,
            duration_ms = millis(start.elapsed()),
            "file deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::{MemoryMetadataStore, MemoryObjectStore, MetadataCall};

    fn service() -> (FileService, MemoryObjectStore, MemoryMetadataStore) {
        let objects = MemoryObjectStore::new();
        let metadata = MemoryMetadataStore::new();
        let service = FileService::new(Arc::new(objects.clone()), Arc::new(metadata.clone()));
        (service, objects, metadata)
    }

    fn upload(name: &str) -> NewUpload {
        NewUpload {
            file_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            data: Bytes::from_static(b"%PDF-1.7"),
        }
    }

    #[tokio::test]
    async fn upload_stores_object_and_metadata() {
        let (service, objects, metadata) = service();

        let record = service.upload_file(upload("report.PDF")).await.unwrap();

        assert_eq!(record.file_extension, "pdf");
        assert_eq!(record.file_size, 8);
        assert_eq!(record.storage_url, format!("memory/{}-report.PDF", record.id));
        let stored = objects.get(&record.storage_key()).await.unwrap();
        assert_eq!(stored.content_type, "application/pdf");
        assert_eq!(service.find_file(record.id).await.unwrap(), record);
        assert_eq!(metadata.file_count().await, 1);
    }

    #[tokio::test]
    async fn same_name_uploads_get_distinct_keys() {
        let (service, objects, _) = service();

        let a = service.upload_file(upload("cat.png")).await.unwrap();
        let b = service.upload_file(upload("cat.png")).await.unwrap();

        assert_ne!(a.storage_key(), b.storage_key());
        assert_eq!(objects.len().await, 2);
    }

    #[tokio::test]
    async fn failed_put_writes_no_metadata() {
        let (service, objects, metadata) = service();
        objects.fail_puts(true);

        let err = service.upload_file(upload("a.txt")).await.unwrap_err();
        assert!(matches!(err, FileServiceError::ObjectStore(_)));
        assert_eq!(metadata.file_count().await, 0);
    }

    #[tokio::test]
    async fn failed_metadata_insert_leaves_orphaned_object() {
        let (service, objects, metadata) = service();
        metadata.fail(MetadataCall::CreateFile, true).await;

        let err = service.upload_file(upload("a.txt")).await.unwrap_err();
        assert!(matches!(err, FileServiceError::Persistence(_)));
        assert_eq!(objects.len().await, 1);
    }

    #[tokio::test]
    async fn delete_removes_object_then_row() {
        let (service, objects, metadata) = service();
        let record = service.upload_file(upload("a.txt")).await.unwrap();

        service.delete_file(record.id).await.unwrap();

        assert!(objects.is_empty().await);
        assert_eq!(metadata.file_count().await, 0);
        assert!(matches!(
            service.find_file(record.id).await,
            Err(FileServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_remove_keeps_row() {
        let (service, objects, metadata) = service();
        let record = service.upload_file(upload("a.txt")).await.unwrap();
        objects.fail_removes(true);

        let err = service.delete_file(record.id).await.unwrap_err();
        assert!(matches!(err, FileServiceError::ObjectStore(_)));
        assert_eq!(metadata.file_count().await, 1);
    }

    #[tokio::test]
    async fn delete_of_unknown_id_is_not_found() {
        let (service, _, _) = service();
        assert!(matches!(
            service.delete_file(Uuid::new_v4()).await,
            Err(FileServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn lookup_failure_is_not_reported_as_not_found() {
        let (service, _, metadata) = service();
        metadata.fail(MetadataCall::FindFile, true).await;

        assert!(matches!(
            service.find_file(Uuid::new_v4()).await,
            Err(FileServiceError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn health_check_inserts_one_row() {
        let (service, _, metadata) = service();

        service.record_health_check().await.unwrap();
        assert_eq!(metadata.health_check_count().await, 1);

        metadata.fail(MetadataCall::RecordHealthCheck, true).await;
        assert!(service.record_health_check().await.is_err());
        assert_eq!(metadata.health_check_count().await, 1);
    }
}
