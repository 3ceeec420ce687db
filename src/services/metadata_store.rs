//! Metadata persistence contract for file and health-check rows.

use crate::models::{FileRecord, HealthRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Connectivity or constraint failure. A missing row is never an error.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Insert one liveness row stamped `at`.
    async fn record_health_check(&self, at: DateTime<Utc>) -> PersistenceResult<HealthRecord>;

    /// Insert `record`, returning its id.
    async fn create_file(&self, record: &FileRecord) -> PersistenceResult<Uuid>;

    /// `Ok(None)` when no row has this id.
    async fn find_file(&self, id: Uuid) -> PersistenceResult<Option<FileRecord>>;

    /// Delete by id, returning rows affected.
    async fn delete_file(&self, id: Uuid) -> PersistenceResult<u64>;
}
