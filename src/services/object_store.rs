//! Object storage contract shared by the S3, local-disk and in-memory backends.

use crate::{
    config::ObjectStoreConfig,
    services::{local_store::LocalObjectStore, s3_store::S3ObjectStore},
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{fmt, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    /// The backing service was unreachable or refused the operation.
    #[error("object store unavailable during {operation}: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
}

impl ObjectStoreError {
    pub fn unavailable(operation: &'static str, reason: impl fmt::Display) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.to_string(),
        }
    }
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Blob storage keyed by synthesized file keys. Neither call retries.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Store `data` under `key` and return the location recorded as the
    /// file's URL.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectStoreResult<String>;

    /// Remove the object under `key`. A missing key is not an error.
    async fn remove(&self, key: &str) -> ObjectStoreResult<()>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Build the backend selected by configuration.
pub async fn connect(cfg: &ObjectStoreConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match cfg {
        ObjectStoreConfig::S3 {
            bucket,
            region,
            endpoint_url,
            force_path_style,
        } => {
            let store = S3ObjectStore::new(
                bucket.clone(),
                region.clone(),
                endpoint_url.clone(),
                *force_path_style,
            )
            .await;
            Ok(Arc::new(store))
        }
        ObjectStoreConfig::Local { dir } => {
            let store = LocalObjectStore::create(dir.clone()).await?;
            Ok(Arc::new(store))
        }
    }
}
