//! Local-disk object store.
//!
//! Payloads are sharded beneath `base_path/{shard}/{shard}/{key}` so a single
//! directory never collects every upload. Writes go to a temp file that is
//! fsynced and renamed into place.

use crate::services::object_store::{ObjectStore, ObjectStoreError, ObjectStoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Like [`LocalObjectStore::new`], creating `base_path` if needed.
    pub async fn create(base_path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let store = Self::new(base_path);
        if fs::metadata(&store.base_path).await.is_err() {
            fs::create_dir_all(&store.base_path).await?;
            tracing::info!("Created storage directory at {}", store.base_path.display());
        }
        Ok(store)
    }

    /// Reject keys that could escape `base_path`. Dots inside a name are
    /// fine; only `.`, `..` and empty path segments are refused.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key
                .split('/')
                .any(|segment| matches!(segment, "" | "." | ".."))
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if invalid {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    /// Two-level shard directories from the first bytes of MD5(key).
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Full payload path. Parent directories may not exist yet.
    pub fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn write_atomically(&self, file_path: &Path, data: &[u8]) -> std::io::Result<()> {
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| std::io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, file_path).await
        }
        .await;

        if written.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        written
    }

    /// Remove empty directories from `start` up to, not including, `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> ObjectStoreResult<String> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);

        self.write_atomically(&file_path, &data)
            .await
            .map_err(|err| ObjectStoreError::unavailable("put", err))?;

        debug!("wrote {} bytes to {}", data.len(), file_path.display());
        Ok(file_path.display().to_string())
    }

    async fn remove(&self, key: &str) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(key)?;
        let file_path = self.object_path(key);

        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(ObjectStoreError::unavailable("remove", err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
