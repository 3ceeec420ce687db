//! Represents an uploaded file and the descriptor returned to clients.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Number of days an upload is advertised as valid. Advisory only.
pub const EXPIRATION_DAYS: i64 = 30;

/// Persisted metadata for one stored object.
///
/// The row and the object it points at are logically one unit, but nothing
/// enforces that: an upload can leave an object without a row, and a delete
/// can leave a row without an object.
#[derive(Clone, FromRow, Debug, PartialEq)]
pub struct FileRecord {
    /// Server-generated identifier, never reused.
    pub id: Uuid,

    /// Original filename as sent by the client.
    pub file_name: String,

    /// Location of the stored object, as reported by the object store.
    #[sqlx(rename = "url")]
    pub storage_url: String,

    /// Calendar day (UTC) of the upload.
    pub upload_date: NaiveDate,

    /// Size in bytes.
    pub file_size: i64,

    /// Content type (MIME type) declared by the client.
    pub content_type: String,

    /// Lowercase suffix of `file_name` after the last `.`.
    pub file_extension: String,

    /// Upload instant plus [`EXPIRATION_DAYS`].
    pub expiration_date: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Build the record for an object that was just written at `storage_url`.
    pub fn new(
        id: Uuid,
        file_name: impl Into<String>,
        storage_url: impl Into<String>,
        file_size: i64,
        content_type: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        let file_name = file_name.into();
        Self {
            id,
            file_extension: file_extension(&file_name),
            file_name,
            storage_url: storage_url.into(),
            upload_date: uploaded_at.date_naive(),
            file_size,
            content_type: content_type.into(),
            expiration_date: Some(uploaded_at + Duration::days(EXPIRATION_DAYS)),
        }
    }

    /// Object-store key of the payload behind this record.
    pub fn storage_key(&self) -> String {
        storage_key(self.id, &self.file_name)
    }

    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            file_name: self.file_name.clone(),
            id: self.id,
            url: self.storage_url.clone(),
            upload_date: self.upload_date,
        }
    }
}

/// Public view of a [`FileRecord`]. `upload_date` serializes as `YYYY-MM-DD`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FileDescriptor {
    pub file_name: String,
    pub id: Uuid,
    pub url: String,
    pub upload_date: NaiveDate,
}

/// Object key for an upload: `<id>-<file_name>`.
///
/// The id prefix keeps keys unique when two uploads share a filename.
pub fn storage_key(id: Uuid, file_name: &str) -> String {
    format!("{}-{}", id, file_name)
}

/// Lowercased text after the last `.`; the whole name when there is none.
pub fn file_extension(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or(file_name)
        .to_lowercase()
}
