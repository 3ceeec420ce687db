//! Storage adapters and the service that coordinates them.

pub mod file_service;
pub mod local_store;
pub mod memory;
pub mod metadata_store;
pub mod object_store;
pub mod postgres_store;
pub mod s3_store;

pub use file_service::{FileService, FileServiceError, NewUpload};
pub use metadata_store::{MetadataStore, PersistenceError};
pub use object_store::{ObjectStore, ObjectStoreError};
