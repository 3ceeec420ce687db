//! Core data models for the file service.
//!
//! These entities map to database tables via `sqlx::FromRow`; the public
//! file descriptor serializes as JSON via `serde`.

pub mod file_record;
pub mod health_record;

pub use file_record::{FileDescriptor, FileRecord};
pub use health_record::HealthRecord;
