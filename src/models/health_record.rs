//! Represents one liveness probe written by `GET /healthz`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A row in the `HealthChecks` table. Rows are only ever inserted.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct HealthRecord {
    /// Auto-increment identifier.
    #[sqlx(rename = "checkId")]
    pub id: i32,

    /// When the probe was recorded.
    #[sqlx(rename = "datetime")]
    pub timestamp: DateTime<Utc>,
}
