//! Postgres-backed [`MetadataStore`].

use crate::{
    config::DatabaseConfig,
    models::{FileRecord, HealthRecord},
    services::metadata_store::{MetadataStore, PersistenceResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgMetadataStore {
    /// Shared connection pool used for metadata operations.
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool that connects on first use, so the service can start
    /// (and report 503 from `/healthz`) while the database is down.
    pub fn connect_lazy(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_lazy_with(cfg.connect_options()?);
        Ok(Self::new(pool))
    }

    /// Apply the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> PersistenceResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn record_health_check(&self, at: DateTime<Utc>) -> PersistenceResult<HealthRecord> {
        let record = sqlx::query_as::<_, HealthRecord>(
            r#"INSERT INTO "HealthChecks" (datetime) VALUES ($1)
               RETURNING "checkId", datetime"#,
        )
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn create_file(&self, record: &FileRecord) -> PersistenceResult<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO "File" (
                id, file_name, url, upload_date, file_size,
                content_type, file_extension, expiration_date
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(&record.file_name)
        .bind(&record.storage_url)
        .bind(record.upload_date)
        .bind(record.file_size)
        .bind(&record.content_type)
        .bind(&record.file_extension)
        .bind(record.expiration_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_file(&self, id: Uuid) -> PersistenceResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT id, file_name, url, upload_date, file_size,
                   content_type, file_extension, expiration_date
            FROM "File"
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete_file(&self, id: Uuid) -> PersistenceResult<u64> {
        let result = sqlx::query(r#"DELETE FROM "File" WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
