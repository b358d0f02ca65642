//! Postgres-backed record store (Neon).

use crate::traits::{DbError, DbResult, RecordStore};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use kabox_core::{DatabaseBackend, FileRecord, FileStatus, NewFileRecord};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::time::Duration;

/// Row type for the files table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct FileRow {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub storage: Option<String>,
    pub url: Option<String>,
    pub ip: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl FileRow {
    pub fn to_file_record(self) -> FileRecord {
        FileRecord {
            id: self.id,
            name: self.name,
            size: self.size,
            mime_type: self.mime_type,
            storage: self.storage.unwrap_or_default(),
            url: self.url,
            ip: self.ip,
            status: self
                .status
                .as_deref()
                .map(|s| s.parse().unwrap_or(FileStatus::Pending))
                .unwrap_or(FileStatus::Completed),
            created_at: self.created_at.map(|ts| ts.and_utc()),
        }
    }
}

/// Record store over a pooled Postgres connection.
///
/// Connections are checked out per query and returned to the pool when the query future
/// completes or is dropped, error paths included.
#[derive(Clone)]
pub struct PostgresRecordStore {
    name: &'static str,
    pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            name: DatabaseBackend::Neon.as_str(),
            pool,
        }
    }

    /// Build a lazily connecting pool, so an unreachable database does not block startup.
    pub fn connect_lazy(
        connection_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect_lazy(connection_url)
            .map_err(|e| DbError::Config(format!("Invalid NEON_CONNECTION: {}", e)))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    fn name(&self) -> &str {
        self.name
    }

    async fn initialize(&self) -> DbResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!(database = %self.name, "Database migrations applied");
        Ok(())
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "files", db.record_id = %record.id))]
    async fn insert(&self, record: &NewFileRecord) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO files (id, name, size, mime_type, storage, url, ip, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.size)
        .bind(&record.mime_type)
        .bind(&record.storage)
        .bind(&record.url)
        .bind(&record.ip)
        .bind(record.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn get_by_key(&self, id: &str) -> DbResult<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as::<Postgres, FileRow>(
            r#"
            SELECT id, name, size, mime_type, storage, url, ip, status, created_at
            FROM files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FileRow::to_file_record))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
