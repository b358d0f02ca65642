//! Metadata store abstraction

use async_trait::async_trait;
use kabox_core::{FileRecord, NewFileRecord};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("no databases configured")]
    NoDatabases,
}

pub type DbResult<T> = Result<T, DbError>;

/// Capability interface every metadata database implements
///
/// The registry only ever addresses backends through this trait and their
/// [`name`](RecordStore::name).
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Stable backend name, used in logs and write receipts.
    fn name(&self) -> &str;

    /// Make sure the `files` table exists and the backend is reachable.
    async fn initialize(&self) -> DbResult<()>;

    /// Insert one row. `created_at` is assigned by the database.
    async fn insert(&self, record: &NewFileRecord) -> DbResult<()>;

    /// Fetch a row by file id.
    async fn get_by_key(&self, id: &str) -> DbResult<Option<FileRecord>>;

    /// Delete a row by file id. Returns whether a row was removed.
    async fn delete(&self, id: &str) -> DbResult<bool>;
}
