//! Object storage abstraction
//!
//! This module defines the capability interface every storage provider implements.

use crate::payload::ObjectUpload;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The deterministic object key is already taken at the provider.
    #[error("Object already exists: {0}")]
    Conflict(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Name of the provider that accepted the object.
    pub provider: String,
    /// Public URL returned by the provider, if it returned one.
    pub url: Option<String>,
    /// Provider-specific object identifier.
    pub object_key: String,
}

/// Object storage capability interface
///
/// Dispatch, fallback and delete logic only talk to providers through this trait, so a
/// provider is identified by [`name`](ObjectStore::name) and never by type.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stable provider name, persisted in the `storage` column of file records.
    fn name(&self) -> &str;

    /// Upload the object under its deterministic key.
    async fn put(&self, object: &ObjectUpload) -> StorageResult<StoredObject>;

    /// Public URL of an object uploaded by this provider, derived from id and original name.
    fn public_url(&self, file_id: &str, file_name: &str) -> String;

    /// Delete an object uploaded by this provider.
    async fn delete(&self, file_id: &str, file_name: &str) -> StorageResult<()>;
}
