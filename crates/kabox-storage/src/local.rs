use crate::keys::{object_key, FOLDER};
use crate::payload::ObjectUpload;
use crate::traits::{ObjectStore, StorageError, StorageResult, StoredObject};
use async_trait::async_trait;
use kabox_core::StorageProvider;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;

/// Local filesystem storage, for development and tests
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory; objects go under `{base_path}/kabox/`
    /// * `base_url` - Base URL the root directory is served from (e.g., "http://localhost:3000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(base_path.join(FOLDER))
            .await
            .map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    base_path.display(),
                    e
                ))
            })?;

        Ok(LocalStorage {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Convert an object key to its path, rejecting keys that could leave the folder.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains("..") || key.contains('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(self.base_path.join(FOLDER).join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    fn name(&self) -> &str {
        StorageProvider::Local.as_str()
    }

    async fn put(&self, object: &ObjectUpload) -> StorageResult<StoredObject> {
        let key = object.object_key();
        let path = self.key_to_path(&key)?;
        let start = std::time::Instant::now();

        // create_new mirrors the remote providers' no-overwrite policy.
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::Conflict(format!("local object {}", key)));
            }
            Err(e) => {
                return Err(StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let mut reader = object.reader().await?;
        let written = async {
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        let written = match written {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&path).await;
                return Err(StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(StoredObject {
            provider: self.name().to_string(),
            url: Some(self.public_url(&object.file_id, &object.file_name)),
            object_key: key,
        })
    }

    fn public_url(&self, file_id: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            FOLDER,
            object_key(file_id, file_name)
        )
    }

    async fn delete(&self, file_id: &str, file_name: &str) -> StorageResult<()> {
        let key = object_key(file_id, file_name);
        let path = self.key_to_path(&key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), key = %key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key)),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
