//! Upload pipeline
//!
//! Per file: validate → dispatch to storage (round-robin with fallback) → write metadata
//! (round-robin, no fallback) → notify. Files are handled one after another and each gets
//! its own result entry, so one bad file never fails the batch.

use crate::constants::{MSG_METADATA_FAILED, MSG_STORAGE_EXHAUSTED};
use crate::services::{notify, Notification};
use crate::state::AppState;
use crate::utils::SpooledFile;
use kabox_core::{generate_file_id, validate_upload, FileStatus, NewFileRecord};
use kabox_storage::ObjectUpload;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub success: bool,
    pub id: String,
    pub name: String,
    pub size: u64,
    pub download_url: String,
    pub storage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub success: bool,
    pub filename: String,
    pub error: String,
}

/// Result entry for one submitted file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UploadItem {
    Stored(StoredFile),
    Failed(FailedFile),
}

impl UploadItem {
    fn failed(filename: &str, error: impl Into<String>) -> Self {
        UploadItem::Failed(FailedFile {
            success: false,
            filename: filename.to_string(),
            error: error.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadItem::Stored(_))
    }
}

pub struct UploadService {
    state: Arc<AppState>,
}

impl UploadService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self {
            state: state.clone(),
        }
    }

    pub async fn upload_all(&self, files: &[SpooledFile], ip: &str) -> Vec<UploadItem> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.upload_one(file, ip).await);
        }
        results
    }

    pub async fn upload_one(&self, file: &SpooledFile, ip: &str) -> UploadItem {
        let start = Instant::now();
        let config = &self.state.config;

        let validated = match validate_upload(
            &file.file_name,
            file.size,
            config.max_file_size_bytes(),
            config.allowed_extensions(),
        ) {
            Ok(validated) => validated,
            Err(e) => {
                tracing::debug!(file_name = %file.file_name, error = %e, "Upload validation failed");
                return UploadItem::failed(&file.file_name, e.to_string());
            }
        };

        if validated.is_dangerous {
            tracing::warn!(
                file_name = %file.file_name,
                extension = %validated.extension,
                sha256 = %file.sha256,
                client_ip = %ip,
                "Potentially dangerous file uploaded"
            );
        }

        let file_id = generate_file_id();
        let object = ObjectUpload::from_file(
            file_id.clone(),
            validated.sanitized_name,
            file.content_type.clone(),
            file.path(),
            file.size,
        );

        let outcome = match self.state.storage.upload(&object).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(file_id = %file_id, error = %e, "Upload failed on every provider");
                return UploadItem::failed(&file.file_name, MSG_STORAGE_EXHAUSTED);
            }
        };
        let stored = outcome.stored;

        let record = NewFileRecord {
            id: file_id.clone(),
            name: file.file_name.clone(),
            size: file.size as i64,
            mime_type: Some(file.content_type.clone()),
            storage: stored.provider.clone(),
            url: stored.url.clone(),
            ip: Some(ip.to_string()),
            status: FileStatus::Completed,
        };

        if let Err(e) = self.state.databases.write(&record).await {
            // The object stays at the provider with no record pointing at it.
            tracing::warn!(
                file_id = %file_id,
                provider = %stored.provider,
                object_key = %stored.object_key,
                error = %e,
                "Metadata write failed after storage upload, object is orphaned"
            );
            return UploadItem::failed(&file.file_name, MSG_METADATA_FAILED);
        }

        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(
            file_id = %file_id,
            provider = %stored.provider,
            size = file.size,
            duration_ms = elapsed_ms as u64,
            "File uploaded"
        );

        notify(
            &self.state.notifier,
            Notification::Uploaded {
                id: file_id.clone(),
                name: file.file_name.clone(),
                size: file.size,
                storage: stored.provider.clone(),
                ip: ip.to_string(),
                elapsed_ms,
            },
        );

        UploadItem::Stored(StoredFile {
            success: true,
            download_url: self.state.download_url(&file_id),
            id: file_id,
            name: file.file_name.clone(),
            size: file.size,
            storage: stored.provider,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_serialize_in_wire_shape() {
        let stored = serde_json::to_value(UploadItem::Stored(StoredFile {
            success: true,
            id: "abc".to_string(),
            name: "a.txt".to_string(),
            size: 3,
            download_url: "http://localhost:3000/files/abc/download".to_string(),
            storage: "local".to_string(),
        }))
        .unwrap();
        assert_eq!(stored["downloadUrl"], "http://localhost:3000/files/abc/download");
        assert_eq!(stored["success"], true);

        let failed = serde_json::to_value(UploadItem::failed("a.exe", "File kosong")).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"success": false, "filename": "a.exe", "error": "File kosong"})
        );
    }
}
