//! Multipart intake.
//!
//! Each `files` part is streamed into its own temp file while its SHA-256 is computed. Bytes
//! beyond the size limit are counted but not written, so an oversized file is still reported
//! with its real size. The per-request file limit is checked as parts arrive: an extra part
//! fails the whole request before any file reaches storage.

use crate::constants::{
    too_many_files_message, MSG_INVALID_REQUEST, MSG_TOO_LARGE, UPLOAD_FIELD,
};
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use kabox_core::AppError;
use sha2::{Digest, Sha256};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One uploaded file, held on disk until the request finishes.
#[derive(Debug)]
pub struct SpooledFile {
    pub file_name: String,
    pub content_type: String,
    /// Bytes received, including any beyond the size limit.
    pub size: u64,
    pub sha256: String,
    temp: NamedTempFile,
}

impl SpooledFile {
    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

/// Parser detail is logged, never returned.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(MSG_TOO_LARGE.to_string());
    }
    tracing::debug!(error = %err.body_text(), "Malformed multipart body");
    AppError::BadRequest(MSG_INVALID_REQUEST.to_string())
}

async fn spool_field(mut field: Field<'_>, max_size: u64) -> Result<SpooledFile, AppError> {
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field
        .content_type()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let temp = NamedTempFile::new()?;
    let mut file = tokio::fs::File::create(temp.path()).await?;
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        let kept = max_size.saturating_sub(size).min(chunk.len() as u64) as usize;
        if kept > 0 {
            file.write_all(&chunk[..kept]).await?;
        }
        hasher.update(&chunk);
        size += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(SpooledFile {
        file_name,
        content_type,
        size,
        sha256: hex::encode(hasher.finalize()),
        temp,
    })
}

/// Spool every `files` part of the request. Other fields are ignored.
pub async fn spool_uploads(
    mut multipart: Multipart,
    max_files: usize,
    max_size: u64,
) -> Result<Vec<SpooledFile>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        if files.len() == max_files {
            tracing::debug!(max_files, "Upload rejected: too many files");
            return Err(AppError::BadRequest(too_many_files_message(max_files)));
        }
        files.push(spool_field(field, max_size).await?);
    }

    Ok(files)
}
