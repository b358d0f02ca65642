//! Download, status and metadata responders.
//!
//! All three resolve the identifier through the database registry (fixed order, first hit
//! wins). Only download touches provider URLs; the other two point at our own download link.

use crate::constants::{MSG_FILE_NOT_FOUND, MSG_INVALID_REQUEST};
use crate::envelope::{self, ApiResponse};
use crate::error::HttpAppError;
use crate::services::{notify, Notification};
use crate::state::AppState;
use crate::utils::ClientIp;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use kabox_core::{is_valid_file_id, AppError, FileRecord, FileStatus};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatusPayload {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub status: &'static str,
    pub message: &'static str,
    /// Reserved for incremental uploads. Always `false`.
    pub chunked: bool,
    /// Reserved for incremental uploads. Always `0`.
    pub chunk_count: u32,
    /// `null` until the upload has completed.
    pub download_url: Option<String>,
}

async fn resolve(state: &AppState, id: &str) -> Result<FileRecord, HttpAppError> {
    if !is_valid_file_id(id) {
        return Err(AppError::BadRequest(MSG_INVALID_REQUEST.to_string()).into());
    }
    state
        .databases
        .resolve(id)
        .await
        .ok_or_else(|| AppError::NotFound(MSG_FILE_NOT_FOUND.to_string()).into())
}

/// `GET /files/{id}`
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<FileMetadata>>, HttpAppError> {
    metadata(&state, &id).await
}

async fn metadata(
    state: &AppState,
    id: &str,
) -> Result<Json<ApiResponse<FileMetadata>>, HttpAppError> {
    let record = resolve(state, id).await?;
    Ok(envelope::success(FileMetadata {
        download_url: state.download_url(&record.id),
        id: record.id,
        name: record.name,
        size: record.size,
        mime_type: record.mime_type,
        created_at: record.created_at,
    }))
}

async fn status(
    state: &AppState,
    id: &str,
) -> Result<Json<ApiResponse<FileStatusPayload>>, HttpAppError> {
    let record = resolve(state, id).await?;
    Ok(envelope::success(FileStatusPayload {
        download_url: (record.status == FileStatus::Completed)
            .then(|| state.download_url(&record.id)),
        id: record.id,
        name: record.name,
        size: record.size,
        status: record.status.as_str(),
        message: record.status.message(),
        chunked: false,
        chunk_count: 0,
    }))
}

async fn download(state: &AppState, id: &str, ip: String) -> Result<Response, HttpAppError> {
    let record = resolve(state, id).await?;

    // Stored URL verbatim; rebuilt by the holding provider only when none was returned.
    let url = match record.url.clone() {
        Some(url) => url,
        None => state
            .storage
            .public_url(&record.storage, &record.id, &record.name)
            .ok_or_else(|| {
                tracing::warn!(
                    file_id = %record.id,
                    provider = %record.storage,
                    "No URL stored and provider is not registered"
                );
                HttpAppError::from(AppError::NotFound(MSG_FILE_NOT_FOUND.to_string()))
            })?,
    };

    tracing::debug!(file_id = %record.id, provider = %record.storage, "Redirecting download");
    notify(
        &state.notifier,
        Notification::Downloaded {
            id: record.id,
            name: record.name,
            ip,
        },
    );

    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

/// `GET /files/{id}/{action}`: `download`, `status`, anything else answers with metadata.
pub async fn file_action(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Path((id, action)): Path<(String, String)>,
) -> Result<Response, HttpAppError> {
    match action.as_str() {
        "download" => download(&state, &id, ip).await,
        "status" => Ok(status(&state, &id).await?.into_response()),
        _ => Ok(metadata(&state, &id).await?.into_response()),
    }
}
