use crate::constants::MSG_NO_FILES;
use crate::envelope::{self, ApiResponse};
use crate::error::HttpAppError;
use crate::services::{UploadItem, UploadService};
use crate::state::AppState;
use crate::utils::{spool_uploads, ClientIp};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use kabox_core::AppError;
use std::sync::Arc;

/// `POST /api/upload`: multipart field `files`, one result entry per file.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<Vec<UploadItem>>>, HttpAppError> {
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Upload without multipart body");
        AppError::BadRequest(MSG_NO_FILES.to_string())
    })?;

    let files = spool_uploads(
        multipart,
        state.config.max_files_per_upload(),
        state.config.max_file_size_bytes(),
    )
    .await?;

    if files.is_empty() {
        return Err(AppError::BadRequest(MSG_NO_FILES.to_string()).into());
    }

    tracing::info!(client_ip = %ip, file_count = files.len(), "Upload request received");

    let results = UploadService::new(&state).upload_all(&files, &ip).await;

    tracing::debug!(
        succeeded = results.iter().filter(|r| r.is_success()).count(),
        failed = results.iter().filter(|r| !r.is_success()).count(),
        "Upload request finished"
    );

    Ok(envelope::success(results))
}
