//! Administrative delete.
//!
//! Only routed when `ADMIN_API_KEY` is set. The object is removed from the provider the
//! record names, then the row from every database.

use crate::constants::{MSG_FILE_NOT_FOUND, MSG_INVALID_REQUEST};
use crate::envelope::{self, ApiResponse};
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use kabox_core::{is_valid_file_id, AppError};
use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Debug, Serialize)]
pub struct DeletedFile {
    pub id: String,
    pub deleted: bool,
}

fn authorize(headers: &HeaderMap, admin_key: &str) -> Result<(), HttpAppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default();

    if bool::from(token.as_bytes().ct_eq(admin_key.as_bytes())) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Unauthorized".to_string()).into())
    }
}

/// `DELETE /api/files/{id}`
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<DeletedFile>>, HttpAppError> {
    let admin_key = state
        .config
        .admin_api_key()
        .ok_or_else(|| AppError::NotFound(MSG_INVALID_REQUEST.to_string()))?;
    authorize(&headers, admin_key)?;

    if !is_valid_file_id(&id) {
        return Err(AppError::BadRequest(MSG_INVALID_REQUEST.to_string()).into());
    }

    let record = state
        .databases
        .resolve(&id)
        .await
        .ok_or_else(|| AppError::NotFound(MSG_FILE_NOT_FOUND.to_string()))?;

    if let Err(e) = state
        .storage
        .delete(&record.storage, &record.id, &record.name)
        .await
    {
        tracing::warn!(
            file_id = %id,
            provider = %record.storage,
            error = %e,
            "Failed to delete object from storage"
        );
    }

    let removed = state.databases.delete_everywhere(&id).await;
    tracing::info!(file_id = %id, rows_removed = removed, "File deleted");

    Ok(envelope::success(DeletedFile { id, deleted: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_authorize() {
        assert!(authorize(&bearer("s3cret-admin-key"), "s3cret-admin-key").is_ok());
        assert!(authorize(&bearer("s3cret-admin-kez"), "s3cret-admin-key").is_err());
        assert!(authorize(&bearer("short"), "s3cret-admin-key").is_err());
        assert!(authorize(&HeaderMap::new(), "s3cret-admin-key").is_err());
    }
}
