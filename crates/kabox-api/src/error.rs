//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Domain errors convert into
//! [`AppError`] and render as `{author, email, success: false, error, code}` with a stable
//! client message; full detail only goes to the log.

use crate::envelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kabox_core::{AppError, ErrorMetadata, LogLevel};
use kabox_db::DbError;
use kabox_storage::{DispatchError, StorageError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'static str>,
    pub success: bool,
    pub error: String,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        let attribution = envelope::attribution();
        Self {
            author: attribution.author.as_deref(),
            email: attribution.email.as_deref(),
            success: false,
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }
}

/// [`AppError`] as an axum response.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        })
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let mut body = ErrorResponse::new(app_error.client_message(), app_error.error_code());
        if envelope::attribution().expose_details && !app_error.is_sensitive() {
            body.details = Some(app_error.detailed_message());
        }

        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        let app = match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
            other => AppError::Storage(other.to_string()),
        };
        HttpAppError(app)
    }
}

impl From<DispatchError> for HttpAppError {
    fn from(err: DispatchError) -> Self {
        HttpAppError(AppError::StorageExhausted(err.to_string()))
    }
}

impl From<DbError> for HttpAppError {
    fn from(err: DbError) -> Self {
        HttpAppError(AppError::Database(err.to_string()))
    }
}
