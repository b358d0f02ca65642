//! Request-level failures.
//!
//! Every failure a handler can surface is an [`AppError`]. How a variant is presented over
//! HTTP (status, code, message, log level) lives here in [`ErrorMetadata`], so the API layer
//! never matches on backend error types.

use std::error::Error as StdError;
use std::io;

/// Message for failures whose detail stays server-side.
pub const GENERIC_ERROR_MESSAGE: &str = "Terjadi kesalahan";

const STORAGE_EXHAUSTED_MESSAGE: &str = "Semua penyimpanan gagal";
const MAX_SOURCE_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected outcomes: validation, not found, bad paths.
    Debug,
    /// Client misbehaviour worth noticing, such as rate limiting.
    Warn,
    /// Backend or internal failures.
    Error,
}

/// HTTP presentation of an error.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Stable machine-readable code, e.g. `NOT_FOUND`.
    fn error_code(&self) -> &'static str;

    /// Whether the same request may succeed later.
    fn is_recoverable(&self) -> bool;

    /// Message safe to show to the caller.
    fn client_message(&self) -> String;

    /// Sensitive errors never expose details, even outside production.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("All storage providers failed: {0}")]
    StorageExhausted(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("Malformed JSON: {}", err))
    }
}

impl From<crate::validation::ValidationError> for AppError {
    fn from(err: crate::validation::ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Fixed presentation of one variant.
struct Presentation {
    status: u16,
    code: &'static str,
    recoverable: bool,
    sensitive: bool,
    level: LogLevel,
}

impl Presentation {
    const fn client(status: u16, code: &'static str) -> Self {
        Self {
            status,
            code,
            recoverable: false,
            sensitive: false,
            level: LogLevel::Debug,
        }
    }

    const fn server(code: &'static str) -> Self {
        Self {
            status: 500,
            code,
            recoverable: true,
            sensitive: true,
            level: LogLevel::Error,
        }
    }
}

impl AppError {
    fn presentation(&self) -> Presentation {
        match self {
            AppError::Database(_) => Presentation::server("DATABASE_ERROR"),
            AppError::Storage(_) => Presentation::server("STORAGE_ERROR"),
            AppError::StorageExhausted(_) => Presentation::server("STORAGE_EXHAUSTED"),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                Presentation::server("INTERNAL_ERROR")
            }
            AppError::InvalidInput(_) => Presentation::client(400, "INVALID_INPUT"),
            AppError::BadRequest(_) => Presentation::client(400, "BAD_REQUEST"),
            AppError::NotFound(_) => Presentation::client(404, "NOT_FOUND"),
            AppError::PayloadTooLarge(_) => Presentation::client(413, "PAYLOAD_TOO_LARGE"),
            AppError::Unauthorized(_) => Presentation::client(401, "UNAUTHORIZED"),
            AppError::TooManyRequests(_) => Presentation {
                recoverable: true,
                level: LogLevel::Warn,
                ..Presentation::client(429, "RATE_LIMITED")
            },
        }
    }

    /// Variant name, used as a log field.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::StorageExhausted(_) => "StorageExhausted",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::TooManyRequests(_) => "TooManyRequests",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// The error followed by up to five `Caused by:` lines from its source chain.
    pub fn detailed_message(&self) -> String {
        let mut chain = std::iter::successors(self.source(), |&err| err.source());
        let mut details = self.to_string();

        for cause in chain.by_ref().take(MAX_SOURCE_DEPTH) {
            details.push_str("\n  Caused by: ");
            details.push_str(&cause.to_string());
        }
        if chain.next().is_some() {
            details.push_str("\n  ... (truncated)");
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        self.presentation().status
    }

    fn error_code(&self) -> &'static str {
        self.presentation().code
    }

    fn is_recoverable(&self) -> bool {
        self.presentation().recoverable
    }

    fn is_sensitive(&self) -> bool {
        self.presentation().sensitive
    }

    fn log_level(&self) -> LogLevel {
        self.presentation().level
    }

    fn client_message(&self) -> String {
        match self {
            AppError::StorageExhausted(_) => STORAGE_EXHAUSTED_MESSAGE.to_string(),
            AppError::InvalidInput(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::Unauthorized(msg)
            | AppError::TooManyRequests(msg) => msg.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}
