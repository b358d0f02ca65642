//! Kabox Core Library
//!
//! This crate provides the domain models, error types, configuration, validation and
//! backend rotation primitives shared by the storage, database and API crates.

pub mod backend_types;
pub mod config;
pub mod error;
pub mod id;
pub mod models;
pub mod registry;
pub mod validation;

// Re-export commonly used types
pub use backend_types::{DatabaseBackend, StorageProvider};
pub use config::{
    BaseConfig, CloudinaryCredentials, Config, ImageKitCredentials, LocalStorageSettings,
    RelayConfig, SupabaseCredentials, TelegramSettings, TursoCredentials,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use id::{generate_file_id, is_valid_file_id};
pub use models::{parse_timestamp, FileRecord, FileStatus, NewFileRecord};
pub use registry::{Registry, RotationState};
pub use validation::{sanitize_filename, validate_upload, ValidatedUpload, ValidationError};
