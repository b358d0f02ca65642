//! Kabox Storage Library
//!
//! Object storage for uploaded files. Every provider implements [`ObjectStore`]; the
//! [`ObjectStoreRegistry`] picks a provider round-robin for each upload and falls back to
//! the remaining providers in registry order when the chosen one fails.
//!
//! # Object key format
//!
//! All providers store an upload under the `kabox` folder as `{file_id}_{sanitized name}`.
//! Cloudinary addresses objects by public id instead and uses `kabox/{file_id}`.
//! Key generation lives in the `keys` module so providers stay consistent.

pub mod cloudinary;
pub mod dispatch;
pub mod factory;
pub(crate) mod http;
pub mod imagekit;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod payload;
pub mod supabase;
pub mod traits;

// Re-export commonly used types
pub use cloudinary::CloudinaryStorage;
pub use dispatch::{AttemptFailure, DispatchError, DispatchOutcome, ObjectStoreRegistry};
pub use factory::create_object_stores;
pub use imagekit::ImageKitStorage;
pub use kabox_core::StorageProvider;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use payload::ObjectUpload;
pub use supabase::SupabaseStorage;
pub use traits::{ObjectStore, StorageError, StorageResult, StoredObject};
