#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::{
    CloudinaryStorage, ImageKitStorage, ObjectStore, ObjectStoreRegistry, StorageError,
    StorageProvider, StorageResult, SupabaseStorage,
};
use kabox_core::Config;
use std::sync::Arc;
use std::time::Duration;

/// Create one storage backend
pub async fn create_object_store(
    config: &Config,
    provider: StorageProvider,
) -> StorageResult<Arc<dyn ObjectStore>> {
    match provider {
        StorageProvider::Cloudinary => {
            let credentials = config.cloudinary().ok_or_else(|| {
                StorageError::ConfigError("CLOUDINARY_* credentials not configured".to_string())
            })?;
            Ok(Arc::new(CloudinaryStorage::new(credentials)?))
        }

        StorageProvider::ImageKit => {
            let credentials = config.imagekit().ok_or_else(|| {
                StorageError::ConfigError("IMAGEKIT_* credentials not configured".to_string())
            })?;
            Ok(Arc::new(ImageKitStorage::new(credentials)?))
        }

        StorageProvider::Supabase => {
            let credentials = config.supabase().ok_or_else(|| {
                StorageError::ConfigError(
                    "SUPABASE_URL or SUPABASE_ANON_KEY not configured".to_string(),
                )
            })?;
            Ok(Arc::new(SupabaseStorage::new(credentials)?))
        }

        #[cfg(feature = "storage-local")]
        StorageProvider::Local => {
            let settings = config.local_storage();
            let storage = LocalStorage::new(&settings.path, settings.base_url.clone()).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageProvider::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

/// Create the storage registry in the order given by `STORAGE_PROVIDERS`
pub async fn create_object_stores(config: &Config) -> StorageResult<ObjectStoreRegistry> {
    let mut stores = Vec::with_capacity(config.storage_providers().len());
    for provider in config.storage_providers() {
        stores.push(create_object_store(config, *provider).await?);
        tracing::info!(provider = %provider, "Storage provider registered");
    }

    Ok(ObjectStoreRegistry::new(
        stores,
        Duration::from_secs(config.provider_timeout_secs()),
    ))
}
