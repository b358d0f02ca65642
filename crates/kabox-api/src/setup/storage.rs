use anyhow::{Context, Result};
use kabox_core::Config;
use kabox_storage::{create_object_stores, ObjectStoreRegistry};

/// Build the storage registry in `STORAGE_PROVIDERS` order.
pub async fn setup_storage(config: &Config) -> Result<ObjectStoreRegistry> {
    let registry = create_object_stores(config)
        .await
        .context("Failed to initialize storage providers")?;

    tracing::info!(
        providers = %registry.provider_names().join(","),
        timeout_secs = config.provider_timeout_secs(),
        "Storage registry ready"
    );
    Ok(registry)
}
