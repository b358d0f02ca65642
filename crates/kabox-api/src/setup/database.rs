use anyhow::{Context, Result};
use kabox_core::Config;
use kabox_db::{create_record_stores, RecordStoreRegistry};

/// Build the database registry in `DATABASE_BACKENDS` order and initialize every backend.
///
/// A backend that fails to initialize stays registered; lookups skip it while it errors.
pub async fn setup_databases(config: &Config) -> Result<RecordStoreRegistry> {
    let registry =
        create_record_stores(config).context("Failed to initialize database backends")?;

    let ready = registry.initialize_all().await;
    if ready < registry.len() {
        tracing::warn!(
            ready,
            configured = registry.len(),
            "Some databases failed to initialize"
        );
    }

    tracing::info!(
        databases = %registry.database_names().join(","),
        "Database registry ready"
    );
    Ok(registry)
}
