use crate::{
    DatabaseBackend, DbError, DbResult, PostgresRecordStore, RecordStore, RecordStoreRegistry,
    SupabaseRecordStore, TursoRecordStore,
};
use kabox_core::Config;
use std::sync::Arc;
use std::time::Duration;

/// Create one metadata backend
pub fn create_record_store(
    config: &Config,
    backend: DatabaseBackend,
) -> DbResult<Arc<dyn RecordStore>> {
    match backend {
        DatabaseBackend::Supabase => {
            let credentials = config.supabase().ok_or_else(|| {
                DbError::Config("SUPABASE_URL or SUPABASE_ANON_KEY not configured".to_string())
            })?;
            Ok(Arc::new(SupabaseRecordStore::new(credentials)?))
        }

        DatabaseBackend::Neon => {
            let url = config
                .neon_connection()
                .ok_or_else(|| DbError::Config("NEON_CONNECTION not configured".to_string()))?;
            Ok(Arc::new(PostgresRecordStore::connect_lazy(
                url,
                config.db_max_connections(),
                Duration::from_secs(config.db_timeout_seconds()),
            )?))
        }

        DatabaseBackend::Turso => {
            let credentials = config.turso().ok_or_else(|| {
                DbError::Config(
                    "TURSO_DATABASE_URL or TURSO_AUTH_TOKEN not configured".to_string(),
                )
            })?;
            Ok(Arc::new(TursoRecordStore::new(credentials)?))
        }
    }
}

/// Create the database registry in the order given by `DATABASE_BACKENDS`
pub fn create_record_stores(config: &Config) -> DbResult<RecordStoreRegistry> {
    let mut stores = Vec::with_capacity(config.database_backends().len());
    for backend in config.database_backends() {
        stores.push(create_record_store(config, *backend)?);
        tracing::info!(database = %backend, "Database registered");
    }

    Ok(RecordStoreRegistry::new(
        stores,
        Duration::from_secs(config.db_timeout_seconds()),
    ))
}
