//! Metadata writes and lookups across the database registry.
//!
//! Each record is written to exactly one database, picked by rotation. A failed write is
//! not retried elsewhere: the error goes back to the caller. Lookups scan every database in
//! registry order and return the first hit; a backend that errors during the scan is
//! logged and skipped.

use crate::traits::{DbError, DbResult, RecordStore};
use kabox_core::{FileRecord, NewFileRecord, Registry, RotationState};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where a record was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub database: String,
}

pub struct RecordStoreRegistry {
    stores: Registry<Arc<dyn RecordStore>>,
    query_timeout: Duration,
}

impl RecordStoreRegistry {
    pub fn new(stores: Vec<Arc<dyn RecordStore>>, query_timeout: Duration) -> Self {
        Self::with_rotation(stores, query_timeout, RotationState::new())
    }

    pub fn with_rotation(
        stores: Vec<Arc<dyn RecordStore>>,
        query_timeout: Duration,
        rotation: RotationState,
    ) -> Self {
        Self {
            stores: Registry::with_rotation(stores, rotation),
            query_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Database names in registry order.
    pub fn database_names(&self) -> Vec<String> {
        self.stores.iter().map(|s| s.name().to_string()).collect()
    }

    async fn timed<T>(&self, operation: impl Future<Output = DbResult<T>>) -> DbResult<T> {
        match tokio::time::timeout(self.query_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(DbError::Timeout(self.query_timeout)),
        }
    }

    /// Run `initialize` on every database. A database that fails stays registered, its
    /// lookups are skipped while it is unhealthy. Returns how many initialized cleanly.
    pub async fn initialize_all(&self) -> usize {
        let mut ready = 0;
        for store in self.stores.iter() {
            match self.timed(store.initialize()).await {
                Ok(()) => {
                    ready += 1;
                    tracing::info!(database = %store.name(), "Database initialized");
                }
                Err(e) => {
                    tracing::error!(database = %store.name(), error = %e, "Database initialization failed");
                }
            }
        }
        ready
    }

    /// Write one record to the database the rotation selects.
    pub async fn write(&self, record: &NewFileRecord) -> DbResult<WriteReceipt> {
        let start = Instant::now();
        let (_, store) = self.stores.next().ok_or(DbError::NoDatabases)?;

        match self.timed(store.insert(record)).await {
            Ok(()) => {
                tracing::debug!(
                    file_id = %record.id,
                    database = %store.name(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "File record written"
                );
                Ok(WriteReceipt {
                    database: store.name().to_string(),
                })
            }
            Err(e) => {
                tracing::error!(
                    file_id = %record.id,
                    database = %store.name(),
                    error = %e,
                    "File record write failed"
                );
                Err(e)
            }
        }
    }

    /// First record found for `id`, scanning databases in registry order.
    pub async fn resolve(&self, id: &str) -> Option<FileRecord> {
        for store in self.stores.iter() {
            match self.timed(store.get_by_key(id)).await {
                Ok(Some(record)) => {
                    tracing::debug!(file_id = %id, database = %store.name(), "File record resolved");
                    return Some(record);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        file_id = %id,
                        database = %store.name(),
                        error = %e,
                        "Lookup failed, skipping database"
                    );
                }
            }
        }
        None
    }

    /// Remove `id` from every database. Returns how many rows were removed.
    pub async fn delete_everywhere(&self, id: &str) -> usize {
        let mut removed = 0;
        for store in self.stores.iter() {
            match self.timed(store.delete(id)).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(file_id = %id, database = %store.name(), error = %e, "Delete failed");
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kabox_core::FileStatus;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        name: &'static str,
        failing: bool,
        hang: bool,
        rows: Mutex<HashMap<String, FileRecord>>,
        inserts: Mutex<usize>,
        lookups: Mutex<usize>,
    }

    impl MemoryStore {
        fn named(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                ..Default::default()
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                failing: true,
                ..Default::default()
            })
        }

        fn hanging(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                hang: true,
                ..Default::default()
            })
        }

        fn with_row(name: &'static str, record: NewFileRecord) -> Arc<Self> {
            let store = Self::named(name);
            store
                .rows
                .lock()
                .unwrap()
                .insert(record.id.clone(), record.into_record(None));
            store
        }

        fn inserts(&self) -> usize {
            *self.inserts.lock().unwrap()
        }

        fn lookups(&self) -> usize {
            *self.lookups.lock().unwrap()
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        fn name(&self) -> &str {
            self.name
        }

        async fn initialize(&self) -> DbResult<()> {
            if self.failing {
                return Err(DbError::Query("unreachable".to_string()));
            }
            Ok(())
        }

        async fn insert(&self, record: &NewFileRecord) -> DbResult<()> {
            *self.inserts.lock().unwrap() += 1;
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.failing {
                return Err(DbError::Query("insert rejected".to_string()));
            }
            self.rows
                .lock()
                .unwrap()
                .insert(record.id.clone(), record.clone().into_record(None));
            Ok(())
        }

        async fn get_by_key(&self, id: &str) -> DbResult<Option<FileRecord>> {
            *self.lookups.lock().unwrap() += 1;
            if self.failing {
                return Err(DbError::Query("lookup rejected".to_string()));
            }
            Ok(self.rows.lock().unwrap().get(id).cloned())
        }

        async fn delete(&self, id: &str) -> DbResult<bool> {
            if self.failing {
                return Err(DbError::Query("delete rejected".to_string()));
            }
            Ok(self.rows.lock().unwrap().remove(id).is_some())
        }
    }

    fn record(id: &str, storage: &str) -> NewFileRecord {
        NewFileRecord {
            id: id.to_string(),
            name: format!("{id}.txt"),
            size: 10,
            mime_type: Some("text/plain".to_string()),
            storage: storage.to_string(),
            url: None,
            ip: None,
            status: FileStatus::Completed,
        }
    }

    fn registry(stores: &[Arc<MemoryStore>]) -> RecordStoreRegistry {
        RecordStoreRegistry::new(
            stores
                .iter()
                .map(|s| s.clone() as Arc<dyn RecordStore>)
                .collect(),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_writes_rotate_across_databases() {
        let stores = [
            MemoryStore::named("supabase"),
            MemoryStore::named("neon"),
            MemoryStore::named("turso"),
        ];
        let registry = registry(&stores);

        let mut written_to = Vec::new();
        for i in 0..6 {
            let receipt = registry.write(&record(&format!("id{i}"), "local")).await.unwrap();
            written_to.push(receipt.database);
        }

        assert_eq!(
            written_to,
            ["supabase", "neon", "turso", "supabase", "neon", "turso"]
        );
        assert!(stores.iter().all(|s| s.inserts() == 2));
    }

    #[tokio::test]
    async fn test_failed_write_is_not_retried_elsewhere() {
        let stores = [MemoryStore::failing("supabase"), MemoryStore::named("neon")];
        let registry = registry(&stores);

        let result = registry.write(&record("abc", "local")).await;

        assert!(matches!(result, Err(DbError::Query(_))));
        assert_eq!(stores[0].inserts(), 1);
        assert_eq!(stores[1].inserts(), 0);
        assert!(registry.resolve("abc").await.is_none());

        // Rotation still moved on.
        let receipt = registry.write(&record("def", "local")).await.unwrap();
        assert_eq!(receipt.database, "neon");
    }

    #[tokio::test]
    async fn test_write_times_out() {
        let stores = [MemoryStore::hanging("turso")];
        let registry = registry(&stores);

        let result = registry.write(&record("abc", "local")).await;
        assert!(matches!(result, Err(DbError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_write_without_databases() {
        let registry = registry(&[]);
        let result = registry.write(&record("abc", "local")).await;
        assert!(matches!(result, Err(DbError::NoDatabases)));
    }

    #[tokio::test]
    async fn test_resolve_scans_in_registry_order() {
        let stores = [
            MemoryStore::named("supabase"),
            MemoryStore::with_row("neon", record("abc", "cloudinary")),
            MemoryStore::with_row("turso", record("abc", "imagekit")),
        ];
        let registry = registry(&stores);

        let found = registry.resolve("abc").await.unwrap();

        assert_eq!(found.storage, "cloudinary");
        assert_eq!(stores[0].lookups(), 1);
        assert_eq!(stores[1].lookups(), 1);
        assert_eq!(stores[2].lookups(), 0);
    }

    #[tokio::test]
    async fn test_resolve_skips_failing_databases() {
        let stores = [
            MemoryStore::failing("supabase"),
            MemoryStore::with_row("turso", record("abc", "supabase")),
        ];
        let registry = registry(&stores);

        let found = registry.resolve("abc").await.unwrap();
        assert_eq!(found.id, "abc");
    }

    #[tokio::test]
    async fn test_resolve_misses_when_every_database_fails() {
        let stores = [MemoryStore::failing("supabase"), MemoryStore::failing("neon")];
        let registry = registry(&stores);

        assert!(registry.resolve("abc").await.is_none());
        assert!(registry.resolve("abc").await.is_none());
        assert_eq!(stores[0].lookups(), 2);
        assert_eq!(stores[1].lookups(), 2);
    }

    #[tokio::test]
    async fn test_written_record_is_resolvable() {
        let stores = [MemoryStore::named("supabase"), MemoryStore::named("turso")];
        let registry = registry(&stores);

        registry.write(&record("first", "local")).await.unwrap();
        registry.write(&record("second", "local")).await.unwrap();

        assert_eq!(registry.resolve("second").await.unwrap().name, "second.txt");
        assert_eq!(stores[1].lookups(), 1);
    }

    #[tokio::test]
    async fn test_delete_everywhere_counts_removed_rows() {
        let stores = [
            MemoryStore::with_row("supabase", record("abc", "local")),
            MemoryStore::failing("neon"),
            MemoryStore::named("turso"),
        ];
        let registry = registry(&stores);

        assert_eq!(registry.delete_everywhere("abc").await, 1);
        assert_eq!(registry.delete_everywhere("abc").await, 0);
    }

    #[tokio::test]
    async fn test_initialize_all_keeps_failing_databases() {
        let stores = [
            MemoryStore::failing("supabase"),
            MemoryStore::named("neon"),
            MemoryStore::named("turso"),
        ];
        let registry = registry(&stores);

        assert_eq!(registry.initialize_all().await, 2);
        assert_eq!(registry.len(), 3);
    }
}
