//! Test helpers: build AppState and router around in-memory backends.
//!
//! Run from workspace root: `cargo test -p kabox-api`.

#![allow(dead_code)]

pub mod stores;

use axum_test::TestServer;
use kabox_api::setup::routes;
use kabox_api::state::AppState;
use kabox_api::NoopNotifier;
use kabox_core::Config;
use kabox_db::{RecordStore, RecordStoreRegistry};
use kabox_storage::{ObjectStore, ObjectStoreRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use stores::{MemoryObjectStore, MemoryRecordStore, StoreBehavior};

pub const TEST_BASE_URL: &str = "http://kabox.test";
pub const TEST_AUTHOR: &str = "kabox";
pub const TEST_EMAIL: &str = "admin@kabox.test";
pub const TEST_ADMIN_KEY: &str = "test-admin-key-0123456789abcdef0123";

/// Test application: server plus handles on every backend double.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Vec<Arc<MemoryObjectStore>>,
    pub databases: Vec<Arc<MemoryRecordStore>>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn total_puts(&self) -> usize {
        self.storage.iter().map(|s| s.put_count()).sum()
    }
}

pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("PUBLIC_BASE_URL", TEST_BASE_URL),
        ("AUTHOR_NAME", TEST_AUTHOR),
        ("AUTHOR_EMAIL", TEST_EMAIL),
        ("RATE_LIMIT_REQUESTS", "1000"),
        ("ADMIN_API_KEY", TEST_ADMIN_KEY),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    Config::from_source(|key| vars.get(key).cloned()).expect("valid test config")
}

/// Three healthy providers and three healthy databases.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(default_storage(), default_databases(), &[]).await
}

pub fn default_storage() -> Vec<Arc<MemoryObjectStore>> {
    ["cloudinary", "imagekit", "supabase"]
        .into_iter()
        .map(|name| MemoryObjectStore::new(name, StoreBehavior::Accept))
        .collect()
}

pub fn default_databases() -> Vec<Arc<MemoryRecordStore>> {
    ["supabase", "neon", "turso"]
        .into_iter()
        .map(MemoryRecordStore::healthy)
        .collect()
}

pub async fn setup_test_app_with(
    storage: Vec<Arc<MemoryObjectStore>>,
    databases: Vec<Arc<MemoryRecordStore>>,
    overrides: &[(&str, &str)],
) -> TestApp {
    let config = test_config(overrides);

    let object_stores = ObjectStoreRegistry::new(
        storage
            .iter()
            .map(|s| s.clone() as Arc<dyn ObjectStore>)
            .collect(),
        Duration::from_secs(2),
    );
    let record_stores = RecordStoreRegistry::new(
        databases
            .iter()
            .map(|s| s.clone() as Arc<dyn RecordStore>)
            .collect(),
        Duration::from_secs(2),
    );

    let state = Arc::new(AppState::new(
        config.clone(),
        object_stores,
        record_stores,
        Arc::new(NoopNotifier),
    ));
    let router = routes::setup_routes(&config, state).expect("Failed to build routes");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        storage,
        databases,
    }
}
