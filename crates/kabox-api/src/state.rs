//! Application state shared by every handler.

use crate::middleware::rate_limit::HttpRateLimiter;
use crate::services::Notifier;
use kabox_core::Config;
use kabox_db::RecordStoreRegistry;
use kabox_storage::ObjectStoreRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Storage registry: upload dispatch with fallback.
    pub storage: Arc<ObjectStoreRegistry>,
    /// Database registry: rotating metadata writes and ordered lookups.
    pub databases: Arc<RecordStoreRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub rate_limiter: Arc<HttpRateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        storage: ObjectStoreRegistry,
        databases: RecordStoreRegistry,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let rate_limiter = Arc::new(HttpRateLimiter::new(
            config.rate_limit_requests(),
            Duration::from_millis(config.rate_limit_window_ms()),
        ));
        Self {
            config,
            storage: Arc::new(storage),
            databases: Arc::new(databases),
            notifier,
            rate_limiter,
            started_at: Instant::now(),
        }
    }

    /// Public download link for a file, independent of where it is stored.
    pub fn download_url(&self, file_id: &str) -> String {
        format!(
            "{}{}/{}/download",
            self.config.public_base_url(),
            crate::constants::FILES_PREFIX,
            file_id
        )
    }
}
