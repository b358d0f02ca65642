//! Upload dispatch across the storage registry.
//!
//! Each upload goes to the provider the rotation selects. If that attempt fails, the
//! remaining providers are tried in registry order until one accepts the object. Every
//! attempt yields a `Result`; failures are collected so an exhausted dispatch reports what
//! went wrong at each provider.
//!
//! A key conflict is treated like any other failure and triggers fallback, so a retried
//! upload can land on a different provider than the first one. Conflicts are logged
//! separately so they can be told apart from outages.

use crate::payload::ObjectUpload;
use crate::traits::{ObjectStore, StorageError, StorageResult, StoredObject};
use kabox_core::{Registry, RotationState};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// One failed provider attempt.
#[derive(Debug)]
pub struct AttemptFailure {
    pub provider: String,
    pub error: StorageError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no storage providers configured")]
    NoProviders,

    #[error("all storage providers exhausted ({})", summarize(.attempts))]
    Exhausted { attempts: Vec<AttemptFailure> },
}

fn summarize(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Successful dispatch.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub stored: StoredObject,
    /// Provider the rotation picked first. Differs from `stored.provider` after fallback.
    pub preferred: String,
    /// Attempts that failed before the accepting provider.
    pub failures: Vec<AttemptFailure>,
}

/// Storage registry: static provider order, rotation cursor and per-attempt timeout.
pub struct ObjectStoreRegistry {
    stores: Registry<Arc<dyn ObjectStore>>,
    attempt_timeout: Duration,
}

impl ObjectStoreRegistry {
    pub fn new(stores: Vec<Arc<dyn ObjectStore>>, attempt_timeout: Duration) -> Self {
        Self::with_rotation(stores, attempt_timeout, RotationState::new())
    }

    pub fn with_rotation(
        stores: Vec<Arc<dyn ObjectStore>>,
        attempt_timeout: Duration,
        rotation: RotationState,
    ) -> Self {
        Self {
            stores: Registry::with_rotation(stores, rotation),
            attempt_timeout,
        }
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Provider names in registry order.
    pub fn provider_names(&self) -> Vec<String> {
        self.stores.iter().map(|s| s.name().to_string()).collect()
    }

    /// Provider registered under `name`.
    pub fn find(&self, name: &str) -> Option<&Arc<dyn ObjectStore>> {
        self.stores.iter().find(|store| store.name() == name)
    }

    async fn attempt(
        &self,
        store: &Arc<dyn ObjectStore>,
        object: &ObjectUpload,
    ) -> StorageResult<StoredObject> {
        match tokio::time::timeout(self.attempt_timeout, store.put(object)).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.attempt_timeout)),
        }
    }

    fn record_failure(
        failures: &mut Vec<AttemptFailure>,
        store: &Arc<dyn ObjectStore>,
        object: &ObjectUpload,
        error: StorageError,
    ) {
        if error.is_conflict() {
            tracing::warn!(
                provider = %store.name(),
                file_id = %object.file_id,
                key = %object.object_key(),
                error = %error,
                "Object key already exists at provider, falling back"
            );
        } else {
            tracing::warn!(
                provider = %store.name(),
                file_id = %object.file_id,
                error = %error,
                "Storage upload attempt failed"
            );
        }
        failures.push(AttemptFailure {
            provider: store.name().to_string(),
            error,
        });
    }

    /// Upload to the rotation's pick, falling back through the rest in registry order.
    pub async fn upload(&self, object: &ObjectUpload) -> Result<DispatchOutcome, DispatchError> {
        let start = Instant::now();
        let (preferred_position, preferred) = self.stores.next().ok_or(DispatchError::NoProviders)?;
        let preferred_name = preferred.name().to_string();
        let mut failures = Vec::new();

        let candidates = std::iter::once((preferred_position, preferred))
            .chain(self.stores.fallback_order(preferred_position));

        for (_, store) in candidates {
            match self.attempt(store, object).await {
                Ok(stored) => {
                    if !failures.is_empty() {
                        tracing::info!(
                            preferred = %preferred_name,
                            provider = %stored.provider,
                            failed_attempts = failures.len(),
                            "Upload accepted by fallback provider"
                        );
                    }
                    tracing::debug!(
                        file_id = %object.file_id,
                        provider = %stored.provider,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Upload dispatched"
                    );
                    return Ok(DispatchOutcome {
                        stored,
                        preferred: preferred_name,
                        failures,
                    });
                }
                Err(error) => Self::record_failure(&mut failures, store, object, error),
            }
        }

        tracing::error!(
            file_id = %object.file_id,
            attempts = failures.len(),
            "All storage providers exhausted"
        );
        Err(DispatchError::Exhausted { attempts: failures })
    }

    /// URL for a stored object, rebuilt by the provider that holds it.
    pub fn public_url(&self, provider: &str, file_id: &str, file_name: &str) -> Option<String> {
        self.find(provider)
            .map(|store| store.public_url(file_id, file_name))
    }

    /// Delete an object from the provider that holds it.
    pub async fn delete(&self, provider: &str, file_id: &str, file_name: &str) -> StorageResult<()> {
        let store = self.find(provider).ok_or_else(|| {
            StorageError::ConfigError(format!("Storage provider '{}' is not registered", provider))
        })?;
        match tokio::time::timeout(self.attempt_timeout, store.delete(file_id, file_name)).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.attempt_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Behavior {
        Accept,
        Fail,
        Conflict,
        Hang,
    }

    struct ScriptedStore {
        name: &'static str,
        behavior: Behavior,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        fn name(&self) -> &str {
            self.name
        }

        async fn put(&self, object: &ObjectUpload) -> StorageResult<StoredObject> {
            self.calls.lock().unwrap().push(self.name);
            match self.behavior {
                Behavior::Accept => Ok(StoredObject {
                    provider: self.name.to_string(),
                    url: Some(format!("https://{}.test/{}", self.name, object.object_key())),
                    object_key: object.object_key(),
                }),
                Behavior::Fail => Err(StorageError::UploadFailed("unavailable".to_string())),
                Behavior::Conflict => Err(StorageError::Conflict(object.object_key())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
            }
        }

        fn public_url(&self, file_id: &str, file_name: &str) -> String {
            format!("https://{}.test/{}_{}", self.name, file_id, file_name)
        }

        async fn delete(&self, _file_id: &str, _file_name: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    fn registry(
        script: &[(&'static str, Behavior)],
    ) -> (ObjectStoreRegistry, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let stores = script
            .iter()
            .map(|&(name, behavior)| {
                Arc::new(ScriptedStore {
                    name,
                    behavior,
                    calls: Arc::clone(&calls),
                }) as Arc<dyn ObjectStore>
            })
            .collect();
        (
            ObjectStoreRegistry::new(stores, Duration::from_millis(200)),
            calls,
        )
    }

    fn upload() -> ObjectUpload {
        ObjectUpload::from_bytes("abc123", "a.txt", "text/plain", &b"data"[..])
    }

    #[tokio::test]
    async fn test_uploads_rotate_across_providers() {
        let (registry, _) = registry(&[
            ("a", Behavior::Accept),
            ("b", Behavior::Accept),
            ("c", Behavior::Accept),
        ]);
        let mut providers = Vec::new();
        for _ in 0..6 {
            providers.push(registry.upload(&upload()).await.unwrap().stored.provider);
        }
        assert_eq!(providers, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fallback_reaches_last_provider() {
        let (registry, calls) = registry(&[
            ("a", Behavior::Fail),
            ("b", Behavior::Fail),
            ("c", Behavior::Accept),
        ]);
        let outcome = registry.upload(&upload()).await.unwrap();

        assert_eq!(outcome.stored.provider, "c");
        assert_eq!(outcome.preferred, "a");
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fallback_uses_static_order_after_preferred() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let stores: Vec<Arc<dyn ObjectStore>> = [
            ("a", Behavior::Accept),
            ("b", Behavior::Fail),
            ("c", Behavior::Fail),
        ]
        .into_iter()
        .map(|(name, behavior)| {
            Arc::new(ScriptedStore {
                name,
                behavior,
                calls: Arc::clone(&calls),
            }) as Arc<dyn ObjectStore>
        })
        .collect();
        let registry = ObjectStoreRegistry::with_rotation(
            stores,
            Duration::from_millis(200),
            RotationState::starting_at(2),
        );

        let outcome = registry.upload(&upload()).await.unwrap();
        assert_eq!(outcome.preferred, "c");
        assert_eq!(outcome.stored.provider, "a");
        assert_eq!(*calls.lock().unwrap(), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_every_attempt() {
        let (registry, calls) = registry(&[
            ("a", Behavior::Fail),
            ("b", Behavior::Conflict),
            ("c", Behavior::Fail),
        ]);
        let err = registry.upload(&upload()).await.unwrap_err();

        match &err {
            DispatchError::Exhausted { attempts } => {
                let providers: Vec<&str> = attempts.iter().map(|a| a.provider.as_str()).collect();
                assert_eq!(providers, vec!["a", "b", "c"]);
                assert!(attempts[1].error.is_conflict());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().starts_with("all storage providers exhausted"));
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_conflict_triggers_fallback() {
        let (registry, _) = registry(&[("a", Behavior::Conflict), ("b", Behavior::Accept)]);
        let outcome = registry.upload(&upload()).await.unwrap();
        assert_eq!(outcome.stored.provider, "b");
        assert!(outcome.failures[0].error.is_conflict());
    }

    #[tokio::test]
    async fn test_hung_provider_times_out_and_falls_back() {
        let (registry, _) = registry(&[("a", Behavior::Hang), ("b", Behavior::Accept)]);
        let outcome = registry.upload(&upload()).await.unwrap();
        assert_eq!(outcome.stored.provider, "b");
        assert!(matches!(outcome.failures[0].error, StorageError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_empty_registry() {
        let registry = ObjectStoreRegistry::new(Vec::new(), Duration::from_secs(1));
        assert!(matches!(
            registry.upload(&upload()).await,
            Err(DispatchError::NoProviders)
        ));
    }

    #[tokio::test]
    async fn test_public_url_and_delete_route_by_provider_name() {
        let (registry, _) = registry(&[("a", Behavior::Accept), ("b", Behavior::Accept)]);
        assert_eq!(
            registry.public_url("b", "id1", "x.txt").as_deref(),
            Some("https://b.test/id1_x.txt")
        );
        assert!(registry.public_url("zzz", "id1", "x.txt").is_none());
        assert!(registry.delete("a", "id1", "x.txt").await.is_ok());
        assert!(matches!(
            registry.delete("zzz", "id1", "x.txt").await,
            Err(StorageError::ConfigError(_))
        ));
    }
}
