//! Tenant-partitioned checkpoint store
//!
//! Each tenant gets exactly one backend, created on first use. The shared map
//! lock only guards slot creation; opening the connection and running setup
//! happen under the tenant's own slot, so one tenant's slow setup never
//! blocks another tenant.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::info;

use crate::domain::checkpoint::{
    ChannelVersions, Checkpoint, CheckpointBackendFactory, CheckpointMetadata, CheckpointSaver,
    CheckpointStream, CheckpointTuple, ListOptions, RunConfig, TenantKey,
};
use crate::domain::DomainError;

#[derive(Debug, Default)]
struct TenantSlot {
    backend: OnceCell<Arc<dyn CheckpointSaver>>,
    setup_done: AtomicBool,
}

pub struct TenantAwareCheckpointSaver {
    factory: Arc<dyn CheckpointBackendFactory>,
    slots: RwLock<HashMap<TenantKey, Arc<TenantSlot>>>,
}

impl std::fmt::Debug for TenantAwareCheckpointSaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantAwareCheckpointSaver")
            .field("factory", &self.factory)
            .field("tenants", &self.tenant_count())
            .finish()
    }
}

impl TenantAwareCheckpointSaver {
    pub fn new(factory: Arc<dyn CheckpointBackendFactory>) -> Self {
        Self {
            factory,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// The tenant's backend, connecting and running setup on first use
    ///
    /// Concurrent first calls for one tenant wait for a single connection
    /// attempt. Connection and setup failures are returned as-is and the
    /// next call tries again.
    pub async fn acquire(&self, tenant: &TenantKey) -> Result<Arc<dyn CheckpointSaver>, DomainError> {
        let slot = self.slot(tenant)?;

        let backend = slot
            .backend
            .get_or_try_init(|| async {
                info!(tenant = %tenant, "Creating checkpoint backend for tenant");
                let backend = self.factory.connect(tenant).await?;

                if !slot.setup_done.load(Ordering::Acquire) {
                    backend.setup().await?;
                    slot.setup_done.store(true, Ordering::Release);
                    info!(tenant = %tenant, "Checkpoint tables initialized");
                }

                Ok::<_, DomainError>(backend)
            })
            .await?;

        Ok(Arc::clone(backend))
    }

    /// Backend already cached for the tenant, without connecting
    pub fn cached(&self, tenant: &TenantKey) -> Option<Arc<dyn CheckpointSaver>> {
        let slots = self.slots.read().ok()?;
        slots.get(tenant)?.backend.get().cloned()
    }

    /// Whether the tenant's one-time setup has completed
    pub fn is_initialized(&self, tenant: &TenantKey) -> bool {
        self.slots
            .read()
            .ok()
            .and_then(|slots| slots.get(tenant).map(|s| s.setup_done.load(Ordering::Acquire)))
            .unwrap_or(false)
    }

    /// Number of tenants that have been seen, connected or not
    pub fn tenant_count(&self) -> usize {
        self.slots.read().map(|slots| slots.len()).unwrap_or(0)
    }

    pub async fn get_tuple(
        &self,
        tenant: &TenantKey,
        config: &RunConfig,
    ) -> Result<Option<CheckpointTuple>, DomainError> {
        self.acquire(tenant).await?.get_tuple(config).await
    }

    pub async fn put(
        &self,
        tenant: &TenantKey,
        config: &RunConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<RunConfig, DomainError> {
        self.acquire(tenant)
            .await?
            .put(config, checkpoint, metadata, new_versions)
            .await
    }

    pub async fn put_writes(
        &self,
        tenant: &TenantKey,
        config: &RunConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
        task_path: &str,
    ) -> Result<(), DomainError> {
        self.acquire(tenant)
            .await?
            .put_writes(config, writes, task_id, task_path)
            .await
    }

    pub async fn list(
        &self,
        tenant: &TenantKey,
        config: Option<&RunConfig>,
        options: ListOptions,
    ) -> Result<CheckpointStream, DomainError> {
        self.acquire(tenant).await?.list(config, options).await
    }

    pub async fn delete_thread(&self, tenant: &TenantKey, thread_id: &str) -> Result<(), DomainError> {
        self.acquire(tenant).await?.delete_thread(thread_id).await
    }

    fn slot(&self, tenant: &TenantKey) -> Result<Arc<TenantSlot>, DomainError> {
        {
            let slots = self.slots.read().map_err(|e| {
                DomainError::internal(format!("Failed to acquire tenant map lock: {}", e))
            })?;
            if let Some(slot) = slots.get(tenant) {
                return Ok(Arc::clone(slot));
            }
        }

        let mut slots = self.slots.write().map_err(|e| {
            DomainError::internal(format!("Failed to acquire tenant map lock: {}", e))
        })?;

        Ok(Arc::clone(slots.entry(tenant.clone()).or_default()))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CountingFactory;
    use super::*;
    use futures::future::join_all;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_acquire_twice_runs_setup_once() {
        let factory = Arc::new(CountingFactory::new());
        let store = TenantAwareCheckpointSaver::new(factory.clone());
        let tenant = TenantKey::new("acme");

        let first = store.acquire(&tenant).await.unwrap();
        let second = store.acquire(&tenant).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.connect_count(), 1);
        assert_eq!(factory.setup_count(), 1);
        assert!(store.is_initialized(&tenant));
        assert!(store.cached(&tenant).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_connects_once() {
        let factory = Arc::new(CountingFactory::new().with_delay(Duration::from_millis(50)));
        let store = Arc::new(TenantAwareCheckpointSaver::new(factory.clone()));
        let tenant = TenantKey::new("acme");

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let tenant = tenant.clone();
                tokio::spawn(async move { store.acquire(&tenant).await })
            })
            .collect();

        let backends: Vec<Arc<dyn CheckpointSaver>> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(factory.connect_count(), 1);
        assert_eq!(factory.setup_count(), 1);
        assert!(backends.iter().all(|b| Arc::ptr_eq(b, &backends[0])));
    }

    #[tokio::test]
    async fn test_distinct_tenants_do_not_block_each_other() {
        let delay = Duration::from_millis(100);
        let factory = Arc::new(CountingFactory::new().with_delay(delay));
        let store = TenantAwareCheckpointSaver::new(factory.clone());
        let tenants: Vec<TenantKey> = (0..20).map(|i| TenantKey::new(format!("t{}", i))).collect();

        let started = Instant::now();
        let results = join_all(tenants.iter().map(|t| store.acquire(t))).await;
        let elapsed = started.elapsed();

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(factory.connect_count(), 20);
        assert_eq!(store.tenant_count(), 20);
        assert!(elapsed < delay * 5, "acquisitions were serialized: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_connect_failure_propagates_and_retries() {
        let factory = Arc::new(CountingFactory::new().failing_connect());
        let store = TenantAwareCheckpointSaver::new(factory.clone());
        let tenant = TenantKey::new("acme");

        let err = store.acquire(&tenant).await.unwrap_err();
        assert!(err.is_store_failure());
        assert!(!store.is_initialized(&tenant));
        assert!(store.cached(&tenant).is_none());

        assert!(store.acquire(&tenant).await.is_err());
        assert_eq!(factory.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_setup_failure_is_not_cached() {
        let factory = Arc::new(CountingFactory::new().failing_setup());
        let store = TenantAwareCheckpointSaver::new(factory.clone());
        let tenant = TenantKey::new("acme");

        assert!(store.acquire(&tenant).await.is_err());
        assert!(store.cached(&tenant).is_none());
        assert!(!store.is_initialized(&tenant));
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let store = TenantAwareCheckpointSaver::new(Arc::new(CountingFactory::new()));
        let acme = TenantKey::new("acme");
        let globex = TenantKey::new("globex");

        let config = store
            .put(
                &acme,
                &RunConfig::new("thread-1"),
                Checkpoint::new(serde_json::Map::new(), ChannelVersions::new()),
                CheckpointMetadata::input(),
                ChannelVersions::new(),
            )
            .await
            .unwrap();

        assert!(store.get_tuple(&acme, &config).await.unwrap().is_some());
        assert!(store
            .get_tuple(&globex, &RunConfig::new("thread-1"))
            .await
            .unwrap()
            .is_none());

        store.delete_thread(&acme, "thread-1").await.unwrap();
        assert!(store.get_tuple(&acme, &config).await.unwrap().is_none());
    }
}
