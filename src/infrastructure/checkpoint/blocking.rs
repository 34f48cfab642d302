//! Blocking face over the tenant-aware store
//!
//! Only legal on threads that are not driving a Tokio runtime. Calls made
//! from inside a runtime fail fast with `ProtocolMisuse` instead of
//! deadlocking the scheduler.

use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::Value;
use tokio::runtime::Handle;

use super::TenantAwareCheckpointSaver;
use crate::domain::checkpoint::{
    ChannelVersions, Checkpoint, CheckpointMetadata, CheckpointSaver, CheckpointTuple,
    ListOptions, RunConfig, TenantKey,
};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct BlockingCheckpointSaver {
    inner: Arc<TenantAwareCheckpointSaver>,
    handle: Handle,
}

impl BlockingCheckpointSaver {
    /// `handle` must belong to a multi-thread runtime that owns the backend connections
    pub fn new(inner: Arc<TenantAwareCheckpointSaver>, handle: Handle) -> Self {
        Self { inner, handle }
    }

    /// Cached backend when present, otherwise a blocking acquisition
    pub fn acquire(&self, tenant: &TenantKey) -> Result<Arc<dyn CheckpointSaver>, DomainError> {
        if let Some(backend) = self.inner.cached(tenant) {
            return Ok(backend);
        }

        ensure_outside_runtime("acquire")?;
        self.handle.block_on(self.inner.acquire(tenant))
    }

    pub fn get_tuple(
        &self,
        tenant: &TenantKey,
        config: &RunConfig,
    ) -> Result<Option<CheckpointTuple>, DomainError> {
        ensure_outside_runtime("get_tuple")?;
        self.handle.block_on(self.inner.get_tuple(tenant, config))
    }

    pub fn put(
        &self,
        tenant: &TenantKey,
        config: &RunConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<RunConfig, DomainError> {
        ensure_outside_runtime("put")?;
        self.handle
            .block_on(self.inner.put(tenant, config, checkpoint, metadata, new_versions))
    }

    pub fn put_writes(
        &self,
        tenant: &TenantKey,
        config: &RunConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
        task_path: &str,
    ) -> Result<(), DomainError> {
        ensure_outside_runtime("put_writes")?;
        self.handle
            .block_on(self.inner.put_writes(tenant, config, writes, task_id, task_path))
    }

    /// Matching checkpoints, newest first, collected eagerly
    pub fn list(
        &self,
        tenant: &TenantKey,
        config: Option<&RunConfig>,
        options: ListOptions,
    ) -> Result<Vec<CheckpointTuple>, DomainError> {
        ensure_outside_runtime("list")?;
        self.handle.block_on(async {
            self.inner
                .list(tenant, config, options)
                .await?
                .try_collect::<Vec<_>>()
                .await
        })
    }

    pub fn delete_thread(&self, tenant: &TenantKey, thread_id: &str) -> Result<(), DomainError> {
        ensure_outside_runtime("delete_thread")?;
        self.handle.block_on(self.inner.delete_thread(tenant, thread_id))
    }
}

fn ensure_outside_runtime(operation: &str) -> Result<(), DomainError> {
    if Handle::try_current().is_ok() {
        return Err(DomainError::protocol_misuse(format!(
            "Blocking checkpoint call '{}' made from inside the async runtime; use the async API",
            operation
        )));
    }
    Ok(())
}
