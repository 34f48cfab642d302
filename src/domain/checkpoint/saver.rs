//! Capability surface every checkpoint backend provides

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use super::entity::{
    ChannelVersions, Checkpoint, CheckpointMetadata, CheckpointTuple, ListOptions, RunConfig,
};
use super::tenant::TenantKey;
use crate::domain::DomainError;

/// Stream of stored checkpoints, newest first
pub type CheckpointStream =
    Pin<Box<dyn Stream<Item = Result<CheckpointTuple, DomainError>> + Send>>;

/// Durable store for workflow checkpoints
#[async_trait]
pub trait CheckpointSaver: Send + Sync + std::fmt::Debug {
    /// Idempotent schema creation
    async fn setup(&self) -> Result<(), DomainError>;

    /// The addressed checkpoint, or the latest in the run when no id is given
    async fn get_tuple(&self, config: &RunConfig) -> Result<Option<CheckpointTuple>, DomainError>;

    /// Store a checkpoint and return the config addressing it
    async fn put(
        &self,
        config: &RunConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<RunConfig, DomainError>;

    /// Record intermediate writes against the checkpoint named in `config`
    async fn put_writes(
        &self,
        config: &RunConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: &str,
        task_path: &str,
    ) -> Result<(), DomainError>;

    /// Checkpoints of one run (or all runs when `config` is `None`)
    async fn list(
        &self,
        config: Option<&RunConfig>,
        options: ListOptions,
    ) -> Result<CheckpointStream, DomainError>;

    /// Remove every checkpoint and write of a run
    async fn delete_thread(&self, thread_id: &str) -> Result<(), DomainError>;
}

/// Opens a backend bound to one tenant's storage
#[async_trait]
pub trait CheckpointBackendFactory: Send + Sync + std::fmt::Debug {
    async fn connect(&self, tenant: &TenantKey) -> Result<Arc<dyn CheckpointSaver>, DomainError>;
}
