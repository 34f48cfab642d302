//! In-memory checkpoint backend

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;

use crate::domain::checkpoint::{
    json_contains, ChannelVersions, Checkpoint, CheckpointBackendFactory, CheckpointMetadata,
    CheckpointSaver, CheckpointStream, CheckpointTuple, ListOptions, PendingWrite, RunConfig,
    TenantKey,
};
use crate::domain::DomainError;

type CheckpointKey = (String, String, String);

#[derive(Debug, Clone)]
struct StoredCheckpoint {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    parent_id: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    checkpoints: BTreeMap<CheckpointKey, StoredCheckpoint>,
    writes: HashMap<CheckpointKey, Vec<(usize, PendingWrite)>>,
}

/// Process-local checkpoint store
///
/// Useful for testing and development. Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointSaver {
    state: RwLock<State>,
}

impl InMemoryCheckpointSaver {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, DomainError> {
        self.state
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, DomainError> {
        self.state
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }

    fn tuple(state: &State, key: &CheckpointKey, stored: &StoredCheckpoint) -> CheckpointTuple {
        let (thread_id, checkpoint_ns, checkpoint_id) = key.clone();

        let pending_writes = state
            .writes
            .get(key)
            .map(|writes| writes.iter().map(|(_, w)| w.clone()).collect())
            .unwrap_or_default();

        let parent_config = stored.parent_id.as_ref().map(|parent| {
            RunConfig::new(thread_id.clone())
                .with_namespace(checkpoint_ns.clone())
                .with_checkpoint_id(parent.clone())
        });

        CheckpointTuple {
            config: RunConfig::new(thread_id)
                .with_namespace(checkpoint_ns)
                .with_checkpoint_id(checkpoint_id),
            checkpoint: stored.checkpoint.clone(),
            metadata: stored.metadata.clone(),
            parent_config,
            pending_writes,
        }
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn setup(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn get_tuple(&self, config: &RunConfig) -> Result<Option<CheckpointTuple>, DomainError> {
        let state = self.read()?;

        let found = match &config.checkpoint_id {
            Some(id) => {
                let key = (config.thread_id.clone(), config.checkpoint_ns.clone(), id.clone());
                state.checkpoints.get_key_value(&key)
            }
            None => state
                .checkpoints
                .iter()
                .filter(|((thread, ns, _), _)| {
                    *thread == config.thread_id && *ns == config.checkpoint_ns
                })
                .next_back(),
        };

        Ok(found.map(|(key, stored)| Self::tuple(&state, key, stored)))
    }

    async fn put(
        &self,
        config: &RunConfig,
        mut checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<RunConfig, DomainError> {
        checkpoint.channel_versions.extend(new_versions);
        let checkpoint_id = checkpoint.id.clone();

        let key = (
            config.thread_id.clone(),
            config.checkpoint_ns.clone(),
            checkpoint_id.clone(),
        );

        self.write()?.checkpoints.insert(
            key,
            StoredCheckpoint {
                checkpoint,
                metadata,
                parent_id: config.checkpoint_id.clone(),
            },
        );

        Ok(RunConfig::new(config.thread_id.clone())
            .with_namespace(config.checkpoint_ns.clone())
            .with_checkpoint_id(checkpoint_id))
    }

    async fn put_writes(
        &self,
        config: &RunConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
        _task_path: &str,
    ) -> Result<(), DomainError> {
        let checkpoint_id = config.checkpoint_id.clone().ok_or_else(|| {
            DomainError::validation("Pending writes need a config with a checkpoint id")
        })?;

        let key = (config.thread_id.clone(), config.checkpoint_ns.clone(), checkpoint_id);
        let mut state = self.write()?;
        let entry = state.writes.entry(key).or_default();

        for (idx, (channel, value)) in writes.into_iter().enumerate() {
            entry.retain(|(existing_idx, w)| !(w.task_id == task_id && *existing_idx == idx));
            entry.push((
                idx,
                PendingWrite {
                    task_id: task_id.to_string(),
                    channel,
                    value,
                },
            ));
        }

        Ok(())
    }

    async fn list(
        &self,
        config: Option<&RunConfig>,
        options: ListOptions,
    ) -> Result<CheckpointStream, DomainError> {
        let state = self.read()?;
        let filter = options.filter.map(Value::Object);
        let before = options.before.and_then(|b| b.checkpoint_id);

        let mut tuples: Vec<CheckpointTuple> = state
            .checkpoints
            .iter()
            .filter(|((thread, ns, id), _)| match config {
                Some(config) => {
                    *thread == config.thread_id
                        && *ns == config.checkpoint_ns
                        && config.checkpoint_id.as_ref().is_none_or(|wanted| wanted == id)
                }
                None => true,
            })
            .filter(|((_, _, id), _)| before.as_ref().is_none_or(|before| id < before))
            .filter(|(_, stored)| {
                filter
                    .as_ref()
                    .is_none_or(|f| json_contains(&stored.metadata.to_value(), f))
            })
            .map(|(key, stored)| Self::tuple(&state, key, stored))
            .collect();

        tuples.sort_by(|a, b| b.checkpoint.id.cmp(&a.checkpoint.id));
        if let Some(limit) = options.limit {
            tuples.truncate(limit);
        }

        Ok(Box::pin(stream::iter(tuples.into_iter().map(Ok))))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), DomainError> {
        let mut state = self.write()?;
        state.checkpoints.retain(|(thread, _, _), _| thread != thread_id);
        state.writes.retain(|(thread, _, _), _| thread != thread_id);
        Ok(())
    }
}

/// A fresh in-memory store per tenant
#[derive(Debug, Default)]
pub struct InMemoryCheckpointFactory;

impl InMemoryCheckpointFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CheckpointBackendFactory for InMemoryCheckpointFactory {
    async fn connect(&self, tenant: &TenantKey) -> Result<Arc<dyn CheckpointSaver>, DomainError> {
        tracing::debug!(tenant = %tenant, "Opening in-memory checkpoint store");
        Ok(Arc::new(InMemoryCheckpointSaver::new()))
    }
}
