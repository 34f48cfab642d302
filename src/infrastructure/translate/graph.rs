//! Compiled two-node translation graph with checkpointing

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::nodes::TranslateNodes;
use crate::domain::checkpoint::{
    next_version, ChannelVersions, Checkpoint, CheckpointMetadata, RunConfig, TenantKey,
};
use crate::domain::translate::{StatePatch, WorkflowState};
use crate::domain::DomainError;
use crate::infrastructure::checkpoint::TenantAwareCheckpointSaver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowNode {
    AnalyzeGaps,
    Translate,
}

impl WorkflowNode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AnalyzeGaps => "analyze_gaps",
            Self::Translate => "translate",
        }
    }
}

/// Linear graph `analyze_gaps [-> translate]`
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    nodes: Arc<TranslateNodes>,
    checkpointer: Arc<TenantAwareCheckpointSaver>,
    order: Vec<WorkflowNode>,
}

impl CompiledWorkflow {
    pub fn build(
        nodes: Arc<TranslateNodes>,
        checkpointer: Arc<TenantAwareCheckpointSaver>,
        include_translation: bool,
    ) -> Self {
        let mut order = vec![WorkflowNode::AnalyzeGaps];
        if include_translation {
            order.push(WorkflowNode::Translate);
        }

        Self {
            nodes,
            checkpointer,
            order,
        }
    }

    pub fn node_names(&self) -> Vec<&'static str> {
        self.order.iter().map(WorkflowNode::name).collect()
    }

    /// Run every node in order, checkpointing under `thread_id`
    ///
    /// Node failures end up in the returned state; only checkpoint store
    /// failures abort the run.
    pub async fn run(
        &self,
        tenant: &TenantKey,
        thread_id: &str,
        mut state: WorkflowState,
    ) -> Result<WorkflowState, DomainError> {
        info!(tenant = %tenant, thread_id = %thread_id, nodes = ?self.node_names(), "Workflow run started");

        let channels = state.to_channels()?;
        let mut versions = ChannelVersions::new();
        for channel in channels.keys() {
            versions.insert(channel.clone(), next_version(None)?);
        }

        let mut config = self
            .checkpointer
            .put(
                tenant,
                &RunConfig::new(thread_id),
                Checkpoint::new(channels, versions.clone()),
                CheckpointMetadata::input(),
                versions.clone(),
            )
            .await?;

        for (step, node) in self.order.iter().enumerate() {
            let patch = self.execute(*node, &state).await;
            let writes = patch.writes()?;
            let patch_value = serde_json::to_value(&patch).map_err(|e| {
                DomainError::internal(format!("Failed to serialize state patch: {}", e))
            })?;

            self.checkpointer
                .put_writes(
                    tenant,
                    &config,
                    writes.clone(),
                    &Uuid::new_v4().to_string(),
                    node.name(),
                )
                .await?;

            let mut new_versions = ChannelVersions::new();
            for (channel, _) in &writes {
                let next = next_version(versions.get(channel).map(String::as_str))?;
                versions.insert(channel.clone(), next.clone());
                new_versions.insert(channel.clone(), next);
            }

            state.apply(patch);

            config = self
                .checkpointer
                .put(
                    tenant,
                    &config,
                    Checkpoint::new(state.to_channels()?, versions.clone()),
                    CheckpointMetadata::step(step as i64, node.name(), patch_value),
                    new_versions,
                )
                .await?;

            debug!(thread_id = %thread_id, node = node.name(), failed = state.is_failed(), "Node finished");
        }

        info!(
            tenant = %tenant,
            thread_id = %thread_id,
            failed = state.is_failed(),
            "Workflow run finished"
        );
        Ok(state)
    }

    /// Latest persisted state of a run
    pub async fn get_state(
        &self,
        tenant: &TenantKey,
        thread_id: &str,
    ) -> Result<Option<WorkflowState>, DomainError> {
        let tuple = self
            .checkpointer
            .get_tuple(tenant, &RunConfig::new(thread_id))
            .await?;

        tuple
            .map(|t| WorkflowState::from_channels(&t.checkpoint.channel_values))
            .transpose()
    }

    async fn execute(&self, node: WorkflowNode, state: &WorkflowState) -> StatePatch {
        match node {
            WorkflowNode::AnalyzeGaps => self.nodes.analyze_gaps(state).await,
            WorkflowNode::Translate => self.nodes.translate(state).await,
        }
    }
}
