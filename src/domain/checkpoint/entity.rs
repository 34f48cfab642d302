//! Checkpoint records persisted by the workflow engine

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Channel name to version token
pub type ChannelVersions = BTreeMap<String, String>;

/// Namespace used by top-level graph runs
pub const ROOT_NAMESPACE: &str = "";

/// Addresses a run and optionally one checkpoint inside it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunConfig {
    pub thread_id: String,
    #[serde(default)]
    pub checkpoint_ns: String,
    #[serde(default)]
    pub checkpoint_id: Option<String>,
}

impl RunConfig {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_ns: ROOT_NAMESPACE.to_string(),
            checkpoint_id: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.checkpoint_ns = namespace.into();
        self
    }

    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }
}

/// Snapshot of every channel at one step of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Time-ordered (UUID v7), so ids sort by creation
    pub id: String,
    pub ts: DateTime<Utc>,
    pub channel_values: Map<String, Value>,
    #[serde(default)]
    pub channel_versions: ChannelVersions,
}

impl Checkpoint {
    pub fn new(channel_values: Map<String, Value>, channel_versions: ChannelVersions) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            ts: Utc::now(),
            channel_values,
            channel_versions,
        }
    }
}

/// What produced a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointSource {
    /// Initial state supplied by the caller
    Input,
    /// State after a node ran
    Loop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    pub step: i64,
    /// Node name to the patch it returned
    #[serde(default)]
    pub writes: Map<String, Value>,
    /// Namespace to parent checkpoint id
    #[serde(default)]
    pub parents: BTreeMap<String, String>,
}

impl CheckpointMetadata {
    pub fn input() -> Self {
        Self {
            source: CheckpointSource::Input,
            step: -1,
            writes: Map::new(),
            parents: BTreeMap::new(),
        }
    }

    pub fn step(step: i64, node: &str, patch: Value) -> Self {
        let mut writes = Map::new();
        writes.insert(node.to_string(), patch);

        Self {
            source: CheckpointSource::Loop,
            step,
            writes,
            parents: BTreeMap::new(),
        }
    }

    /// Metadata as stored, used for containment filters
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A channel write recorded before the checkpoint that absorbs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub task_id: String,
    pub channel: String,
    pub value: Value,
}

/// A stored checkpoint together with its addressing and pending writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointTuple {
    pub config: RunConfig,
    pub checkpoint: Checkpoint,
    pub metadata: CheckpointMetadata,
    #[serde(default)]
    pub parent_config: Option<RunConfig>,
    #[serde(default)]
    pub pending_writes: Vec<PendingWrite>,
}

/// Listing options; results are newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListOptions {
    /// JSON containment match on metadata
    #[serde(default)]
    pub filter: Option<Map<String, Value>>,
    /// Only checkpoints strictly older than this one
    #[serde(default)]
    pub before: Option<RunConfig>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Map<String, Value>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_before(mut self, before: RunConfig) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Whether `haystack` contains `needle` in the JSONB `@>` sense
pub fn json_contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Object(h), Value::Object(n)) => n
            .iter()
            .all(|(k, nv)| h.get(k).is_some_and(|hv| json_contains(hv, nv))),
        (Value::Array(h), Value::Array(n)) => n
            .iter()
            .all(|nv| h.iter().any(|hv| json_contains(hv, nv))),
        (h, n) => h == n,
    }
}
