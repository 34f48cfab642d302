//! Checkpoint persistence model

mod entity;
mod saver;
mod tenant;
mod version;

pub use entity::{
    json_contains, ChannelVersions, Checkpoint, CheckpointMetadata, CheckpointSource,
    CheckpointTuple, ListOptions, PendingWrite, RunConfig, ROOT_NAMESPACE,
};
pub use saver::{CheckpointBackendFactory, CheckpointSaver, CheckpointStream};
pub use tenant::{TenantKey, DEFAULT_TENANT};
pub use version::{next_version, version_sequence};
