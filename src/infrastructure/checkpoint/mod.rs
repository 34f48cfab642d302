//! Checkpoint backends and the tenant-aware store built on them

mod blocking;
mod in_memory;
mod postgres;
mod tenant_aware;

pub use blocking::BlockingCheckpointSaver;
pub use in_memory::{InMemoryCheckpointFactory, InMemoryCheckpointSaver};
pub use postgres::{tenant_schema, PostgresCheckpointFactory, PostgresCheckpointSaver};
pub use tenant_aware::TenantAwareCheckpointSaver;

#[cfg(test)]
pub(crate) use tenant_aware::testing;
