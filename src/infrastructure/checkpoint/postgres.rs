//! PostgreSQL checkpoint backend, one schema per tenant

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};

use crate::config::DatabaseConfig;
use crate::domain::checkpoint::{
    ChannelVersions, Checkpoint, CheckpointBackendFactory, CheckpointMetadata, CheckpointSaver,
    CheckpointStream, CheckpointTuple, ListOptions, PendingWrite, RunConfig, TenantKey,
};
use crate::domain::DomainError;

const MAX_IDENTIFIER_LEN: usize = 63;
const TENANT_HASH_LEN: usize = 12;

/// Schema holding a tenant's checkpoint tables
///
/// `<prefix><sanitized tenant>_<hash>`, where the hash is taken over the raw
/// key so keys that sanitize alike still get distinct schemas. The readable
/// part is truncated to fit the identifier limit.
pub fn tenant_schema(prefix: &str, tenant: &TenantKey) -> Result<String, DomainError> {
    let mut hasher = Sha256::new();
    hasher.update(tenant.as_str().as_bytes());
    let digest = hex::encode(hasher.finalize());

    let budget = MAX_IDENTIFIER_LEN.saturating_sub(prefix.len() + 1 + TENANT_HASH_LEN);
    let readable: String = tenant.sanitized().chars().take(budget).collect();
    let schema = format!("{}{}_{}", prefix, readable, &digest[..TENANT_HASH_LEN]);

    let valid_start = schema
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_chars = schema
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !valid_start || !valid_chars || schema.len() > MAX_IDENTIFIER_LEN {
        return Err(DomainError::configuration(format!(
            "Tenant '{}' does not map to a valid schema name ('{}')",
            tenant, schema
        )));
    }

    Ok(schema)
}

/// Checkpoints stored as JSONB rows in `<schema>.checkpoints` and `<schema>.checkpoint_writes`
pub struct PostgresCheckpointSaver {
    pool: PgPool,
    schema: String,
}

impl std::fmt::Debug for PostgresCheckpointSaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresCheckpointSaver")
            .field("schema", &self.schema)
            .finish()
    }
}

impl PostgresCheckpointSaver {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn checkpoints_table(&self) -> String {
        format!("\"{}\".checkpoints", self.schema)
    }

    fn writes_table(&self) -> String {
        format!("\"{}\".checkpoint_writes", self.schema)
    }

    async fn load_writes(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
    ) -> Result<Vec<PendingWrite>, DomainError> {
        let query = format!(
            "SELECT task_id, channel, value FROM {} \
             WHERE thread_id = $1 AND checkpoint_ns = $2 AND checkpoint_id = $3 \
             ORDER BY task_id, idx",
            self.writes_table()
        );

        let rows = sqlx::query(&query)
            .bind(thread_id)
            .bind(checkpoint_ns)
            .bind(checkpoint_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to load pending writes: {}", e)))?;

        rows.iter()
            .map(|row| -> Result<PendingWrite, DomainError> {
                Ok(PendingWrite {
                    task_id: column(row, "task_id")?,
                    channel: column(row, "channel")?,
                    value: column(row, "value")?,
                })
            })
            .collect()
    }

    async fn row_to_tuple(&self, row: &PgRow) -> Result<CheckpointTuple, DomainError> {
        let thread_id: String = column(row, "thread_id")?;
        let checkpoint_ns: String = column(row, "checkpoint_ns")?;
        let checkpoint_id: String = column(row, "checkpoint_id")?;
        let parent_id: Option<String> = column(row, "parent_checkpoint_id")?;

        let checkpoint: Checkpoint = serde_json::from_value(column(row, "checkpoint")?)
            .map_err(|e| DomainError::storage(format!("Failed to deserialize checkpoint: {}", e)))?;
        let metadata: CheckpointMetadata = serde_json::from_value(column(row, "metadata")?)
            .map_err(|e| DomainError::storage(format!("Failed to deserialize metadata: {}", e)))?;

        let pending_writes = self
            .load_writes(&thread_id, &checkpoint_ns, &checkpoint_id)
            .await?;

        let parent_config = parent_id.map(|parent| {
            RunConfig::new(thread_id.clone())
                .with_namespace(checkpoint_ns.clone())
                .with_checkpoint_id(parent)
        });

        Ok(CheckpointTuple {
            config: RunConfig::new(thread_id)
                .with_namespace(checkpoint_ns)
                .with_checkpoint_id(checkpoint_id),
            checkpoint,
            metadata,
            parent_config,
            pending_writes,
        })
    }
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| DomainError::storage(format!("Failed to read column '{}': {}", name, e)))
}

/// Listing query: newest first, optional run scope, metadata containment, cursor and limit
fn build_list_query<'a>(
    table: &str,
    config: Option<&'a RunConfig>,
    options: &'a ListOptions,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT thread_id, checkpoint_ns, checkpoint_id, parent_checkpoint_id, checkpoint, metadata \
         FROM {} WHERE TRUE",
        table
    ));

    if let Some(config) = config {
        builder.push(" AND thread_id = ").push_bind(config.thread_id.as_str());
        builder
            .push(" AND checkpoint_ns = ")
            .push_bind(config.checkpoint_ns.as_str());
        if let Some(checkpoint_id) = &config.checkpoint_id {
            builder.push(" AND checkpoint_id = ").push_bind(checkpoint_id.as_str());
        }
    }

    if let Some(filter) = &options.filter {
        builder
            .push(" AND metadata @> ")
            .push_bind(Value::Object(filter.clone()));
    }

    if let Some(before) = options.before.as_ref().and_then(|b| b.checkpoint_id.as_ref()) {
        builder.push(" AND checkpoint_id < ").push_bind(before.as_str());
    }

    builder.push(" ORDER BY checkpoint_id DESC");

    if let Some(limit) = options.limit {
        builder.push(" LIMIT ").push_bind(limit as i64);
    }

    builder
}

#[async_trait]
impl CheckpointSaver for PostgresCheckpointSaver {
    async fn setup(&self) -> Result<(), DomainError> {
        let statements = [
            format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", self.schema),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    thread_id TEXT NOT NULL,
                    checkpoint_ns TEXT NOT NULL DEFAULT '',
                    checkpoint_id TEXT NOT NULL,
                    parent_checkpoint_id TEXT,
                    checkpoint JSONB NOT NULL,
                    metadata JSONB NOT NULL DEFAULT '{{}}',
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    PRIMARY KEY (thread_id, checkpoint_ns, checkpoint_id)
                )
                "#,
                self.checkpoints_table()
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    thread_id TEXT NOT NULL,
                    checkpoint_ns TEXT NOT NULL DEFAULT '',
                    checkpoint_id TEXT NOT NULL,
                    task_id TEXT NOT NULL,
                    idx INTEGER NOT NULL,
                    channel TEXT NOT NULL,
                    value JSONB,
                    task_path TEXT NOT NULL DEFAULT '',
                    PRIMARY KEY (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)
                )
                "#,
                self.writes_table()
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS checkpoints_thread_id_idx ON {} (thread_id)",
                self.checkpoints_table()
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS checkpoint_writes_thread_id_idx ON {} (thread_id)",
                self.writes_table()
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::storage(format!("Failed to create checkpoint tables: {}", e))
                })?;
        }

        Ok(())
    }

    async fn get_tuple(&self, config: &RunConfig) -> Result<Option<CheckpointTuple>, DomainError> {
        let row = match &config.checkpoint_id {
            Some(checkpoint_id) => {
                let query = format!(
                    "SELECT thread_id, checkpoint_ns, checkpoint_id, parent_checkpoint_id, checkpoint, metadata \
                     FROM {} WHERE thread_id = $1 AND checkpoint_ns = $2 AND checkpoint_id = $3",
                    self.checkpoints_table()
                );
                sqlx::query(&query)
                    .bind(&config.thread_id)
                    .bind(&config.checkpoint_ns)
                    .bind(checkpoint_id)
                    .fetch_optional(&self.pool)
                    .await
            }
            None => {
                let query = format!(
                    "SELECT thread_id, checkpoint_ns, checkpoint_id, parent_checkpoint_id, checkpoint, metadata \
                     FROM {} WHERE thread_id = $1 AND checkpoint_ns = $2 \
                     ORDER BY checkpoint_id DESC LIMIT 1",
                    self.checkpoints_table()
                );
                sqlx::query(&query)
                    .bind(&config.thread_id)
                    .bind(&config.checkpoint_ns)
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(|e| DomainError::storage(format!("Failed to get checkpoint: {}", e)))?;

        match row {
            Some(row) => Ok(Some(self.row_to_tuple(&row).await?)),
            None => Ok(None),
        }
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

        let checkpoint_json = serde_json::to_value(&checkpoint)
            .map_err(|e| DomainError::storage(format!("Failed to serialize checkpoint: {}", e)))?;

        let query = format!(
            r#"
            INSERT INTO {} (thread_id, checkpoint_ns, checkpoint_id, parent_checkpoint_id, checkpoint, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id)
            DO UPDATE SET checkpoint = EXCLUDED.checkpoint, metadata = EXCLUDED.metadata
            "#,
            self.checkpoints_table()
        );

        sqlx::query(&query)
            .bind(&config.thread_id)
            .bind(&config.checkpoint_ns)
            .bind(&checkpoint_id)
            .bind(config.checkpoint_id.as_deref())
            .bind(checkpoint_json)
            .bind(metadata.to_value())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to store checkpoint: {}", e)))?;

        Ok(RunConfig::new(config.thread_id.clone())
            .with_namespace(config.checkpoint_ns.clone())
            .with_checkpoint_id(checkpoint_id))
    }

    async fn put_writes(
        &self,
        config: &RunConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
        task_path: &str,
    ) -> Result<(), DomainError> {
        let checkpoint_id = config.checkpoint_id.as_deref().ok_or_else(|| {
            DomainError::validation("Pending writes need a config with a checkpoint id")
        })?;

        let query = format!(
            r#"
            INSERT INTO {} (thread_id, checkpoint_ns, checkpoint_id, task_id, idx, channel, value, task_path)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)
            DO UPDATE SET channel = EXCLUDED.channel, value = EXCLUDED.value, task_path = EXCLUDED.task_path
            "#,
            self.writes_table()
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        for (idx, (channel, value)) in writes.into_iter().enumerate() {
            sqlx::query(&query)
                .bind(&config.thread_id)
                .bind(&config.checkpoint_ns)
                .bind(checkpoint_id)
                .bind(task_id)
                .bind(idx as i32)
                .bind(channel)
                .bind(value)
                .bind(task_path)
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to store pending write: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit pending writes: {}", e)))
    }

    async fn list(
        &self,
        config: Option<&RunConfig>,
        options: ListOptions,
    ) -> Result<CheckpointStream, DomainError> {
        let table = self.checkpoints_table();
        let rows = build_list_query(&table, config, &options)
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list checkpoints: {}", e)))?;

        let mut tuples = Vec::with_capacity(rows.len());
        for row in &rows {
            tuples.push(self.row_to_tuple(row).await);
        }

        Ok(Box::pin(stream::iter(tuples)))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), DomainError> {
        for table in [self.writes_table(), self.checkpoints_table()] {
            sqlx::query(&format!("DELETE FROM {} WHERE thread_id = $1", table))
                .bind(thread_id)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to delete thread: {}", e)))?;
        }

        Ok(())
    }
}

/// Opens a pool per tenant with the tenant schema as `search_path`
#[derive(Debug, Clone)]
pub struct PostgresCheckpointFactory {
    config: DatabaseConfig,
}

impl PostgresCheckpointFactory {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn connect_options(&self, schema: &str) -> Result<PgConnectOptions, DomainError> {
        let options = PgConnectOptions::from_str(&self.config.url)
            .map_err(|e| DomainError::configuration(format!("Invalid database URL: {}", e)))?;

        Ok(options.options([("search_path", schema)]))
    }
}

#[async_trait]
impl CheckpointBackendFactory for PostgresCheckpointFactory {
    async fn connect(&self, tenant: &TenantKey) -> Result<Arc<dyn CheckpointSaver>, DomainError> {
        let schema = tenant_schema(&self.config.schema_prefix, tenant)?;
        let options = self.connect_options(&schema)?;

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .min_connections(self.config.min_connections)
            .acquire_timeout(self.config.connect_timeout())
            .idle_timeout(self.config.idle_timeout())
            .connect_with(options)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        tracing::info!(tenant = %tenant, schema = %schema, "Connected checkpoint pool");
        Ok(Arc::new(PostgresCheckpointSaver::new(pool, schema)))
    }
}
