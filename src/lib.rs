//! PMP Translator
//!
//! Rewrites content between engineering and product language in two stages:
//! a gap analysis that lists missing information, then the translation itself.
//! Every run is checkpointed in a per-tenant store.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::{info, warn};

use api::state::AppState;
use config::{CheckpointBackend, LlmConfig};
use domain::checkpoint::CheckpointBackendFactory;
use domain::{DomainError, LlmProvider};
use infrastructure::checkpoint::{
    InMemoryCheckpointFactory, PostgresCheckpointFactory, TenantAwareCheckpointSaver,
};
use infrastructure::llm::{HttpClient, OpenAiCompatibleProvider};
use infrastructure::translate::{
    LlmGapAnalyzer, TranslateAgent, TranslateAgentSettings, TranslateNodes,
};

/// OpenAI-compatible chat client for the configured endpoint
pub fn create_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, DomainError> {
    if config.api_key.is_empty() {
        warn!(base_url = %config.base_url, "No LLM API key configured");
    }

    let client = HttpClient::with_timeout(config.timeout())?;
    let provider = OpenAiCompatibleProvider::new(client, config.api_key.clone(), config.base_url.clone())
        .with_default_temperature(config.temperature);

    Ok(Arc::new(provider))
}

/// Tenant-aware store over the configured backend
pub fn create_checkpointer(config: &AppConfig) -> Arc<TenantAwareCheckpointSaver> {
    let factory: Arc<dyn CheckpointBackendFactory> = match config.checkpoint.backend {
        CheckpointBackend::Postgres => {
            info!(schema_prefix = %config.database.schema_prefix, "Using PostgreSQL checkpoint backend");
            Arc::new(PostgresCheckpointFactory::new(config.database.clone()))
        }
        CheckpointBackend::Memory => {
            info!("Using in-memory checkpoint backend");
            Arc::new(InMemoryCheckpointFactory::new())
        }
    };

    Arc::new(TenantAwareCheckpointSaver::new(factory))
}

pub fn create_agent(
    config: &AppConfig,
    llm: Arc<dyn LlmProvider>,
    checkpointer: Arc<TenantAwareCheckpointSaver>,
) -> TranslateAgent {
    let model = config.llm.default_model.clone();
    let gap_analyzer = LlmGapAnalyzer::new(Arc::clone(&llm), model.clone())
        .with_temperature(config.llm.temperature);
    let nodes = TranslateNodes::new(llm, Arc::new(gap_analyzer), model)
        .with_temperature(config.llm.temperature);

    TranslateAgent::new(
        Arc::new(nodes),
        checkpointer,
        TranslateAgentSettings {
            supported_models: config.llm.supported_models.clone(),
            stream_buffer: config.translate.stream_buffer,
        },
    )
}

/// Application state with every service wired from configuration
pub fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let llm = create_llm_provider(&config.llm)?;
    let checkpointer = create_checkpointer(config);
    let agent = create_agent(config, llm, Arc::clone(&checkpointer));

    info!(
        model = %config.llm.default_model,
        backend = ?config.checkpoint.backend,
        "Application state initialized"
    );

    Ok(AppState::new(agent, checkpointer))
}
