//! Application state shared by the handlers

use std::sync::Arc;

use crate::infrastructure::checkpoint::TenantAwareCheckpointSaver;
use crate::infrastructure::translate::TranslateAgent;

#[derive(Debug, Clone)]
pub struct AppState {
    pub agent: TranslateAgent,
    pub checkpointer: Arc<TenantAwareCheckpointSaver>,
}

impl AppState {
    pub fn new(agent: TranslateAgent, checkpointer: Arc<TenantAwareCheckpointSaver>) -> Self {
        Self { agent, checkpointer }
    }
}
