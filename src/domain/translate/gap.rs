//! Gap-analysis capability used by the first workflow stage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use super::state::GapRecord;
use crate::domain::DomainError;

/// Missing information found in the content and suggestions to address it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapAnalysis {
    #[serde(default)]
    pub gaps: Vec<GapRecord>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl GapAnalysis {
    pub fn new(gaps: Vec<GapRecord>, suggestions: Vec<String>) -> Self {
        Self { gaps, suggestions }
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty() && self.suggestions.is_empty()
    }
}

/// Finds information a reader in the target role would miss
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GapAnalyzer: Send + Sync + std::fmt::Debug {
    async fn analyze(&self, content: &str, direction: &str) -> Result<GapAnalysis, DomainError>;
}
