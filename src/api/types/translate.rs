//! Wire types for the translate endpoint

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::translate::{Direction, TranslateInput};
use crate::domain::DomainError;

fn default_stream() -> bool {
    true
}

/// Body of `POST /v1/translate`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TranslateRequest {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,

    #[serde(default = "default_stream")]
    pub stream: bool,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub context: Option<String>,

    #[serde(default)]
    pub direction: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

impl TranslateRequest {
    /// Rejects direction keys outside the known set; an absent direction is
    /// left for the agent to report
    pub fn check_direction(&self) -> Result<(), DomainError> {
        match self.direction.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.parse::<Direction>().map(|_| ()),
            _ => Ok(()),
        }
    }

    pub fn into_input(self) -> TranslateInput {
        TranslateInput {
            content: self.content,
            context: self.context,
            direction: self.direction,
            model: self.model,
        }
    }
}
