use serde::{Deserialize, Serialize};

/// One reasoning unit extracted from agent-style model output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReActStep {
    pub thought: String,
    pub action: Option<String>,
    pub action_input: Option<String>,
    pub observation: Option<String>,
    pub final_answer: Option<String>,
}

impl ReActStep {
    pub fn final_answer(answer: impl Into<String>) -> Self {
        Self {
            final_answer: Some(answer.into()),
            ..Default::default()
        }
    }

    /// A final answer, or a full thought/action/observation cycle
    pub fn is_complete(&self) -> bool {
        self.final_answer.is_some()
            || (!self.thought.is_empty() && self.action.is_some() && self.observation.is_some())
    }

    pub(crate) fn has_thought_or_action(&self) -> bool {
        !self.thought.is_empty() || self.action.is_some()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.thought.is_empty()
            && self.action.is_none()
            && self.action_input.is_none()
            && self.observation.is_none()
            && self.final_answer.is_none()
    }
}
