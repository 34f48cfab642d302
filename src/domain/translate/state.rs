//! Workflow state threaded through the translation graph

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::DomainError;

/// Information judged missing from the input content
///
/// Only `description` is interpreted; every other field is carried opaquely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapRecord {
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GapRecord {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Mutable record for one graph execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub content: String,
    #[serde(default)]
    pub context: Option<String>,
    pub forced_direction: String,
    #[serde(default)]
    pub gaps: Vec<GapRecord>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub direction: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub translated_content: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl WorkflowState {
    pub fn new(
        content: impl Into<String>,
        context: Option<String>,
        forced_direction: impl Into<String>,
    ) -> Self {
        let forced_direction = forced_direction.into();

        Self {
            content: content.into(),
            context,
            direction: forced_direction.clone(),
            forced_direction,
            ..Default::default()
        }
    }

    /// A state is failed once any node has recorded an error
    pub fn is_failed(&self) -> bool {
        self.error_message.is_some()
    }

    /// Merge a node patch; fields absent from the patch are left untouched
    pub fn apply(&mut self, patch: StatePatch) {
        if let Some(gaps) = patch.gaps {
            self.gaps = gaps;
        }
        if let Some(suggestions) = patch.suggestions {
            self.suggestions = suggestions;
        }
        if let Some(direction) = patch.direction {
            self.direction = direction;
        }
        if let Some(system_prompt) = patch.system_prompt {
            self.system_prompt = system_prompt;
        }
        if let Some(translated_content) = patch.translated_content {
            self.translated_content = translated_content;
        }
        if let Some(error_message) = patch.error_message {
            self.error_message = Some(error_message);
        }
    }

    /// Channel map persisted in checkpoints
    pub fn to_channels(&self) -> Result<Map<String, Value>, DomainError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(DomainError::internal("Workflow state did not serialize to an object")),
            Err(e) => Err(DomainError::internal(format!(
                "Failed to serialize workflow state: {}",
                e
            ))),
        }
    }

    pub fn from_channels(channels: &Map<String, Value>) -> Result<Self, DomainError> {
        serde_json::from_value(Value::Object(channels.clone())).map_err(|e| {
            DomainError::storage(format!("Checkpoint does not hold a workflow state: {}", e))
        })
    }
}

/// Partial update returned by a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gaps: Option<Vec<GapRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StatePatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// One channel write per field the patch sets
    pub fn writes(&self) -> Result<Vec<(String, Value)>, DomainError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
            Ok(_) => Ok(Vec::new()),
            Err(e) => Err(DomainError::internal(format!(
                "Failed to serialize state patch: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_state_defaults_direction_to_forced() {
        let state = WorkflowState::new("content", None, "pm_to_dev");

        assert_eq!(state.direction, "pm_to_dev");
        assert!(state.gaps.is_empty());
        assert!(!state.is_failed());
    }

    #[test]
    fn test_apply_only_overwrites_set_fields() {
        let mut state = WorkflowState::new("content", Some("ctx".to_string()), "dev_to_pm");
        state.apply(StatePatch {
            translated_content: Some("out".to_string()),
            ..Default::default()
        });

        assert_eq!(state.translated_content, "out");
        assert_eq!(state.context.as_deref(), Some("ctx"));
        assert_eq!(state.direction, "dev_to_pm");
    }

    #[test]
    fn test_patch_writes_only_set_fields() {
        let patch = StatePatch {
            translated_content: Some(String::new()),
            error_message: Some("boom".to_string()),
            ..Default::default()
        };

        let writes = patch.writes().unwrap();
        assert_eq!(writes.len(), 2);
        assert!(writes.contains(&("error_message".to_string(), json!("boom"))));
        assert!(StatePatch::empty().writes().unwrap().is_empty());
        assert!(StatePatch::empty().is_empty());
    }

    #[test]
    fn test_gap_record_keeps_opaque_fields() {
        let gap: GapRecord = serde_json::from_value(json!({
            "description": "No rollout date",
            "importance": "high"
        }))
        .unwrap();

        assert_eq!(gap.description, "No rollout date");
        assert_eq!(gap.extra.get("importance"), Some(&json!("high")));
        assert_eq!(serde_json::to_value(&gap).unwrap()["importance"], json!("high"));
    }

    #[test]
    fn test_channels_restore_state() {
        let mut state = WorkflowState::new("content", None, "dev_to_pm");
        state.gaps = vec![GapRecord::new("missing owner")];

        let channels = state.to_channels().unwrap();
        let restored = WorkflowState::from_channels(&channels).unwrap();
        assert_eq!(restored, state);
    }
}
