//! Translation inputs, results and streaming events

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::GapRecord;

/// Caller input for a single translation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslateInput {
    pub content: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl TranslateInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = Some(direction.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Direction key when present and non-blank
    pub fn direction_key(&self) -> Option<&str> {
        self.direction
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Completed snapshot returned by the non-streaming call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateResult {
    pub original_content: String,
    pub translated_content: String,
    pub direction: String,
    pub gaps: Vec<GapRecord>,
    pub suggestions: Vec<String>,
}

/// Phase of a streaming session that produced an error event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Preprocess,
    Translate,
}

/// Event emitted by a streaming translation session
///
/// Serialized as `{"event": <tag>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum TranslateEvent {
    Error {
        message: String,
        stage: ErrorStage,
    },
    GapsIdentified {
        gaps: Vec<GapRecord>,
        suggestions: Vec<String>,
    },
    TranslationStart {
        direction: String,
    },
    ContentDelta {
        delta: String,
    },
    MessageDone {
        translated_content: String,
        direction: String,
        gaps: Vec<GapRecord>,
        suggestions: Vec<String>,
    },
}

impl TranslateEvent {
    pub fn error(message: impl Into<String>, stage: ErrorStage) -> Self {
        Self::Error {
            message: message.into(),
            stage,
        }
    }

    /// Event tag as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::GapsIdentified { .. } => "gaps_identified",
            Self::TranslationStart { .. } => "translation_start",
            Self::ContentDelta { .. } => "content_delta",
            Self::MessageDone { .. } => "message_done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::MessageDone { .. })
    }

    /// Payload without the tag
    pub fn data(&self) -> Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("data").map(Value::take))
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = TranslateEvent::error("direction missing", ErrorStage::Preprocess);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(
            json,
            json!({"event": "error", "data": {"message": "direction missing", "stage": "preprocess"}})
        );
        assert_eq!(event.name(), "error");
        assert!(event.is_terminal());
    }

    #[test]
    fn test_event_data_strips_tag() {
        let event = TranslateEvent::ContentDelta {
            delta: "abc".to_string(),
        };

        assert_eq!(event.data(), json!({"delta": "abc"}));
        assert_eq!(event.name(), "content_delta");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_direction_key_ignores_blank() {
        assert_eq!(TranslateInput::new("x").direction_key(), None);
        assert_eq!(TranslateInput::new("x").with_direction("  ").direction_key(), None);
        assert_eq!(
            TranslateInput::new("x").with_direction("pm_to_dev").direction_key(),
            Some("pm_to_dev")
        );
    }
}
