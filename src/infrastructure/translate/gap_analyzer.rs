//! Model-backed gap analysis

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::translate::{gap_analysis_prompt_for, GapAnalysis, GapAnalyzer};
use crate::domain::{DomainError, LlmProvider, LlmRequest};

const SOURCE: &str = "gap_analysis";

/// Asks the model, in JSON mode, what the content leaves out for the target reader
#[derive(Debug)]
pub struct LlmGapAnalyzer {
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f32>,
}

impl LlmGapAnalyzer {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl GapAnalyzer for LlmGapAnalyzer {
    async fn analyze(&self, content: &str, direction: &str) -> Result<GapAnalysis, DomainError> {
        let mut builder = LlmRequest::builder()
            .system(gap_analysis_prompt_for(direction))
            .user(content)
            .json_output();
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }

        let response = self.llm.chat(&self.model, builder.build()).await?;
        let analysis = parse_gap_analysis(&response.text())?;

        debug!(
            direction = %direction,
            gaps = analysis.gaps.len(),
            suggestions = analysis.suggestions.len(),
            "Gap analysis parsed"
        );
        Ok(analysis)
    }
}

/// Parse the first JSON object in a model reply, ignoring fences and prose around it
pub fn parse_gap_analysis(reply: &str) -> Result<GapAnalysis, DomainError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| DomainError::provider(SOURCE, "Reply contains no JSON object"))?;

    serde_json::from_str(json)
        .map_err(|e| DomainError::provider(SOURCE, format!("Malformed gap analysis: {}", e)))
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{LlmResponseFormat, MockLlmProvider};
    use crate::domain::translate::Direction;

    #[test]
    fn test_parse_plain_object() {
        let analysis = parse_gap_analysis(
            r#"{"gaps": [{"category": "timeline", "description": "No date", "importance": "high"}],
                "suggestions": ["Add a date"]}"#,
        )
        .unwrap();

        assert_eq!(analysis.gaps.len(), 1);
        assert_eq!(analysis.gaps[0].description, "No date");
        assert_eq!(analysis.gaps[0].extra["importance"], "high");
        assert_eq!(analysis.suggestions, vec!["Add a date".to_string()]);
    }

    #[test]
    fn test_parse_fenced_reply_with_braces_in_strings() {
        let reply = "Here you go:\n```json\n{\"gaps\": [{\"description\": \"uses {curly} text\"}]}\n```\nDone {";
        let analysis = parse_gap_analysis(reply).unwrap();

        assert_eq!(analysis.gaps[0].description, "uses {curly} text");
        assert!(analysis.suggestions.is_empty());
    }

    #[test]
    fn test_gap_without_description_is_kept() {
        let analysis = parse_gap_analysis(r#"{"gaps": [{"category": "risk"}]}"#).unwrap();
        assert_eq!(analysis.gaps[0].description, "");
    }

    #[test]
    fn test_reply_without_json_is_provider_error() {
        assert!(matches!(
            parse_gap_analysis("nothing missing"),
            Err(DomainError::Provider { .. })
        ));
        assert!(parse_gap_analysis("{\"gaps\": [").is_err());
    }

    #[tokio::test]
    async fn test_analyze_uses_direction_template_in_json_mode() {
        let llm = Arc::new(MockLlmProvider::new().with_response(r#"{"gaps": [], "suggestions": []}"#));
        let analyzer = LlmGapAnalyzer::new(llm.clone(), "qwen-max");

        let analysis = analyzer.analyze("Add a retry queue", "pm_to_dev").await.unwrap();
        assert!(analysis.is_empty());

        let request = &llm.requests()[0];
        assert_eq!(request.response_format, LlmResponseFormat::JsonObject);
        assert_eq!(request.messages[0].text(), Direction::PmToDev.gap_analysis_prompt());
        assert_eq!(request.messages[1].text(), "Add a retry queue");
    }

    #[tokio::test]
    async fn test_analyze_propagates_model_failure() {
        let llm = Arc::new(MockLlmProvider::new().with_error("rate limited"));
        let analyzer = LlmGapAnalyzer::new(llm, "qwen-max");

        assert!(analyzer.analyze("x", "dev_to_pm").await.is_err());
    }
}
