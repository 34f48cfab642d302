//! Node bodies of the translation graph
//!
//! Nodes never fail: every error is recorded in the returned patch and a
//! state that already carries an error skips all model calls.

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::translate::{
    build_translate_prompt, system_prompt_for, GapAnalyzer, GapRecord, StatePatch,
    WorkflowState, DEFAULT_DIRECTION,
};
use crate::domain::{LlmProvider, LlmRequest};

pub const DIRECTION_NOT_SPECIFIED: &str = "Translation direction not specified";

#[derive(Debug)]
pub struct TranslateNodes {
    llm: Arc<dyn LlmProvider>,
    gap_analyzer: Arc<dyn GapAnalyzer>,
    model: String,
    temperature: Option<f32>,
}

impl TranslateNodes {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        gap_analyzer: Arc<dyn GapAnalyzer>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            gap_analyzer,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// First stage: find missing information and resolve direction and prompt
    pub async fn analyze_gaps(&self, state: &WorkflowState) -> StatePatch {
        if state.is_failed() {
            return StatePatch::empty();
        }

        if state.forced_direction.trim().is_empty() {
            error!("{}", DIRECTION_NOT_SPECIFIED);
            return degraded_patch(DEFAULT_DIRECTION, DIRECTION_NOT_SPECIFIED.to_string());
        }

        let direction = state.forced_direction.as_str();

        match self.gap_analyzer.analyze(&state.content, direction).await {
            Ok(analysis) => {
                info!(
                    direction = %direction,
                    gaps = analysis.gaps.len(),
                    "Gap analysis completed"
                );

                StatePatch {
                    gaps: Some(analysis.gaps),
                    suggestions: Some(analysis.suggestions),
                    direction: Some(direction.to_string()),
                    system_prompt: Some(system_prompt_for(direction).to_string()),
                    ..Default::default()
                }
            }
            Err(e) => {
                error!(direction = %direction, error = %e, "Gap analysis node failed");
                degraded_patch(direction, format!("gap analysis failed: {}", e))
            }
        }
    }

    /// Second stage: one model call producing the translated text
    pub async fn translate(&self, state: &WorkflowState) -> StatePatch {
        if state.is_failed() {
            return StatePatch {
                translated_content: Some(String::new()),
                ..Default::default()
            };
        }

        let request = self.translation_request(
            &state.content,
            state.context.as_deref(),
            &state.gaps,
            &state.system_prompt,
        );

        match self.llm.chat(&self.model, request).await {
            Ok(response) => StatePatch {
                translated_content: Some(response.text()),
                ..Default::default()
            },
            Err(e) => {
                error!(direction = %state.direction, error = %e, "Translate node failed");
                StatePatch {
                    translated_content: Some(String::new()),
                    error_message: Some(format!("translation failed: {}", e)),
                    ..Default::default()
                }
            }
        }
    }

    /// System prompt plus the assembled user prompt
    pub fn translation_request(
        &self,
        content: &str,
        context: Option<&str>,
        gaps: &[GapRecord],
        system_prompt: &str,
    ) -> LlmRequest {
        let mut builder = LlmRequest::builder()
            .system(system_prompt)
            .user(build_translate_prompt(content, context, gaps));

        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }

        builder.build()
    }
}

/// Failed analysis still fills direction and prompt so later readers see defaults
fn degraded_patch(direction: &str, error_message: String) -> StatePatch {
    StatePatch {
        gaps: Some(Vec::new()),
        suggestions: Some(Vec::new()),
        direction: Some(direction.to_string()),
        system_prompt: Some(system_prompt_for(direction).to_string()),
        error_message: Some(error_message),
        ..Default::default()
    }
}
