//! Two-stage translation domain: directions, state, events and prompts

mod direction;
mod error;
mod gap;
mod prompt;
mod result;
mod state;

pub use direction::{gap_analysis_prompt_for, system_prompt_for, Direction, DEFAULT_DIRECTION};
pub use error::TranslateError;
pub use gap::{GapAnalysis, GapAnalyzer};
pub use prompt::build_translate_prompt;
pub use result::{ErrorStage, TranslateEvent, TranslateInput, TranslateResult};
pub use state::{GapRecord, StatePatch, WorkflowState};

#[cfg(test)]
pub use gap::MockGapAnalyzer;
