//! Translation workflow wiring: nodes, compiled graph and the agent facade

mod agent;
mod gap_analyzer;
mod graph;
mod nodes;

pub use agent::{TranslateAgent, TranslateAgentSettings};
pub use gap_analyzer::{parse_gap_analysis, LlmGapAnalyzer};
pub use graph::{CompiledWorkflow, WorkflowNode};
pub use nodes::{TranslateNodes, DIRECTION_NOT_SPECIFIED};
