//! Structured agent-output parsing

mod parser;
mod step;

pub use parser::ReActParser;
pub use step::ReActStep;
