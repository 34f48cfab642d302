//! Infrastructure layer - external service implementations

pub mod checkpoint;
pub mod llm;
pub mod logging;
pub mod translate;
