//! Domain layer - translation workflow, checkpoint model and parsers

pub mod checkpoint;
pub mod error;
pub mod llm;
pub mod react;
pub mod translate;

pub use error::DomainError;
pub use llm::{
    ContentPart, FinishReason, LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse,
    LlmResponseFormat, LlmStream, Message, MessageContent, MessageRole, StreamChunk, Usage,
};
