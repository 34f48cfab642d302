use async_trait::async_trait;
use std::fmt::Debug;
use std::pin::Pin;
use futures::Stream;

use super::{LlmRequest, LlmResponse};
use super::response::StreamChunk;
use crate::domain::DomainError;

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, DomainError>> + Send>>;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Send a chat completion request
    async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError>;

    /// Send a streaming chat completion request
    async fn chat_stream(
        &self,
        model: &str,
        request: LlmRequest,
    ) -> Result<LlmStream, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::llm::{FinishReason, Message};
    use futures::{stream, StreamExt};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Scriptable provider; single-shot replies are consumed in order and the
    /// last one is repeated once the queue runs dry
    #[derive(Debug, Default)]
    pub struct MockLlmProvider {
        replies: Mutex<VecDeque<Result<String, String>>>,
        last_reply: Mutex<Option<Result<String, String>>>,
        stream_chunks: Vec<String>,
        stream_error: Option<(usize, String)>,
        requests: Mutex<Vec<LlmRequest>>,
        pulled: Arc<AtomicUsize>,
    }

    impl MockLlmProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(self, content: impl Into<String>) -> Self {
            self.replies.lock().unwrap().push_back(Ok(content.into()));
            self
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            self.replies.lock().unwrap().push_back(Err(error.into()));
            self
        }

        pub fn with_stream_chunks(mut self, chunks: &[&str]) -> Self {
            self.stream_chunks = chunks.iter().map(|c| c.to_string()).collect();
            self
        }

        /// Fail the stream after `after` chunks have been delivered
        pub fn with_stream_error(mut self, after: usize, error: impl Into<String>) -> Self {
            self.stream_error = Some((after, error.into()));
            self
        }

        pub fn requests(&self) -> Vec<LlmRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        /// Stream items consumers have pulled so far, across all streams
        pub fn pulled_count(&self) -> usize {
            self.pulled.load(Ordering::SeqCst)
        }

        fn next_reply(&self) -> Result<String, String> {
            let mut replies = self.replies.lock().unwrap();
            let mut last = self.last_reply.lock().unwrap();

            if let Some(reply) = replies.pop_front() {
                *last = Some(reply.clone());
                return reply;
            }

            last.clone()
                .unwrap_or_else(|| Err("No mock response configured".to_string()))
        }

        fn stream_items(&self, model: &str) -> Vec<Result<StreamChunk, DomainError>> {
            let mut items = Vec::new();

            for (index, chunk) in self.stream_chunks.iter().enumerate() {
                if let Some((after, error)) = &self.stream_error {
                    if index == *after {
                        items.push(Err(DomainError::provider("mock", error.clone())));
                        return items;
                    }
                }

                items.push(Ok(StreamChunk::new("mock-id".to_string(), model.to_string())
                    .with_delta(chunk.clone())));
            }

            if let Some((after, error)) = &self.stream_error {
                if *after >= self.stream_chunks.len() {
                    items.push(Err(DomainError::provider("mock", error.clone())));
                    return items;
                }
            }

            items.push(Ok(StreamChunk::new("mock-id".to_string(), model.to_string())
                .with_finish_reason(FinishReason::Stop)));
            items
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn chat(
            &self,
            model: &str,
            request: LlmRequest,
        ) -> Result<LlmResponse, DomainError> {
            self.requests.lock().unwrap().push(request);

            let content = self
                .next_reply()
                .map_err(|e| DomainError::provider("mock", e))?;

            Ok(LlmResponse::new(
                "mock-id".to_string(),
                model.to_string(),
                Message::assistant(content),
            )
            .with_finish_reason(FinishReason::Stop))
        }

        async fn chat_stream(
            &self,
            model: &str,
            request: LlmRequest,
        ) -> Result<LlmStream, DomainError> {
            self.requests.lock().unwrap().push(request);

            let pulled = self.pulled.clone();
            let items = self.stream_items(model);

            Ok(Box::pin(stream::iter(items).inspect(move |_| {
                pulled.fetch_add(1, Ordering::SeqCst);
            })))
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }
}
