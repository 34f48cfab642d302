//! Public translation entry points: a blocking-style call and an event stream

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::graph::CompiledWorkflow;
use super::nodes::TranslateNodes;
use crate::domain::checkpoint::TenantKey;
use crate::domain::translate::{
    system_prompt_for, ErrorStage, TranslateError, TranslateEvent, TranslateInput,
    TranslateResult, WorkflowState,
};
use crate::infrastructure::checkpoint::TenantAwareCheckpointSaver;

const DIRECTION_REQUIRED: &str = "Translation direction is required";

#[derive(Debug, Clone)]
pub struct TranslateAgentSettings {
    /// Model names accepted without a warning
    pub supported_models: Vec<String>,
    /// Event queue capacity per streaming session
    pub stream_buffer: usize,
}

impl Default for TranslateAgentSettings {
    fn default() -> Self {
        Self {
            supported_models: vec!["auto".to_string(), "qwen-max".to_string()],
            stream_buffer: 32,
        }
    }
}

/// Runs the two-stage workflow for one tenant per call
#[derive(Debug, Clone)]
pub struct TranslateAgent {
    nodes: Arc<TranslateNodes>,
    graph: Arc<CompiledWorkflow>,
    preprocess_graph: Arc<CompiledWorkflow>,
    settings: TranslateAgentSettings,
}

impl TranslateAgent {
    pub fn new(
        nodes: Arc<TranslateNodes>,
        checkpointer: Arc<TenantAwareCheckpointSaver>,
        settings: TranslateAgentSettings,
    ) -> Self {
        let graph = CompiledWorkflow::build(Arc::clone(&nodes), Arc::clone(&checkpointer), true);
        let preprocess_graph = CompiledWorkflow::build(Arc::clone(&nodes), checkpointer, false);

        Self {
            nodes,
            graph: Arc::new(graph),
            preprocess_graph: Arc::new(preprocess_graph),
            settings,
        }
    }

    /// Full graph used by `translate`
    pub fn graph(&self) -> &CompiledWorkflow {
        &self.graph
    }

    /// Gap analysis, then translation, returned as one snapshot
    pub async fn translate(
        &self,
        tenant: &TenantKey,
        input: TranslateInput,
    ) -> Result<TranslateResult, TranslateError> {
        self.check_model(input.model.as_deref());

        let direction = input
            .direction_key()
            .ok_or_else(|| TranslateError::invalid_argument(DIRECTION_REQUIRED))?
            .to_string();

        let thread_id = new_thread_id();
        let state = WorkflowState::new(input.content.clone(), input.context.clone(), direction.clone());
        let state = self.graph.run(tenant, &thread_id, state).await?;

        let final_direction = if state.direction.is_empty() {
            direction
        } else {
            state.direction
        };
        info!(tenant = %tenant, thread_id = %thread_id, direction = %final_direction, "Translation completed");

        Ok(TranslateResult {
            original_content: input.content,
            translated_content: state.translated_content,
            direction: final_direction,
            gaps: state.gaps,
            suggestions: state.suggestions,
        })
    }

    /// Ordered event stream for one translation session
    ///
    /// A producer task fills a bounded queue. Dropping the returned stream
    /// stops the producer at its next send.
    pub fn translate_stream(&self, tenant: &TenantKey, input: TranslateInput) -> ReceiverStream<TranslateEvent> {
        let (tx, rx) = mpsc::channel(self.settings.stream_buffer.max(1));
        let agent = self.clone();
        let tenant = tenant.clone();

        tokio::spawn(async move {
            agent.run_session(&tenant, input, &tx).await;
        });

        ReceiverStream::new(rx)
    }

    async fn run_session(&self, tenant: &TenantKey, input: TranslateInput, tx: &mpsc::Sender<TranslateEvent>) {
        self.check_model(input.model.as_deref());

        let Some(direction) = input.direction_key().map(str::to_string) else {
            error!(tenant = %tenant, "{}", DIRECTION_REQUIRED);
            emit(tx, TranslateEvent::error(DIRECTION_REQUIRED, ErrorStage::Preprocess)).await;
            return;
        };

        let thread_id = new_thread_id();
        let state = WorkflowState::new(input.content.clone(), input.context.clone(), direction.clone());

        let state = match self.preprocess_graph.run(tenant, &thread_id, state).await {
            Ok(state) => state,
            Err(e) => {
                error!(tenant = %tenant, thread_id = %thread_id, error = %e, "Preprocessing failed");
                emit(
                    tx,
                    TranslateEvent::error(format!("preprocess failed: {}", e), ErrorStage::Preprocess),
                )
                .await;
                return;
            }
        };

        if let Some(message) = state.error_message {
            warn!(tenant = %tenant, thread_id = %thread_id, error = %message, "Preprocessing returned an error");
            emit(tx, TranslateEvent::error(message, ErrorStage::Preprocess)).await;
            return;
        }

        let gaps = state.gaps;
        let suggestions = state.suggestions;

        if !gaps.is_empty() {
            let event = TranslateEvent::GapsIdentified {
                gaps: gaps.clone(),
                suggestions: suggestions.clone(),
            };
            if !emit(tx, event).await {
                return;
            }
        }

        let started = TranslateEvent::TranslationStart {
            direction: direction.clone(),
        };
        if !emit(tx, started).await {
            return;
        }

        let request = self.nodes.translation_request(
            &input.content,
            input.context.as_deref(),
            &gaps,
            system_prompt_for(&direction),
        );

        let mut stream = match self.nodes.llm().chat_stream(self.nodes.model(), request).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(thread_id = %thread_id, error = %e, "Translation stream failed to start");
                emit(tx, TranslateEvent::error(format!("translation failed: {}", e), ErrorStage::Translate)).await;
                return;
            }
        };

        let mut translated_content = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    let delta = chunk.text();
                    if delta.is_empty() {
                        continue;
                    }
                    translated_content.push_str(&delta);
                    if !emit(tx, TranslateEvent::ContentDelta { delta }).await {
                        return;
                    }
                }
                Err(e) => {
                    error!(thread_id = %thread_id, error = %e, "Translation stream failed");
                    emit(tx, TranslateEvent::error(format!("translation failed: {}", e), ErrorStage::Translate)).await;
                    return;
                }
            }
        }

        info!(tenant = %tenant, thread_id = %thread_id, direction = %direction, "Streamed translation completed");
        emit(
            tx,
            TranslateEvent::MessageDone {
                translated_content,
                direction,
                gaps,
                suggestions,
            },
        )
        .await;
    }

    fn check_model(&self, requested: Option<&str>) {
        if let Some(model) = requested.filter(|m| !m.is_empty()) {
            if !self.settings.supported_models.iter().any(|m| m == model) {
                warn!(model = %model, default = %self.nodes.model(), "Unsupported model requested, using default");
            }
        }
    }
}

/// Send one event; false once the consumer has gone away
async fn emit(tx: &mpsc::Sender<TranslateEvent>, event: TranslateEvent) -> bool {
    let name = event.name();
    if tx.send(event).await.is_err() {
        debug!(event = name, "Stream consumer dropped, stopping session");
        return false;
    }
    true
}

fn new_thread_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;
    use crate::domain::translate::{GapAnalysis, GapRecord, MockGapAnalyzer};
    use crate::domain::DomainError;
    use crate::infrastructure::checkpoint::testing::CountingFactory;

    fn analyzer(result: Result<Vec<GapRecord>, String>) -> Arc<MockGapAnalyzer> {
        let mut analyzer = MockGapAnalyzer::new();
        analyzer.expect_analyze().returning(move |_, _| match &result {
            Ok(gaps) => Ok(GapAnalysis::new(gaps.clone(), vec!["clarify".to_string()])),
            Err(e) => Err(DomainError::provider("mock", e.clone())),
        });
        Arc::new(analyzer)
    }

    fn agent_with(
        llm: Arc<MockLlmProvider>,
        analyzer: Arc<MockGapAnalyzer>,
        factory: CountingFactory,
    ) -> TranslateAgent {
        let nodes = Arc::new(TranslateNodes::new(llm, analyzer, "qwen-max"));
        let store = Arc::new(TenantAwareCheckpointSaver::new(Arc::new(factory)));
        TranslateAgent::new(nodes, store, TranslateAgentSettings::default())
    }

    fn agent(llm: Arc<MockLlmProvider>, analyzer: Arc<MockGapAnalyzer>) -> TranslateAgent {
        agent_with(llm, analyzer, CountingFactory::new())
    }

    async fn collect(agent: &TranslateAgent, input: TranslateInput) -> Vec<TranslateEvent> {
        agent
            .translate_stream(&TenantKey::default(), input)
            .collect()
            .await
    }

    fn input() -> TranslateInput {
        TranslateInput::new("We sharded the orders table").with_direction("dev_to_pm")
    }

    #[tokio::test]
    async fn test_translate_requires_direction() {
        let llm = Arc::new(MockLlmProvider::new().with_response("unused"));
        let agent = agent(llm.clone(), analyzer(Ok(vec![])));

        for direction in [None, Some("   ")] {
            let mut request = TranslateInput::new("content");
            request.direction = direction.map(str::to_string);

            let err = agent.translate(&TenantKey::default(), request).await.unwrap_err();
            assert!(matches!(err, TranslateError::InvalidArgument(_)));
        }
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_translate_success() {
        let llm = Arc::new(MockLlmProvider::new().with_response("Orders load faster for users"));
        let agent = agent(llm.clone(), analyzer(Ok(vec![GapRecord::new("No rollout date")])));

        let result = agent
            .translate(&TenantKey::new("acme"), input().with_context("Q3").with_model("qwen-max"))
            .await
            .unwrap();

        assert_eq!(result.original_content, "We sharded the orders table");
        assert_eq!(result.translated_content, "Orders load faster for users");
        assert_eq!(result.direction, "dev_to_pm");
        assert_eq!(result.gaps, vec![GapRecord::new("No rollout date")]);
        assert_eq!(result.suggestions, vec!["clarify".to_string()]);
        assert!(llm.requests()[0].messages[1].text().contains("- No rollout date"));
    }

    #[tokio::test]
    async fn test_translate_with_unsupported_model_still_runs() {
        let llm = Arc::new(MockLlmProvider::new().with_response("ok"));
        let agent = agent(llm, analyzer(Ok(vec![])));

        let result = agent
            .translate(&TenantKey::default(), input().with_model("gpt-9"))
            .await
            .unwrap();

        assert_eq!(result.translated_content, "ok");
    }

    #[tokio::test]
    async fn test_translate_gap_failure_degrades() {
        let llm = Arc::new(MockLlmProvider::new().with_response("unused"));
        let agent = agent(llm.clone(), analyzer(Err("timeout".to_string())));

        let result = agent.translate(&TenantKey::default(), input()).await.unwrap();

        assert_eq!(result.translated_content, "");
        assert!(result.gaps.is_empty());
        assert!(result.suggestions.is_empty());
        assert_eq!(result.direction, "dev_to_pm");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_translate_store_failure_is_raised() {
        let agent = agent_with(
            Arc::new(MockLlmProvider::new().with_response("x")),
            analyzer(Ok(vec![])),
            CountingFactory::new().failing_connect(),
        );

        let err = agent.translate(&TenantKey::default(), input()).await.unwrap_err();
        assert!(matches!(err, TranslateError::Store(_)));
    }

    #[tokio::test]
    async fn test_stream_without_direction_emits_single_error() {
        let llm = Arc::new(MockLlmProvider::new().with_stream_chunks(&["unused"]));
        let agent = agent(llm.clone(), analyzer(Ok(vec![])));

        let events = collect(&agent, TranslateInput::new("content")).await;

        assert_eq!(
            events,
            vec![TranslateEvent::error(DIRECTION_REQUIRED, ErrorStage::Preprocess)]
        );
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_success_event_order() {
        let llm = Arc::new(MockLlmProvider::new().with_stream_chunks(&["Orders ", "", "load ", "faster"]));
        let agent = agent(llm, analyzer(Ok(vec![GapRecord::new("No rollout date")])));

        let events = collect(&agent, input()).await;
        let names: Vec<&str> = events.iter().map(TranslateEvent::name).collect();

        assert_eq!(
            names,
            vec![
                "gaps_identified",
                "translation_start",
                "content_delta",
                "content_delta",
                "content_delta",
                "message_done"
            ]
        );

        let streamed: String = events
            .iter()
            .filter_map(|e| match e {
                TranslateEvent::ContentDelta { delta } => Some(delta.as_str()),
                _ => None,
            })
            .collect();

        match events.last().unwrap() {
            TranslateEvent::MessageDone {
                translated_content,
                direction,
                gaps,
                ..
            } => {
                assert_eq!(translated_content, &streamed);
                assert_eq!(translated_content, "Orders load faster");
                assert_eq!(direction, "dev_to_pm");
                assert_eq!(gaps.len(), 1);
            }
            other => panic!("unexpected terminal event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_without_gaps_skips_gap_event() {
        let llm = Arc::new(MockLlmProvider::new().with_stream_chunks(&["done"]));
        let agent = agent(llm, analyzer(Ok(vec![])));

        let events = collect(&agent, input()).await;

        assert_eq!(
            events[0],
            TranslateEvent::TranslationStart {
                direction: "dev_to_pm".to_string()
            }
        );
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_stream_preprocess_error_is_terminal() {
        let llm = Arc::new(MockLlmProvider::new().with_stream_chunks(&["unused"]));
        let agent = agent(llm.clone(), analyzer(Err("timeout".to_string())));

        let events = collect(&agent, input()).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            TranslateEvent::Error { message, stage } => {
                assert_eq!(*stage, ErrorStage::Preprocess);
                assert!(message.starts_with("gap analysis failed:"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_store_failure_is_preprocess_error() {
        let agent = agent_with(
            Arc::new(MockLlmProvider::new().with_stream_chunks(&["unused"])),
            analyzer(Ok(vec![])),
            CountingFactory::new().failing_connect(),
        );

        let events = collect(&agent, input()).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            TranslateEvent::Error { stage: ErrorStage::Preprocess, message } if message.starts_with("preprocess failed:")
        ));
    }

    #[tokio::test]
    async fn test_stream_model_failure_mid_stream() {
        let llm = Arc::new(
            MockLlmProvider::new()
                .with_stream_chunks(&["partial ", "never"])
                .with_stream_error(1, "connection reset"),
        );
        let agent = agent(llm, analyzer(Ok(vec![])));

        let events = collect(&agent, input()).await;
        let names: Vec<&str> = events.iter().map(TranslateEvent::name).collect();

        assert_eq!(names, vec!["translation_start", "content_delta", "error"]);
        assert!(matches!(
            events.last().unwrap(),
            TranslateEvent::Error { stage: ErrorStage::Translate, .. }
        ));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_stream_stops_session() {
        let chunks: Vec<String> = (0..100).map(|i| format!("chunk-{} ", i)).collect();
        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let llm = Arc::new(MockLlmProvider::new().with_stream_chunks(&chunk_refs));
        let nodes = Arc::new(TranslateNodes::new(llm.clone(), analyzer(Ok(vec![])), "qwen-max"));
        let agent = TranslateAgent::new(
            nodes.clone(),
            Arc::new(TenantAwareCheckpointSaver::new(Arc::new(CountingFactory::new()))),
            TranslateAgentSettings {
                stream_buffer: 1,
                ..Default::default()
            },
        );
        let idle_refs = Arc::strong_count(&nodes);

        let mut stream = agent.translate_stream(&TenantKey::default(), input());
        let first = stream.next().await.unwrap();
        assert_eq!(first.name(), "translation_start");
        drop(stream);

        // the session task owns an agent clone until it returns
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while Arc::strong_count(&nodes) > idle_refs {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session task did not stop after the stream was dropped");

        assert_eq!(llm.call_count(), 1);
        assert!(llm.pulled_count() <= 3, "pulled {} chunks", llm.pulled_count());
    }
}
