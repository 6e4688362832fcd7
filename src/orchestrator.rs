//! C7 — Orchestrator: the bounded reasoning loop.
//!
//! Drives `INIT -> THINK -> PARSE -> (EXECUTE -> THINK)* -> FINALIZE -> DONE`,
//! with a `FORCE_SUMMARY` terminal path when the iteration cap is hit
//! without a tool-less answer. Ties together every other component: C2
//! builds the prompt, C1 parses LM output, C5 dispatches tools, C3 harvests
//! sources, C4 isn't applied here (callers run it over the final content),
//! C6 appends follow-up questions.

use crate::config::OrchestratorConfig;
use crate::dispatcher::{Dispatcher, ToolExecution};
use crate::followup;
use crate::llm::{ChatOptions, LlmClient, LlmError};
use crate::message::Message;
use crate::parser::{self, ParseResult};
use crate::prompt;
use crate::sources::{self, Source};
use crate::toolclient::ToolClient;
use futures::stream::Stream;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

const FORCE_SUMMARY_PROMPT: &str = "Based on all the information gathered above, please provide your final answer. Do not make any more tool calls.";
const TITLE_PREFIXES: &[&str] = &["what is", "what are", "how to", "how do", "why", "can you"];
const UNABLE_TO_ANSWER_MARKER: &str = "\u{274c}"; // "❌"

/// Callback fired before a tool is dispatched.
pub type OnToolStart<'a> = dyn Fn(&str, &Value) + Send + Sync + 'a;
/// Callback fired once a tool dispatch has an outcome.
pub type OnToolComplete<'a> = dyn Fn(&str, &Value, bool) + Send + Sync + 'a;
/// Callback fired per LM output chunk. `research` (non-streaming) only
/// fires this during the first `THINK`; `research_stream` fires it for
/// every forwarded chunk across every turn.
pub type OnTextChunk<'a> = dyn Fn(&str) + Send + Sync + 'a;

/// The fully assembled result of one `research()` call.
#[derive(Debug, Clone)]
pub struct ResearchResponse {
    pub content: String,
    pub tool_trace: Vec<ToolExecution>,
    pub sources: Vec<Source>,
    pub request_id: String,
    pub total_duration_ms: f64,
    pub model: String,
    pub can_save_as_note: bool,
    pub suggested_title: String,
    pub followup_questions: Vec<String>,
}

/// Composite availability of both external collaborators.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub llm_available: bool,
    pub tool_server_available: bool,
    pub available_tools: Vec<String>,
}

/// Drives one conversation. Not safe to share across concurrent queries —
/// instantiate one per in-flight query if the caller needs concurrency.
pub struct Orchestrator {
    conversation_history: Vec<Message>,
    config: OrchestratorConfig,
    llm: Arc<dyn LlmClient>,
    tool_client: Arc<dyn ToolClient>,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, tool_client: Arc<dyn ToolClient>, config: OrchestratorConfig) -> Self {
        Self {
            conversation_history: Vec::new(),
            config,
            llm,
            tool_client,
        }
    }

    pub fn conversation_history(&self) -> &[Message] {
        &self.conversation_history
    }

    pub fn clear_history(&mut self) {
        self.conversation_history.clear();
    }

    /// Validated setter: silently ignores a key outside `{quick, deep}`.
    pub fn set_research_mode(&mut self, key: &str) {
        if let Some(mode) = crate::config::ResearchMode::from_key(key) {
            self.config.research_mode = mode;
        }
    }

    /// Validated setter: silently ignores a key outside `{text, markdown}`.
    pub fn set_fetch_extract_mode(&mut self, key: &str) {
        if let Some(mode) = crate::config::FetchExtractMode::from_key(key) {
            self.config.fetch_extract_mode = mode;
        }
    }

    /// Validated setter: silently ignores an empty model name.
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        if !model.trim().is_empty() {
            self.config.model = model;
        }
    }

    /// Validated setter: clamps to `[0, 1]` rather than rejecting.
    pub fn set_temperature(&mut self, temperature: f32) {
        if temperature.is_finite() {
            self.config.temperature = temperature.clamp(0.0, 1.0);
        }
    }

    pub async fn health_check(&self) -> HealthStatus {
        let tool_health = self.tool_client.health().await;
        HealthStatus {
            llm_available: self.llm.is_available().await,
            tool_server_available: tool_health.available,
            available_tools: tool_health.tools,
        }
    }

    fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.config.temperature,
        }
    }

    fn build_initial_messages(&self, query: &str) -> Vec<Message> {
        let mut messages = vec![Message::system(prompt::build_system_prompt(self.config.research_mode))];
        messages.extend(self.conversation_history.iter().cloned());
        messages.push(Message::user(query));
        messages
    }

    /// Run a single query to completion. Non-streaming: the LM's full reply
    /// for each turn is awaited before parsing.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub async fn research(
        &mut self,
        query: &str,
        on_tool_start: Option<&OnToolStart<'_>>,
        on_tool_complete: Option<&OnToolComplete<'_>>,
        on_text_chunk: Option<&OnTextChunk<'_>>,
    ) -> Result<ResearchResponse, LlmError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());
        let started = Instant::now();

        let mut messages = self.build_initial_messages(query);
        let mut trace = Vec::new();
        let mut harvested_sources = Vec::new();
        let mut iter = 0u32;
        let mut final_content: Option<String> = None;

        while iter < self.config.max_iterations {
            let reply = self.think(&messages, iter, on_text_chunk).await?;
            iter += 1;
            debug!(iter, reply_len = reply.len(), "THINK turn complete");

            let parsed = parser::parse_tool_calls(&reply);
            if parsed.tool_calls.is_empty() {
                final_content = Some(reply.trim().to_string());
                break;
            }

            messages.push(Message::assistant(reply.clone()));
            let formatted = self
                .execute_tool_calls(&parsed, &request_id, &mut trace, &mut harvested_sources, on_tool_start, on_tool_complete)
                .await;
            messages.push(Message::user(formatted));
        }

        let content = match final_content {
            Some(content) => content,
            None => self.force_summary(&mut messages, harvested_sources.len()).await,
        };

        Ok(self.finalize(query, content, trace, harvested_sources, request_id, started).await)
    }

    /// `THINK`: one LM call for the current turn (`iter` is the count of
    /// turns completed so far, zero-based). The first turn is routed through
    /// `chat_stream` when `on_text_chunk` is supplied, firing the callback
    /// per streamed fragment per §6.3 ("non-streaming `research` fires this
    /// only during the first THINK"); every other turn uses the single-shot
    /// `chat`.
    async fn think(
        &self,
        messages: &[Message],
        iter: u32,
        on_text_chunk: Option<&OnTextChunk<'_>>,
    ) -> Result<String, LlmError> {
        let Some(chunk_cb) = on_text_chunk.filter(|_| iter == 0) else {
            return self.llm.chat(messages, &self.config.model, self.chat_options()).await;
        };

        use futures::StreamExt;
        let mut chunk_stream = self
            .llm
            .chat_stream(messages, &self.config.model, self.chat_options())
            .await?;
        let mut full_reply = String::new();
        while let Some(chunk) = chunk_stream.next().await {
            let chunk = chunk?;
            fire_text_chunk(chunk_cb, &chunk);
            full_reply.push_str(&chunk);
        }
        Ok(full_reply)
    }

    /// Streaming variant of [`Self::research`]. Chunks are withheld while
    /// inside a `<tool_call>` region; the final transcript update mirrors
    /// `research`'s non-streaming semantics.
    pub fn research_stream<'a>(
        &'a mut self,
        query: &'a str,
        on_tool_start: Option<&'a OnToolStart<'a>>,
        on_tool_complete: Option<&'a OnToolComplete<'a>>,
    ) -> impl Stream<Item = Result<String, LlmError>> + 'a {
        async_stream::try_stream! {
            let request_id = uuid::Uuid::new_v4().to_string();
            let mut messages = self.build_initial_messages(query);
            let mut trace = Vec::new();
            let mut harvested_sources = Vec::new();
            let mut iter = 0u32;
            let mut final_content: Option<String> = None;

            while iter < self.config.max_iterations {
                use futures::StreamExt;

                let mut chunk_stream = self
                    .llm
                    .chat_stream(&messages, &self.config.model, self.chat_options())
                    .await?;
                let mut filter = parser::StreamFilter::new();
                let mut full_reply = String::new();

                while let Some(chunk) = chunk_stream.next().await {
                    let chunk = chunk?;
                    full_reply.push_str(&chunk);
                    let visible = filter.push(&chunk);
                    if !visible.is_empty() {
                        yield visible;
                    }
                }
                iter += 1;

                let parsed = parser::parse_tool_calls(&full_reply);
                if parsed.tool_calls.is_empty() {
                    final_content = Some(full_reply.trim().to_string());
                    break;
                }

                messages.push(Message::assistant(full_reply.clone()));
                let formatted = self
                    .execute_tool_calls(&parsed, &request_id, &mut trace, &mut harvested_sources, on_tool_start, on_tool_complete)
                    .await;
                messages.push(Message::user(formatted));
            }

            let content = match final_content {
                Some(content) => content,
                None => self.force_summary(&mut messages, harvested_sources.len()).await,
            };

            self.conversation_history.push(Message::user(query));
            self.conversation_history.push(Message::assistant(content));
        }
    }

    /// `EXECUTE`: dispatch every parsed tool call in textual order, folding
    /// results into `trace`/`harvested_sources` and returning the
    /// concatenated `<tool_result>`/`<tool_error>` block for the next
    /// user-role message.
    async fn execute_tool_calls(
        &self,
        parsed: &ParseResult,
        request_id: &str,
        trace: &mut Vec<ToolExecution>,
        harvested_sources: &mut Vec<Source>,
        on_tool_start: Option<&OnToolStart<'_>>,
        on_tool_complete: Option<&OnToolComplete<'_>>,
    ) -> String {
        let start_adapter = on_tool_start.map(|cb| {
            move |name: &str, args: &Value| {
                cb(name, args);
            }
        });
        let complete_adapter = on_tool_complete.map(|cb| {
            move |execution: &ToolExecution| {
                let empty = Value::Object(serde_json::Map::new());
                let result = execution.result.as_ref().unwrap_or(&empty);
                cb(&execution.tool_name, result, execution.success);
            }
        });

        let mut dispatcher = Dispatcher::new(self.tool_client.as_ref(), &self.config);
        if let Some(cb) = &start_adapter {
            dispatcher = dispatcher.with_on_start(cb);
        }
        if let Some(cb) = &complete_adapter {
            dispatcher = dispatcher.with_on_complete(cb);
        }

        let mut formatted_parts = Vec::with_capacity(parsed.tool_calls.len());
        for call in &parsed.tool_calls {
            let execution = dispatcher.dispatch(call, request_id).await;

            if let Some(result) = &execution.result {
                harvested_sources.extend(sources::extract_sources(&execution.tool_name, result));
            }

            let formatted = if execution.success {
                prompt::format_tool_result_success(&execution.tool_name, execution.result.as_ref().unwrap())
            } else {
                prompt::format_tool_result_error(
                    &execution.tool_name,
                    execution.error_code.unwrap_or("internal_error"),
                    execution.error.as_deref().unwrap_or("tool execution failed"),
                )
            };
            formatted_parts.push(formatted);
            trace.push(execution);
        }

        formatted_parts.join("\n\n")
    }

    /// `FORCE_SUMMARY`: exactly one additional LM call once the iteration
    /// cap is hit without a tool-less answer. Never propagates failure — a
    /// transport/timeout error from this call falls back to a fixed
    /// diagnostic string rather than aborting the query, same as an empty or
    /// still-tool-calling reply.
    async fn force_summary(&self, messages: &mut Vec<Message>, source_count: usize) -> String {
        warn!(max_iterations = self.config.max_iterations, "iteration cap reached, forcing summary turn");
        messages.push(Message::user(FORCE_SUMMARY_PROMPT));
        match self.llm.chat(messages, &self.config.model, self.chat_options()).await {
            Ok(reply) => {
                let truncated = parser::truncate_at_tool_call(&reply);
                if truncated.is_empty() {
                    format!(
                        "I wasn't able to produce a complete answer within the allotted steps. \
                         Please review the {source_count} sources gathered above for details."
                    )
                } else {
                    truncated
                }
            }
            Err(error) => {
                warn!(%error, "forced-summary LM call failed, falling back to diagnostic content");
                format!(
                    "Research completed but summary generation failed. \
                     Please review the {source_count} sources gathered above for details."
                )
            }
        }
    }

    async fn finalize(
        &mut self,
        query: &str,
        content: String,
        trace: Vec<ToolExecution>,
        harvested_sources: Vec<Source>,
        request_id: String,
        started: Instant,
    ) -> ResearchResponse {
        let deduped_sources = sources::deduplicate_sources(harvested_sources);
        let suggested_title = derive_suggested_title(query);
        let can_save_as_note = !content.is_empty() && !content.starts_with(UNABLE_TO_ANSWER_MARKER);

        let followup_questions =
            followup::generate_follow_ups(self.llm.as_ref(), query, &content, &deduped_sources, &self.config.model).await;

        self.conversation_history.push(Message::user(query));
        self.conversation_history.push(Message::assistant(content.clone()));

        let total_duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(request_id = %request_id, total_duration_ms, tool_calls = trace.len(), "research query complete");

        ResearchResponse {
            content,
            tool_trace: trace,
            sources: deduped_sources,
            request_id,
            total_duration_ms,
            model: self.config.model.clone(),
            can_save_as_note,
            suggested_title,
            followup_questions,
        }
    }
}

fn fire_text_chunk(callback: &OnTextChunk<'_>, chunk: &str) {
    let _ = std::panic::catch_unwind(AssertUnwindSafe(|| callback(chunk)));
}

/// §4.7.4: derive a ≤80-char note title from the raw query.
fn derive_suggested_title(query: &str) -> String {
    let trimmed = query.trim();
    let lower = trimmed.to_lowercase();

    let mut stem = trimmed;
    for prefix in TITLE_PREFIXES {
        if lower.starts_with(prefix) {
            stem = trimmed[prefix.len()..].trim_start();
            break;
        }
    }

    let mut title = capitalize_first(stem);
    if title.chars().count() > 70 {
        title = title.chars().take(67).collect::<String>() + "...";
    }
    if title.chars().count() < 60 {
        title = format!("Research: {title}");
    }
    if title.chars().count() > 80 {
        title = title.chars().take(80).collect();
    }
    title
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeLlmClient, FakeToolClient, ScriptedChatResult, ScriptedToolResult};
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Mutex;

    fn orchestrator(llm: FakeLlmClient, tool_client: FakeToolClient) -> Orchestrator {
        Orchestrator::new(Arc::new(llm), Arc::new(tool_client), OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn happy_single_turn_has_no_tool_calls() {
        let llm = FakeLlmClient::new(vec![
            ScriptedChatResult::Reply("Hi there.".to_string()),
            ScriptedChatResult::Reply("1. What next?\n2. Anything else?\n3. Curious about more?".to_string()),
        ]);
        let mut orch = orchestrator(llm, FakeToolClient::new(vec![]));

        let response = orch.research("hello", None, None, None).await.unwrap();
        assert_eq!(response.content, "Hi there.");
        assert!(response.tool_trace.is_empty());
        assert!(response.sources.is_empty());
        assert_eq!(response.followup_questions.len(), 3);
        assert!(response.suggested_title.starts_with("Research: "));
        assert_eq!(orch.conversation_history().len(), 2);
    }

    #[tokio::test]
    async fn search_then_answer_yields_sources_in_order() {
        let llm = FakeLlmClient::new(vec![
            ScriptedChatResult::Reply(
                r#"<tool_call>{"name": "web_search", "arguments": {"query": "X"}}</tool_call>"#.to_string(),
            ),
            ScriptedChatResult::Reply("Answer [1][2].".to_string()),
            ScriptedChatResult::Reply("1. Follow up one?\n2. Follow up two?\n3. Follow up three?".to_string()),
        ]);
        let tool_client = FakeToolClient::new(vec![ScriptedToolResult::Ok(json!({
            "results": [
                {"url": "https://a", "title": "A"},
                {"url": "https://b", "title": "B"}
            ]
        }))]);
        let mut orch = orchestrator(llm, tool_client);

        let response = orch.research("search for X", None, None, None).await.unwrap();
        assert_eq!(response.content, "Answer [1][2].");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].url, "https://a");
        assert_eq!(response.sources[1].url, "https://b");
        assert_eq!(response.tool_trace.len(), 1);
        assert!(response.tool_trace[0].success);
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected_without_an_http_call() {
        let llm = FakeLlmClient::new(vec![
            ScriptedChatResult::Reply(
                r#"<tool_call>{"name": "summarize", "arguments": {}}</tool_call>"#.to_string(),
            ),
            ScriptedChatResult::Reply("Done without that tool.".to_string()),
            ScriptedChatResult::Reply("1. A question here?\n2. Another question?\n3. Third question?".to_string()),
        ]);
        let tool_client = FakeToolClient::new(vec![]);
        let mut orch = orchestrator(llm, tool_client);

        let response = orch.research("summarize something", None, None, None).await.unwrap();
        assert_eq!(response.tool_trace.len(), 1);
        assert!(!response.tool_trace[0].success);
        assert_eq!(response.content, "Done without that tool.");
    }

    #[tokio::test]
    async fn duplicate_urls_are_deduplicated_across_turns() {
        let llm = FakeLlmClient::new(vec![
            ScriptedChatResult::Reply(
                r#"<tool_call>{"name": "web_search", "arguments": {"query": "a"}}</tool_call>"#.to_string(),
            ),
            ScriptedChatResult::Reply(
                r#"<tool_call>{"name": "web_search", "arguments": {"query": "b"}}</tool_call>"#.to_string(),
            ),
            ScriptedChatResult::Reply("Answer.".to_string()),
            ScriptedChatResult::Reply("1. More?\n2. Else?\n3. What?".to_string()),
        ]);
        let tool_client = FakeToolClient::new(vec![
            ScriptedToolResult::Ok(json!({"results": [{"url": "https://x", "title": "X"}]})),
            ScriptedToolResult::Ok(json!({"results": [{"url": "https://x", "title": "X again"}]})),
        ]);
        let mut orch = orchestrator(llm, tool_client);

        let response = orch.research("look up x twice", None, None, None).await.unwrap();
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].url, "https://x");
    }

    #[tokio::test]
    async fn iteration_cap_forces_a_summary_turn_without_tool_call_leaking() {
        let mut script: Vec<ScriptedChatResult> = (0..5)
            .map(|_| {
                ScriptedChatResult::Reply(
                    r#"<tool_call>{"name": "list_notes", "arguments": {}}</tool_call>"#.to_string(),
                )
            })
            .collect();
        script.push(ScriptedChatResult::Reply(
            "Summary done.<tool_call>{\"name\": \"web_search\"}</tool_call>".to_string(),
        ));
        script.push(ScriptedChatResult::Reply(
            "1. Q one?\n2. Q two?\n3. Q three?".to_string(),
        ));
        let llm_calls_expected = script.len();
        let llm = FakeLlmClient::new(script);
        let tool_client = FakeToolClient::new((0..5).map(|_| ScriptedToolResult::Ok(json!({"notes": [], "count": 0}))).collect());
        let mut orch = orchestrator(llm, tool_client);

        let response = orch.research("keep calling tools", None, None, None).await.unwrap();
        assert!(!response.content.contains("<tool_call>"));
        assert_eq!(response.content, "Summary done.");
        assert_eq!(response.tool_trace.len(), 5);
        let _ = llm_calls_expected;
    }

    #[tokio::test]
    async fn malformed_json_is_tolerated_alongside_a_valid_call() {
        let llm = FakeLlmClient::new(vec![
            ScriptedChatResult::Reply(
                "<tool_call>{not json}</tool_call><tool_call>{\"name\": \"list_notes\", \"arguments\": {}}</tool_call>"
                    .to_string(),
            ),
            ScriptedChatResult::Reply("Answer.".to_string()),
            ScriptedChatResult::Reply("1. A?\n2. B?\n3. C?".to_string()),
        ]);
        let tool_client = FakeToolClient::new(vec![ScriptedToolResult::Ok(json!({"notes": [], "count": 0}))]);
        let mut orch = orchestrator(llm, tool_client);

        let response = orch.research("list my notes", None, None, None).await.unwrap();
        assert_eq!(response.tool_trace.len(), 1);
        assert_eq!(response.tool_trace[0].tool_name, "list_notes");
    }

    #[tokio::test]
    async fn history_does_not_grow_on_llm_service_error() {
        let llm = FakeLlmClient::new(vec![ScriptedChatResult::Error(LlmError::Unavailable("down".to_string()))]);
        let mut orch = orchestrator(llm, FakeToolClient::new(vec![]));

        let result = orch.research("anything", None, None, None).await;
        assert!(result.is_err());
        assert!(orch.conversation_history().is_empty());
    }

    #[tokio::test]
    async fn research_stream_withholds_tool_call_syntax_from_chunks() {
        let llm = FakeLlmClient::new(vec![
            ScriptedChatResult::Reply(
                r#"Thinking.<tool_call>{"name": "list_notes", "arguments": {}}</tool_call>"#.to_string(),
            ),
            ScriptedChatResult::Reply("All done.".to_string()),
        ]);
        let tool_client = FakeToolClient::new(vec![ScriptedToolResult::Ok(json!({"notes": [], "count": 0}))]);
        let mut orch = orchestrator(llm, tool_client);

        let chunks = {
            let stream = orch.research_stream("list notes", None, None);
            tokio::pin!(stream);
            let mut collected = Vec::new();
            while let Some(chunk) = stream.next().await {
                collected.push(chunk.unwrap());
            }
            collected
        };
        let joined = chunks.join("");
        assert!(!joined.contains("<tool_call>"));
        assert_eq!(orch.conversation_history().len(), 2);
    }

    #[test]
    fn suggested_title_drops_known_prefix_and_capitalizes() {
        let title = derive_suggested_title("what is rust ownership");
        assert!(title.starts_with("Research: Rust ownership"));
    }

    #[test]
    fn suggested_title_truncates_overlong_queries() {
        let long_query = "a".repeat(100);
        let title = derive_suggested_title(&long_query);
        assert!(title.chars().count() <= 80);
    }

    #[tokio::test]
    async fn tool_callbacks_fire_with_name_and_outcome() {
        let llm = FakeLlmClient::new(vec![
            ScriptedChatResult::Reply(
                r#"<tool_call>{"name": "list_notes", "arguments": {}}</tool_call>"#.to_string(),
            ),
            ScriptedChatResult::Reply("Answer.".to_string()),
            ScriptedChatResult::Reply("1. A?\n2. B?\n3. C?".to_string()),
        ]);
        let tool_client = FakeToolClient::new(vec![ScriptedToolResult::Ok(json!({"notes": [], "count": 0}))]);
        let mut orch = orchestrator(llm, tool_client);

        let started: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let completed: Mutex<Vec<(String, bool)>> = Mutex::new(Vec::new());
        let on_start = |name: &str, _args: &Value| started.lock().unwrap().push(name.to_string());
        let on_complete = |name: &str, _result: &Value, success: bool| {
            completed.lock().unwrap().push((name.to_string(), success))
        };

        orch.research("list notes", Some(&on_start), Some(&on_complete), None).await.unwrap();

        assert_eq!(started.lock().unwrap().as_slice(), ["list_notes"]);
        assert_eq!(completed.lock().unwrap().as_slice(), [("list_notes".to_string(), true)]);
    }

    #[tokio::test]
    async fn text_chunk_callback_fires_during_first_think_only() {
        let llm = FakeLlmClient::new(vec![
            ScriptedChatResult::Reply("Hi there.".to_string()),
            ScriptedChatResult::Reply("1. A?\n2. B?\n3. C?".to_string()),
        ]);
        let mut orch = orchestrator(llm, FakeToolClient::new(vec![]));

        let chunks: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let on_chunk = |chunk: &str| chunks.lock().unwrap().push(chunk.to_string());

        let response = orch.research("hello", None, None, Some(&on_chunk)).await.unwrap();
        assert_eq!(response.content, "Hi there.");
        assert_eq!(chunks.lock().unwrap().as_slice(), ["Hi there."]);
    }

    #[tokio::test]
    async fn forced_summary_falls_back_to_diagnostic_when_its_own_call_fails() {
        let mut script: Vec<ScriptedChatResult> = (0..5)
            .map(|_| {
                ScriptedChatResult::Reply(
                    r#"<tool_call>{"name": "list_notes", "arguments": {}}</tool_call>"#.to_string(),
                )
            })
            .collect();
        script.push(ScriptedChatResult::Error(LlmError::Unavailable("down".to_string())));
        let llm = FakeLlmClient::new(script);
        let tool_client = FakeToolClient::new((0..5).map(|_| ScriptedToolResult::Ok(json!({"notes": [], "count": 0}))).collect());
        let mut orch = orchestrator(llm, tool_client);

        let response = orch.research("keep calling tools", None, None, None).await.unwrap();
        assert_eq!(
            response.content,
            "Research completed but summary generation failed. Please review the 0 sources gathered above for details."
        );
        assert_eq!(response.tool_trace.len(), 5);
        assert_eq!(orch.conversation_history().len(), 2);
    }
}
