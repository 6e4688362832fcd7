//! C5 — Tool Dispatcher.
//!
//! Validates a parsed [`crate::parser::ToolCall`] against the tool
//! whitelist, applies per-tool default injection, invokes the [`ToolClient`]
//! under a deadline, and folds the outcome into a [`ToolExecution`] record —
//! the orchestrator never touches [`ToolClientError`] directly.

use crate::config::{FetchExtractMode, OrchestratorConfig, VALID_TOOLS};
use crate::error::ErrorCode;
use crate::parser::ToolCall;
use crate::toolclient::{ToolClient, ToolClientError};
use chrono::Local;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// One tool call's full lifecycle, in or out of the transcript.
///
/// Invariant: exactly one of `result`/`error` is populated, and `success`
/// agrees with which one.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub tool_name: String,
    pub arguments: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub error_code: Option<&'static str>,
    pub success: bool,
    pub duration_ms: f64,
    pub timestamp: String,
    pub request_id: String,
}

impl ToolExecution {
    fn success(tool_name: String, arguments: Value, result: Value, duration_ms: f64, request_id: String) -> Self {
        Self {
            tool_name,
            arguments,
            result: Some(result),
            error: None,
            error_code: None,
            success: true,
            duration_ms,
            timestamp: Local::now().to_rfc3339(),
            request_id,
        }
    }

    fn failure(
        tool_name: String,
        arguments: Value,
        code: ErrorCode,
        message: String,
        duration_ms: f64,
        request_id: String,
    ) -> Self {
        Self {
            tool_name,
            arguments,
            result: None,
            error: Some(message),
            error_code: Some(code.as_str()),
            success: false,
            duration_ms,
            timestamp: Local::now().to_rfc3339(),
            request_id,
        }
    }
}

/// Fired immediately before a tool call is dispatched.
pub type OnStart<'a> = dyn Fn(&str, &Value) + Send + Sync + 'a;
/// Fired once the execution record is final, win or lose.
pub type OnComplete<'a> = dyn Fn(&ToolExecution) + Send + Sync + 'a;

/// Dispatches a single parsed tool call against a [`ToolClient`].
pub struct Dispatcher<'a> {
    tool_client: &'a dyn ToolClient,
    config: &'a OrchestratorConfig,
    on_start: Option<&'a OnStart<'a>>,
    on_complete: Option<&'a OnComplete<'a>>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(tool_client: &'a dyn ToolClient, config: &'a OrchestratorConfig) -> Self {
        Self {
            tool_client,
            config,
            on_start: None,
            on_complete: None,
        }
    }

    pub fn with_on_start(mut self, callback: &'a OnStart<'a>) -> Self {
        self.on_start = Some(callback);
        self
    }

    pub fn with_on_complete(mut self, callback: &'a OnComplete<'a>) -> Self {
        self.on_complete = Some(callback);
        self
    }

    /// Validate, default-inject, invoke, and record one tool call.
    ///
    /// Never returns `Err`: every failure mode (unknown tool, transport
    /// error, timeout, protocol error) is folded into the returned
    /// [`ToolExecution`] instead, so the orchestrator's loop never needs a
    /// separate error branch for tool failures.
    pub async fn dispatch(&self, call: &ToolCall, request_id: &str) -> ToolExecution {
        let arguments = Value::Object(call.arguments.clone());
        self.fire_on_start(&call.name, &arguments);

        let started = std::time::Instant::now();

        if !VALID_TOOLS.contains(&call.name.as_str()) {
            let execution = ToolExecution::failure(
                call.name.clone(),
                arguments,
                ErrorCode::UnknownTool,
                format!("Unknown tool: {}", call.name),
                elapsed_ms(started),
                request_id.to_string(),
            );
            self.fire_on_complete(&execution);
            return execution;
        }

        let arguments = self.apply_defaults(&call.name, arguments);

        let execution = match self.invoke(&call.name, arguments.clone(), request_id).await {
            Ok(outcome) if outcome.is_success() => ToolExecution::success(
                call.name.clone(),
                arguments,
                outcome.result.unwrap_or(Value::Null),
                elapsed_ms(started),
                request_id.to_string(),
            ),
            Ok(outcome) => ToolExecution::failure(
                call.name.clone(),
                arguments,
                ErrorCode::McpToolFailed,
                outcome.error.unwrap_or_else(|| "tool reported failure".to_string()),
                elapsed_ms(started),
                request_id.to_string(),
            ),
            Err(ToolClientError::Timeout) => ToolExecution::failure(
                call.name.clone(),
                arguments,
                ErrorCode::McpServerUnavailable,
                format!("Tool '{}' timed out after {:?}", call.name, self.config.tool_timeout),
                elapsed_ms(started),
                request_id.to_string(),
            ),
            Err(ToolClientError::Unavailable(msg)) => ToolExecution::failure(
                call.name.clone(),
                arguments,
                ErrorCode::McpServerUnavailable,
                format!("Tool server unavailable: {msg}"),
                elapsed_ms(started),
                request_id.to_string(),
            ),
        };

        self.fire_on_complete(&execution);
        execution
    }

    async fn invoke(
        &self,
        name: &str,
        arguments: Value,
        request_id: &str,
    ) -> Result<crate::toolclient::ToolOutcome, ToolClientError> {
        match tokio::time::timeout(
            self.config.tool_timeout,
            self.tool_client.call_tool(name, arguments, request_id),
        )
        .await
        {
            Ok(inner) => inner,
            Err(_) => Err(ToolClientError::Timeout),
        }
    }

    /// Inject tool-specific defaults the LM is allowed to omit.
    fn apply_defaults(&self, tool_name: &str, arguments: Value) -> Value {
        if tool_name != "fetch_page" {
            return arguments;
        }
        let Value::Object(mut map) = arguments else {
            return arguments;
        };
        map.entry("extract_mode")
            .or_insert_with(|| Value::String(extract_mode_key(self.config.fetch_extract_mode).to_string()));
        Value::Object(map)
    }

    fn fire_on_start(&self, name: &str, arguments: &Value) {
        if let Some(callback) = self.on_start {
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| callback(name, arguments)));
        }
    }

    fn fire_on_complete(&self, execution: &ToolExecution) {
        if let Some(callback) = self.on_complete {
            let _ = std::panic::catch_unwind(AssertUnwindSafe(|| callback(execution)));
        }
    }
}

fn extract_mode_key(mode: FetchExtractMode) -> &'static str {
    mode.as_str()
}

fn elapsed_ms(started: std::time::Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Duration helper kept separate from [`OrchestratorConfig`] so tests can
/// build a config with a short timeout without pulling in `Duration` at the
/// call site.
pub fn timeout_of_millis(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
