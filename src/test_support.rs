//! Scripted fakes for [`crate::llm::LlmClient`] and
//! [`crate::toolclient::ToolClient`], used across dispatcher/orchestrator
//! tests. Not part of the public API.

use crate::llm::{ChatOptions, LlmClient, LlmError};
use crate::message::Message;
use crate::toolclient::{ToolClient, ToolClientError, ToolOutcome, ToolServerHealth};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde_json::Value;
use std::sync::Mutex;

/// One scripted outcome for a `web_search`/`fetch_page`/... round trip.
pub enum ScriptedToolResult {
    Ok(Value),
    ToolError(String),
    Timeout,
    Unavailable(String),
}

/// A [`ToolClient`] that replays a fixed queue of outcomes, one per call,
/// and records every call it received.
pub struct FakeToolClient {
    script: Mutex<Vec<ScriptedToolResult>>,
    calls: Mutex<Vec<(String, Value)>>,
    health: ToolServerHealth,
}

impl FakeToolClient {
    pub fn new(script: Vec<ScriptedToolResult>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().rev().collect()),
            calls: Mutex::new(Vec::new()),
            health: ToolServerHealth {
                available: true,
                tools: crate::config::VALID_TOOLS.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_arguments(&self) -> Option<Value> {
        self.calls.lock().unwrap().last().map(|(_, args)| args.clone())
    }
}

#[async_trait]
impl ToolClient for FakeToolClient {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        _request_id: &str,
    ) -> Result<ToolOutcome, ToolClientError> {
        self.calls.lock().unwrap().push((name.to_string(), arguments));
        let next = self.script.lock().unwrap().pop();
        match next {
            Some(ScriptedToolResult::Ok(result)) => Ok(ToolOutcome::ok(result)),
            Some(ScriptedToolResult::ToolError(message)) => Ok(ToolOutcome::failed(message)),
            Some(ScriptedToolResult::Timeout) => {
                // Block past any reasonable test timeout so the dispatcher's
                // own `tokio::time::timeout` is what actually fires.
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Err(ToolClientError::Timeout)
            }
            Some(ScriptedToolResult::Unavailable(message)) => Err(ToolClientError::Unavailable(message)),
            None => Err(ToolClientError::Unavailable("fake tool client script exhausted".to_string())),
        }
    }

    async fn health(&self) -> ToolServerHealth {
        self.health.clone()
    }
}

/// One scripted reply for an `LlmClient::chat` call.
pub enum ScriptedChatResult {
    Reply(String),
    Error(LlmError),
}

/// A non-streaming [`LlmClient`] that replays a fixed queue of replies.
pub struct FakeLlmClient {
    script: Mutex<Vec<ScriptedChatResult>>,
    received: Mutex<Vec<Vec<Message>>>,
    available: bool,
}

impl FakeLlmClient {
    pub fn new(script: Vec<ScriptedChatResult>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().rev().collect()),
            received: Mutex::new(Vec::new()),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
            available: false,
        }
    }

    pub fn call_count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.received.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn chat(&self, messages: &[Message], _model: &str, _options: ChatOptions) -> Result<String, LlmError> {
        self.received.lock().unwrap().push(messages.to_vec());
        match self.script.lock().unwrap().pop() {
            Some(ScriptedChatResult::Reply(text)) => Ok(text),
            Some(ScriptedChatResult::Error(err)) => Err(err),
            None => Ok(String::new()),
        }
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        model: &str,
        options: ChatOptions,
    ) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError> {
        let reply = self.chat(messages, model, options).await?;
        Ok(Box::pin(stream::iter(vec![Ok(reply)])))
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}
