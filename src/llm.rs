//! The language-model client contract (§6.1) — an external collaborator.
//!
//! The core only depends on [`LlmClient`]; it never hard-codes a specific
//! chat API. [`OllamaClient`] is a thin default implementation over
//! Ollama's `/api/chat` endpoint, grounded the way the teacher crate's
//! provider implementations wrap a chat API with `reqwest`, kept minimal
//! because the wire format of any one LM backend is explicitly out of this
//! crate's scope.

use crate::message::Message;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by an [`LlmClient`]. These are the only errors that abort
/// a `research()` call outright — everything else is recovered locally.
#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("model '{0}' is not installed")]
    ModelNotInstalled(String),
    #[error("request to language model timed out")]
    Timeout,
    #[error("language model service unavailable: {0}")]
    Unavailable(String),
}

/// Per-request sampling options.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
}

/// Request/response contract for a chat language model.
///
/// Implementations own their own transport, retries, and auth; the core
/// never reaches past this trait.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// A single complete response.
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        options: ChatOptions,
    ) -> Result<String, LlmError>;

    /// A token/fragment stream, terminated by end-of-stream.
    async fn chat_stream(
        &self,
        messages: &[Message],
        model: &str,
        options: ChatOptions,
    ) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError>;

    /// Quick liveness probe for [`crate::orchestrator::Orchestrator::health_check`].
    async fn is_available(&self) -> bool;
}

#[derive(Serialize)]
struct OllamaChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaChatResponseMessage>,
    #[serde(default)]
    done: bool,
}

/// Default [`LlmClient`] talking to a local Ollama server.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn to_wire(messages: &[Message]) -> Vec<OllamaChatMessage<'_>> {
        messages
            .iter()
            .map(|m| OllamaChatMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        let body = OllamaChatRequest {
            model,
            messages: Self::to_wire(messages),
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
            },
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(format!("{}/api/chat", self.base_url))
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| LlmError::Timeout)?
        .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(LlmError::ModelNotInstalled(model.to_string()));
        }
        if !response.status().is_success() {
            return Err(LlmError::Unavailable(format!(
                "ollama returned status {}",
                response.status()
            )));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        Ok(parsed.message.map(|m| m.content).unwrap_or_default())
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        model: &str,
        options: ChatOptions,
    ) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError> {
        let body = OllamaChatRequest {
            model,
            messages: Self::to_wire(messages),
            stream: true,
            options: OllamaOptions {
                temperature: options.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;

        if response.status().as_u16() == 404 {
            return Err(LlmError::ModelNotInstalled(model.to_string()));
        }
        if !response.status().is_success() {
            return Err(LlmError::Unavailable(format!(
                "ollama returned status {}",
                response.status()
            )));
        }

        let byte_stream = response.bytes_stream();
        let mut leftover = Vec::new();

        let chunks = byte_stream.flat_map(move |chunk| {
            let mut out = Vec::new();
            match chunk {
                Ok(bytes) => {
                    leftover.extend_from_slice(&bytes);
                    while let Some(pos) = leftover.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = leftover.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line);
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<OllamaChatResponse>(line) {
                            Ok(parsed) => {
                                if let Some(msg) = parsed.message {
                                    if !msg.content.is_empty() {
                                        out.push(Ok(msg.content));
                                    }
                                }
                                if parsed.done {
                                    break;
                                }
                            }
                            Err(_) => continue,
                        }
                    }
                }
                Err(e) => out.push(Err(LlmError::Unavailable(e.to_string()))),
            }
            stream::iter(out)
        });

        Ok(Box::pin(chunks))
    }

    async fn is_available(&self) -> bool {
        let Ok(result) = tokio::time::timeout(
            Duration::from_secs(5),
            self.client
                .get(format!("{}/api/version", self.base_url))
                .send(),
        )
        .await
        else {
            return false;
        };
        matches!(result, Ok(resp) if resp.status().is_success())
    }
}
