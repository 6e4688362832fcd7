//! The tool-server client contract (§6.2) — an external collaborator.
//!
//! JSON-RPC 2.0 over HTTP POST. The core only ever calls `tools/call` (to
//! invoke a tool) and `tools/list` (for [`crate::orchestrator::Orchestrator::health_check`]).
//! [`McpHttpToolClient`] is a minimal default transport, grounded in the
//! original implementation's MCP client (`tools/call` with a caller-supplied
//! id, `result`-or-`error` response shape).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Errors that escape the transport layer. A [`ToolClientError`] returned
/// from `call_tool` is a *transport* failure (connection refused, timeout);
/// a protocol-level tool error comes back as `Ok(ToolOutcome { error: Some(_), .. })`
/// instead, per §6.2's "transport errors are distinguished from protocol
/// errors".
#[derive(Debug, Error, Clone)]
pub enum ToolClientError {
    #[error("tool server unavailable: {0}")]
    Unavailable(String),
    #[error("tool call timed out")]
    Timeout,
}

/// Outcome of one `tools/call` round trip once the transport succeeded.
/// Exactly one of `result`/`error` is populated.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Composite health of the tool server.
#[derive(Debug, Clone)]
pub struct ToolServerHealth {
    pub available: bool,
    pub tools: Vec<String>,
}

/// Request/response contract for the external tool server.
#[async_trait]
pub trait ToolClient: Send + Sync {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        request_id: &str,
    ) -> Result<ToolOutcome, ToolClientError>;

    async fn health(&self) -> ToolServerHealth;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Value,
    id: &'a str,
}

#[derive(Deserialize)]
struct JsonRpcError {
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Default [`ToolClient`] talking to an MCP-style JSON-RPC tool server over
/// HTTP.
pub struct McpHttpToolClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl McpHttpToolClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post(&self, method: &str, params: Value, id: &str) -> Result<JsonRpcResponse, ToolClientError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.client.post(&self.base_url).json(&body).send(),
        )
        .await
        .map_err(|_| ToolClientError::Timeout)?
        .map_err(|e| ToolClientError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolClientError::Unavailable(format!(
                "tool server returned status {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ToolClientError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ToolClient for McpHttpToolClient {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        request_id: &str,
    ) -> Result<ToolOutcome, ToolClientError> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let response = self.post("tools/call", params, request_id).await?;

        if let Some(error) = response.error {
            let mut message = error.message;
            if let Some(data) = error.data {
                message.push_str(&format!(": {data}"));
            }
            return Ok(ToolOutcome::failed(message));
        }

        Ok(ToolOutcome::ok(response.result.unwrap_or(Value::Null)))
    }

    async fn health(&self) -> ToolServerHealth {
        match self.post("tools/list", serde_json::json!({}), "health").await {
            Ok(response) if response.error.is_none() => {
                let tools = response
                    .result
                    .as_ref()
                    .and_then(|r| r.get("tools"))
                    .and_then(Value::as_array)
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|t| t.get("name").and_then(Value::as_str))
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                ToolServerHealth {
                    available: true,
                    tools,
                }
            }
            _ => ToolServerHealth {
                available: false,
                tools: Vec::new(),
            },
        }
    }
}
