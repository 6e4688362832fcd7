//! Error taxonomy for the research agent core.
//!
//! Mirrors the error-code / error-category split used throughout the
//! codebase this core was distilled from: a stable, machine-readable
//! [`ErrorCode`] paired with a broad [`ErrorCategory`] for routing, and a
//! [`CoreError`] that carries both plus a human-readable message and an
//! optional recovery suggestion.

use std::collections::HashMap;
use std::fmt;

/// Machine-readable error codes. Stable across releases; match on these,
/// not on `message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidRequest,
    MissingParameter,
    InvalidUrl,

    SearchFailed,
    SearchTimeout,
    SearchNoResults,

    FetchFailed,
    FetchTimeout,
    FetchInvalidUrl,

    NoteNotFound,
    NoteSaveFailed,

    UnknownTool,

    OllamaUnavailable,
    OllamaModelNotFound,
    OllamaTimeout,
    McpServerUnavailable,
    McpToolFailed,

    InternalError,
}

impl ErrorCode {
    /// Snake-case wire form, e.g. `"search_failed"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::MissingParameter => "missing_parameter",
            ErrorCode::InvalidUrl => "invalid_url",
            ErrorCode::SearchFailed => "search_failed",
            ErrorCode::SearchTimeout => "search_timeout",
            ErrorCode::SearchNoResults => "search_no_results",
            ErrorCode::FetchFailed => "fetch_failed",
            ErrorCode::FetchTimeout => "fetch_timeout",
            ErrorCode::FetchInvalidUrl => "fetch_invalid_url",
            ErrorCode::NoteNotFound => "note_not_found",
            ErrorCode::NoteSaveFailed => "note_save_failed",
            ErrorCode::UnknownTool => "unknown_tool",
            ErrorCode::OllamaUnavailable => "ollama_unavailable",
            ErrorCode::OllamaModelNotFound => "ollama_model_not_found",
            ErrorCode::OllamaTimeout => "ollama_timeout",
            ErrorCode::McpServerUnavailable => "mcp_server_unavailable",
            ErrorCode::McpToolFailed => "mcp_tool_failed",
            ErrorCode::InternalError => "internal_error",
        }
    }

    /// The error category this code is routed under.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::InvalidRequest | ErrorCode::MissingParameter | ErrorCode::InvalidUrl => {
                ErrorCategory::Validation
            }
            ErrorCode::SearchFailed
            | ErrorCode::SearchTimeout
            | ErrorCode::SearchNoResults
            | ErrorCode::FetchFailed
            | ErrorCode::FetchTimeout
            | ErrorCode::FetchInvalidUrl
            | ErrorCode::NoteNotFound
            | ErrorCode::NoteSaveFailed
            | ErrorCode::McpToolFailed => ErrorCategory::Tool,
            ErrorCode::UnknownTool => ErrorCategory::Tool,
            ErrorCode::OllamaUnavailable
            | ErrorCode::OllamaModelNotFound
            | ErrorCode::OllamaTimeout
            | ErrorCode::McpServerUnavailable => ErrorCategory::Service,
            ErrorCode::InternalError => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Broad error category, used to decide whether a failure aborts the query
/// or is recovered locally by folding it into the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Tool,
    Service,
    Protocol,
    Internal,
}

/// A user-visible error: `{code, message, suggestion?, details?}`.
///
/// This is the shape every error surfaced to a caller of the orchestrator
/// takes, whether it originated as a tool failure folded into a
/// [`crate::dispatcher::ToolExecution`] or as a service error raised out of
/// `research()`.
#[derive(Debug, Clone)]
pub struct CoreError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
    pub details: HashMap<String, String>,
}

impl CoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestion: None,
            details: HashMap::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CoreError {}
