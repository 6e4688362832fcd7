//! Agent core: a bounded loop between a chat language model and an
//! external JSON-RPC tool server. See [`orchestrator::Orchestrator`] for
//! the entry point.

pub mod citations;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod followup;
pub mod llm;
pub mod message;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod sources;
pub mod toolclient;

#[cfg(test)]
pub mod test_support;

pub use citations::{Citation, add_sources, create_citation_summary, extract_citations, renumber_citations, validate_citations};
pub use config::{FetchExtractMode, OrchestratorConfig, ResearchMode, VALID_TOOLS};
pub use dispatcher::ToolExecution;
pub use error::{CoreError, ErrorCategory, ErrorCode};
pub use llm::{ChatOptions, LlmClient, LlmError, OllamaClient};
pub use message::{Message, Role};
pub use orchestrator::{HealthStatus, OnToolComplete, OnToolStart, OnTextChunk, Orchestrator, ResearchResponse};
pub use parser::{ParseResult, StreamFilter, ToolCall};
pub use sources::{Source, deduplicate_sources, extract_sources};
pub use toolclient::{McpHttpToolClient, ToolClient, ToolClientError, ToolOutcome, ToolServerHealth};
