//! Orchestrator tunables.
//!
//! Deliberately a plain struct with `Default`, not an env/file loader: the
//! spec treats a configuration store as an out-of-scope external
//! collaborator. A caller that owns one can populate [`OrchestratorConfig`]
//! from it before constructing the [`crate::orchestrator::Orchestrator`].

use std::time::Duration;

/// High-level policy controlling source-count and depth directives in the
/// system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchMode {
    Quick,
    Deep,
}

impl ResearchMode {
    pub fn limits(&self) -> ModeLimits {
        match self {
            ResearchMode::Quick => ModeLimits {
                search_limit: 5,
                fetch_limit: 3,
                max_words: Some(250),
                detailed: false,
            },
            ResearchMode::Deep => ModeLimits {
                search_limit: 7,
                fetch_limit: 5,
                max_words: None,
                detailed: true,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchMode::Quick => "quick",
            ResearchMode::Deep => "deep",
        }
    }

    /// Parse from the wire-level key, defaulting to `Quick` on anything else
    /// (validated setters silently ignore out-of-range values — see
    /// `Orchestrator::set_research_mode`).
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "quick" => Some(ResearchMode::Quick),
            "deep" => Some(ResearchMode::Deep),
            _ => None,
        }
    }
}

/// Search/fetch depth bounds for one research mode.
#[derive(Debug, Clone, Copy)]
pub struct ModeLimits {
    pub search_limit: u32,
    pub fetch_limit: u32,
    pub max_words: Option<u32>,
    pub detailed: bool,
}

/// How `fetch_page` should extract page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchExtractMode {
    Text,
    Markdown,
}

impl FetchExtractMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchExtractMode::Text => "text",
            FetchExtractMode::Markdown => "markdown",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "text" => Some(FetchExtractMode::Text),
            "markdown" => Some(FetchExtractMode::Markdown),
            _ => None,
        }
    }
}

/// Tunables for one [`crate::orchestrator::Orchestrator`] instance.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Hard cap on `THINK -> PARSE -> EXECUTE` cycles before forcing a
    /// summary turn.
    pub max_iterations: u32,
    /// Per-tool-call deadline.
    pub tool_timeout: Duration,
    /// Model name passed to the LM client.
    pub model: String,
    pub research_mode: ResearchMode,
    pub fetch_extract_mode: FetchExtractMode,
    /// Sampling temperature, clamped to `[0, 1]` by validated setters.
    pub temperature: f32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            tool_timeout: Duration::from_secs(30),
            model: "ministral-3:8b".to_string(),
            research_mode: ResearchMode::Quick,
            fetch_extract_mode: FetchExtractMode::Text,
            temperature: 0.4,
        }
    }
}

/// The only tools the dispatcher will ever invoke. Anything else is
/// rejected before the tool client is touched.
pub const VALID_TOOLS: &[&str] = &[
    "web_search",
    "fetch_page",
    "save_note",
    "list_notes",
    "get_note",
];
