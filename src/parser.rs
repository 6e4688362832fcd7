//! C1 — Tool-Call Parser.
//!
//! Extracts `<tool_call>{...}</tool_call>` regions from free-form LM output.
//! The LM sometimes emits malformed or stray tool calls; this module isolates
//! and discards them rather than failing the whole turn.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

fn tool_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"<tool_call>\s*(.*?)\s*</tool_call>")
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .expect("static tool_call regex is valid")
    })
}

fn open_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"<tool_call>")
            .case_insensitive(true)
            .build()
            .expect("static open-tag regex is valid")
    })
}

/// A parsed tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Map<String, Value>,
    /// Original JSON payload, kept for diagnostics.
    pub raw: String,
}

/// Snapshot over one LM output.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub tool_calls: Vec<ToolCall>,
    pub text_before: String,
    pub text_after: String,
    pub has_incomplete: bool,
}

/// Parse LM output to extract tool calls.
pub fn parse_tool_calls(text: &str) -> ParseResult {
    let matches: Vec<_> = tool_call_re().captures_iter(text).collect();

    if matches.is_empty() {
        let has_incomplete = is_waiting_for_tool_call(text);
        let text_before = if has_incomplete {
            let open_start = open_tag_re()
                .find(text)
                .map(|m| m.start())
                .unwrap_or(text.len());
            text[..open_start].trim().to_string()
        } else {
            text.trim().to_string()
        };
        return ParseResult {
            tool_calls: Vec::new(),
            text_before,
            text_after: String::new(),
            has_incomplete,
        };
    }

    let first = matches.first().unwrap().get(0).unwrap();
    let last = matches.last().unwrap().get(0).unwrap();
    let text_before = text[..first.start()].trim().to_string();
    let text_after_raw = &text[last.end()..];
    let has_incomplete = open_tag_re().is_match(text_after_raw);
    let text_after = text_after_raw.trim().to_string();

    let mut tool_calls = Vec::new();
    for cap in &matches {
        let raw_json = cap.get(1).map(|m| m.as_str()).unwrap_or("").trim();
        if let Some(call) = parse_single_tool_call(raw_json) {
            tool_calls.push(call);
        }
    }

    ParseResult {
        tool_calls,
        text_before,
        text_after,
        has_incomplete,
    }
}

/// Parse one `<tool_call>` payload. Returns `None` (silently skipped, never
/// fails the turn) when the payload isn't a JSON object, lacks a string
/// `name`, or has a non-object `arguments` field.
fn parse_single_tool_call(raw_json: &str) -> Option<ToolCall> {
    let cleaned = clean_json(raw_json);

    let data: Value = serde_json::from_str(&cleaned).ok()?;
    let obj = data.as_object()?;

    let name = obj.get("name")?.as_str()?.to_string();

    let arguments = match obj.get("arguments") {
        None => serde_json::Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return None,
    };

    Some(ToolCall {
        name,
        arguments,
        raw: raw_json.to_string(),
    })
}

/// Clean up common LM JSON formatting issues: fenced code blocks, and
/// single-quoted strings when no double quotes are present at all.
fn clean_json(raw: &str) -> String {
    let mut cleaned = raw.trim();

    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned = cleaned.trim();

    if cleaned.contains('\'') && !cleaned.contains('"') {
        return cleaned.replace('\'', "\"");
    }
    cleaned.to_string()
}

/// Strip all tool-call tags (complete or dangling) from LM output, leaving
/// just the prose.
pub fn extract_text_content(text: &str) -> String {
    let without_complete = tool_call_re().replace_all(text, "");
    let trailing_open = RegexBuilder::new(r"<tool_call>.*$")
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .expect("static trailing-open regex is valid");
    let without_trailing = trailing_open.replace(&without_complete, "");

    let collapse_blank_lines = Regex::new(r"\n{3,}").expect("static blank-line regex is valid");
    collapse_blank_lines
        .replace_all(&without_trailing, "\n\n")
        .trim()
        .to_string()
}

/// True iff `text` contains at least one complete tool call.
pub fn has_tool_call(text: &str) -> bool {
    tool_call_re().is_match(text)
}

/// Truncate `text` at the first `<tool_call>` open tag, if any. Used by the
/// forced-summary turn: the orchestrator still enforces "no tool calls in
/// the final answer" even if the LM disregards the "do not call tools"
/// instruction.
pub fn truncate_at_tool_call(text: &str) -> String {
    match open_tag_re().find(text) {
        Some(m) => text[..m.start()].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// True iff `text` has an opening `<tool_call>` tag with no matching close —
/// the streaming "mid-call" signal. Used by `research_stream` to suppress
/// forwarding partial tool-call syntax to the caller.
pub fn is_waiting_for_tool_call(text: &str) -> bool {
    open_tag_re().is_match(text) && !tool_call_re().is_match(text)
}

/// Streaming tool-call suppression state machine (§9): `Normal -> InCall` on
/// seeing `<tool_call>`, back to `Normal` on `</tool_call>`. Only text seen
/// while `Normal` should ever reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFilterState {
    Normal,
    InCall,
}

/// Feeds an accumulating buffer through the `Normal -> InCall -> Normal`
/// machine and reports how much of the latest chunk is safe to forward.
#[derive(Debug, Clone)]
pub struct StreamFilter {
    state: StreamFilterState,
    buffer: String,
}

impl StreamFilter {
    pub fn new() -> Self {
        Self {
            state: StreamFilterState::Normal,
            buffer: String::new(),
        }
    }

    pub fn state(&self) -> StreamFilterState {
        self.state
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Push a new chunk of LM output. Returns the substring of `chunk` that
    /// is safe to forward to the caller (empty while inside a tool-call
    /// region).
    pub fn push(&mut self, chunk: &str) -> String {
        self.buffer.push_str(chunk);

        match self.state {
            StreamFilterState::Normal => {
                if let Some(open) = open_tag_re().find(&self.buffer) {
                    self.state = StreamFilterState::InCall;
                    // Only the portion of `chunk` before the tag start (if
                    // any) is forwardable; everything from the tag onward is
                    // withheld.
                    let visible_end = open.start();
                    let already_emitted = self.buffer.len() - chunk.len();
                    if visible_end > already_emitted {
                        chunk[..(visible_end - already_emitted).min(chunk.len())].to_string()
                    } else {
                        String::new()
                    }
                } else {
                    chunk.to_string()
                }
            }
            StreamFilterState::InCall => {
                if tool_call_re().is_match(&self.buffer) {
                    // The call is complete; the orchestrator parses it from
                    // its own accumulated response text, so this filter's
                    // buffer only needs to track suppression state.
                    self.buffer.clear();
                    self.state = StreamFilterState::Normal;
                }
                String::new()
            }
        }
    }

    /// Reset after the dispatcher has consumed the completed call(s) in the
    /// buffer, continuing the loop with a clean slate.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = StreamFilterState::Normal;
    }
}

impl Default for StreamFilter {
    fn default() -> Self {
        Self::new()
    }
}
