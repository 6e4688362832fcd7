//! C2 — Prompt Assembler.
//!
//! Builds the system prompt (tool catalog + mode directive) and formats
//! tool results back into LM-visible text.

use crate::config::ResearchMode;
use serde_json::Value;

const PREAMBLE: &str = "\
You are a careful research assistant. You answer questions by gathering \
information with the tools available to you, then synthesizing a clear, \
well-cited answer. Cite sources inline as [n], matching the order sources \
were gathered in. Draw on multiple sources rather than relying on a single \
one when more are available. Never invent a tool outside the catalog below. \
Stop calling tools once you have enough information to answer confidently.";

struct ToolSpec {
    name: &'static str,
    description: &'static str,
    example: &'static str,
}

const TOOL_CATALOG: &[ToolSpec] = &[
    ToolSpec {
        name: "web_search",
        description: "Search the web. Args: query (string, required), limit (integer 1-5, default 3).",
        example: r#"<tool_call>{"name": "web_search", "arguments": {"query": "rust async runtimes", "limit": 3}}</tool_call>"#,
    },
    ToolSpec {
        name: "fetch_page",
        description: "Fetch and extract a web page's content. Args: url (string, required, http/https), max_chars (integer, default 8000), extract_mode (\"text\"|\"markdown\", default \"text\").",
        example: r#"<tool_call>{"name": "fetch_page", "arguments": {"url": "https://example.com/article"}}</tool_call>"#,
    },
    ToolSpec {
        name: "save_note",
        description: "Save a note. Args: title (string, required), content (string, required), tags (list<string>, optional), source_urls (list<string>, optional).",
        example: r#"<tool_call>{"name": "save_note", "arguments": {"title": "Notes on X", "content": "..."}}</tool_call>"#,
    },
    ToolSpec {
        name: "list_notes",
        description: "List saved notes. Args: query (string, optional), tags (list<string>, optional), limit (integer, default 20), offset (integer, default 0).",
        example: r#"<tool_call>{"name": "list_notes", "arguments": {}}</tool_call>"#,
    },
    ToolSpec {
        name: "get_note",
        description: "Fetch a single saved note by id. Args: id (string UUID, required).",
        example: r#"<tool_call>{"name": "get_note", "arguments": {"id": "5b1e2b3a-0000-4000-8000-000000000000"}}</tool_call>"#,
    },
];

fn tool_catalog_block() -> String {
    let mut lines = vec!["## Available Tools".to_string()];
    for tool in TOOL_CATALOG {
        lines.push(format!("\n### {}\n{}\nExample:\n{}", tool.name, tool.description, tool.example));
    }
    lines.join("\n")
}

fn mode_directive(mode: ResearchMode) -> String {
    let limits = mode.limits();
    match mode {
        ResearchMode::Quick => format!(
            "\n## Mode: Quick Summary\nUse up to {} search results and read at least {} pages. \
             Answer in under {} words using bullet points.",
            limits.search_limit,
            limits.fetch_limit,
            limits.max_words.unwrap_or(250)
        ),
        ResearchMode::Deep => format!(
            "\n## Mode: Deep Dive\nUse up to {} search results and read at least {} pages. \
             Provide a detailed analysis with comparisons where relevant.",
            limits.search_limit, limits.fetch_limit
        ),
    }
}

/// Build the full system prompt for a given research mode.
pub fn build_system_prompt(mode: ResearchMode) -> String {
    format!("{PREAMBLE}\n\n{}\n{}", tool_catalog_block(), mode_directive(mode))
}

/// Format a successful tool result for the LM as `<tool_result>`.
pub fn format_tool_result_success(tool_name: &str, result: &Value) -> String {
    format!(
        "<tool_result name=\"{tool_name}\">\n{}\n</tool_result>",
        format_result_content(tool_name, result)
    )
}

/// Format a failed tool call for the LM as `<tool_error>`.
pub fn format_tool_result_error(tool_name: &str, code: &str, message: &str) -> String {
    format!("<tool_error name=\"{tool_name}\" code=\"{code}\">\n{message}\n</tool_error>")
}

fn format_result_content(tool_name: &str, result: &Value) -> String {
    match tool_name {
        "web_search" => format_web_search(result),
        "fetch_page" => format_fetch_page(result),
        "save_note" => format_save_note(result),
        "list_notes" => format_list_notes(result),
        "get_note" => format_get_note(result),
        _ => serde_json::to_string_pretty(result).unwrap_or_default(),
    }
}

fn format_web_search(result: &Value) -> String {
    let results = result.get("results").and_then(Value::as_array);
    let Some(results) = results.filter(|r| !r.is_empty()) else {
        return "No results found.".to_string();
    };

    let mut lines = vec![format!("Found {} results:\n", results.len())];
    for (i, r) in results.iter().enumerate() {
        let title = r.get("title").and_then(Value::as_str).unwrap_or("Untitled");
        let url = r.get("url").and_then(Value::as_str).unwrap_or("");
        lines.push(format!("[{}] {title}", i + 1));
        lines.push(format!("    URL: {url}"));
        if let Some(snippet) = r.get("snippet").and_then(Value::as_str) {
            if !snippet.is_empty() {
                lines.push(format!("    {}...", truncate_chars(snippet, 200)));
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

fn format_fetch_page(result: &Value) -> String {
    let title = result.get("title").and_then(Value::as_str).unwrap_or("Untitled");
    let url = result.get("url").and_then(Value::as_str).unwrap_or("");
    let content = result.get("content").and_then(Value::as_str).unwrap_or("");
    let truncated = result.get("truncated").and_then(Value::as_bool).unwrap_or(false);

    let mut lines = vec![
        format!("Title: {title}"),
        format!("URL: {url}"),
        String::new(),
        "Content:".to_string(),
        truncate_chars(content, 5000),
    ];
    if truncated {
        lines.push("\n(Content was truncated)".to_string());
    }
    lines.join("\n")
}

fn format_save_note(result: &Value) -> String {
    let note = result.get("note");
    let id = note.and_then(|n| n.get("id")).and_then(Value::as_str).unwrap_or("");
    let title = note.and_then(|n| n.get("title")).and_then(Value::as_str).unwrap_or("");
    format!("Note saved successfully.\nID: {id}\nTitle: {title}")
}

fn format_list_notes(result: &Value) -> String {
    let notes = result.get("notes").and_then(Value::as_array);
    let count = result.get("count").and_then(Value::as_u64).unwrap_or(0);
    let Some(notes) = notes.filter(|n| !n.is_empty()) else {
        return "No notes found.".to_string();
    };

    let mut lines = vec![format!("Found {count} notes:\n")];
    for note in notes {
        let title = note.get("title").and_then(Value::as_str).unwrap_or("");
        let id = note.get("id").and_then(Value::as_str).unwrap_or("");
        lines.push(format!("- {title} (ID: {}...)", truncate_chars(id, 8)));
        if let Some(tags) = note.get("tags").and_then(Value::as_array) {
            if !tags.is_empty() {
                let tag_list: Vec<&str> = tags.iter().filter_map(Value::as_str).collect();
                lines.push(format!("  Tags: {}", tag_list.join(", ")));
            }
        }
    }
    lines.join("\n")
}

fn format_get_note(result: &Value) -> String {
    let note = result.get("note").cloned().unwrap_or(Value::Null);
    let title = note.get("title").and_then(Value::as_str).unwrap_or("");
    let id = note.get("id").and_then(Value::as_str).unwrap_or("");
    let created_at = note.get("created_at").and_then(Value::as_str).unwrap_or("");
    let tags: Vec<&str> = note
        .get("tags")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let content = note.get("content").and_then(Value::as_str).unwrap_or("");

    let mut lines = vec![
        format!("Title: {title}"),
        format!("ID: {id}"),
        format!("Created: {created_at}"),
        format!("Tags: {}", tags.join(", ")),
        String::new(),
        "Content:".to_string(),
        content.to_string(),
    ];

    if let Some(urls) = note.get("source_urls").and_then(Value::as_array) {
        if !urls.is_empty() {
            lines.push("\nSources:".to_string());
            for url in urls.iter().filter_map(Value::as_str) {
                lines.push(format!("- {url}"));
            }
        }
    }
    lines.join("\n")
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect::<String>() + "..."
    }
}
