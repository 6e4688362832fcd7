//! C3 — Source Extractor & Deduper.

use serde_json::Value;
use std::collections::HashSet;

/// A `(url, title, originating-tool)` triple extracted from a tool result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub title: String,
    pub tool: String,
}

/// Extract sources from a successful tool result payload, per the
/// per-tool rules in the tool catalog. Tools with no extraction rule
/// (`save_note`, `list_notes`) yield nothing.
pub fn extract_sources(tool_name: &str, result: &Value) -> Vec<Source> {
    match tool_name {
        "web_search" => result
            .get("results")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| Source {
                        url: str_field(item, "url"),
                        title: str_field(item, "title"),
                        tool: "web_search".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        "fetch_page" => vec![Source {
            url: str_field(result, "url"),
            title: str_field(result, "title"),
            tool: "fetch_page".to_string(),
        }],
        "get_note" => result
            .get("note")
            .and_then(|note| note.get("source_urls"))
            .and_then(Value::as_array)
            .map(|urls| {
                urls.iter()
                    .filter_map(Value::as_str)
                    .map(|url| Source {
                        url: url.to_string(),
                        title: "From saved note".to_string(),
                        tool: "get_note".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn str_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Deduplicate sources by URL, keeping the first occurrence and dropping
/// entries with an empty URL.
pub fn deduplicate_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(sources.len());
    for source in sources {
        if source.url.is_empty() {
            continue;
        }
        if seen.insert(source.url.clone()) {
            unique.push(source);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_web_search_results() {
        let result = json!({"results": [
            {"url": "https://a", "title": "A"},
            {"url": "https://b", "title": "B"}
        ]});
        let sources = extract_sources("web_search", &result);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, "https://a");
        assert_eq!(sources[0].tool, "web_search");
    }

    #[test]
    fn extracts_single_fetch_page_source() {
        let result = json!({"url": "https://a", "title": "A", "content": "..."});
        let sources = extract_sources("fetch_page", &result);
        assert_eq!(sources, vec![Source { url: "https://a".into(), title: "A".into(), tool: "fetch_page".into() }]);
    }

    #[test]
    fn extracts_get_note_source_urls() {
        let result = json!({"note": {"source_urls": ["https://a", "https://b"]}});
        let sources = extract_sources("get_note", &result);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "From saved note");
    }

    #[test]
    fn save_note_and_list_notes_yield_nothing() {
        assert!(extract_sources("save_note", &json!({"note": {"id": "1"}})).is_empty());
        assert!(extract_sources("list_notes", &json!({"notes": []})).is_empty());
    }

    #[test]
    fn dedupe_preserves_first_seen_order() {
        let sources = vec![
            Source { url: "https://x".into(), title: "First".into(), tool: "web_search".into() },
            Source { url: "https://y".into(), title: "Y".into(), tool: "web_search".into() },
            Source { url: "https://x".into(), title: "Second".into(), tool: "web_search".into() },
        ];
        let deduped = deduplicate_sources(sources);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "First");
        assert_eq!(deduped[1].url, "https://y");
    }

    #[test]
    fn dedupe_drops_empty_urls() {
        let sources = vec![Source { url: "".into(), title: "No URL".into(), tool: "fetch_page".into() }];
        assert!(deduplicate_sources(sources).is_empty());
    }
}
