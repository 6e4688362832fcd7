//! C4 — Citation Processor.
//!
//! Extracts, validates, renumbers, and formats `[n]` citation markers
//! against a deduplicated source list.

use crate::sources::Source;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

fn citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("static citation regex is valid"))
}

fn source_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\*\*Sources?:?\*\*").expect("static source-block regex is valid")
    })
}

/// A resolved citation: an inline `[n]` marker bound to a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub number: usize,
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Report, for each `[n]` marker found in `content`, whether it resolves to
/// a source in range `1..=source_count`.
pub fn validate_citations(content: &str, source_count: usize) -> Vec<String> {
    let mut errors = Vec::new();
    let numbers: BTreeSet<usize> = citation_re()
        .captures_iter(content)
        .filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok())
        .collect();

    for num in numbers {
        if num < 1 {
            errors.push(format!("Invalid citation number: [{num}]"));
        } else if num > source_count {
            errors.push(format!(
                "Citation [{num}] has no corresponding source (only {source_count} sources available)"
            ));
        }
    }
    errors
}

/// Renumber citation markers to be sequential starting at 1, in order of
/// first (ascending) appearance by value. Idempotent:
/// `renumber(renumber(x)) == renumber(x)`.
pub fn renumber_citations(content: &str) -> (String, HashMap<usize, usize>) {
    let numbers: BTreeSet<usize> = citation_re()
        .captures_iter(content)
        .filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok())
        .collect();

    if numbers.is_empty() {
        return (content.to_string(), HashMap::new());
    }

    let mapping: HashMap<usize, usize> = numbers
        .into_iter()
        .enumerate()
        .map(|(idx, old)| (old, idx + 1))
        .collect();

    let renumbered = citation_re()
        .replace_all(content, |caps: &regex::Captures| {
            let old: usize = caps[1].parse().unwrap_or(0);
            format!("[{}]", mapping.get(&old).copied().unwrap_or(old))
        })
        .to_string();

    (renumbered, mapping)
}

/// Append a `**Sources:**` block (`[i] [title](url)` lines) iff `content`
/// doesn't already have one. Idempotent on a second call with the same
/// `sources`.
pub fn add_sources(content: &str, sources: &[Source]) -> String {
    if source_block_re().is_match(content) {
        return content.to_string();
    }
    if sources.is_empty() {
        return content.to_string();
    }

    let mut lines = vec![String::new(), "**Sources:**".to_string()];
    for (i, source) in sources.iter().enumerate() {
        let number = i + 1;
        if !source.url.is_empty() {
            let title = if source.title.is_empty() {
                source.url.clone()
            } else {
                source.title.clone()
            };
            lines.push(format!("[{number}] [{title}]({})", source.url));
        } else {
            lines.push(format!("[{number}] {}", source.title));
        }
    }

    format!("{}\n{}", content.trim_end(), lines.join("\n"))
}

/// Build the resolved citation list for a response: sources referenced by a
/// marker in `content`, or — when no markers are present — every source
/// (matching the original's "no markers yet, so offer them all" behavior).
pub fn extract_citations(content: &str, sources: &[Source]) -> Vec<Citation> {
    let numbers: BTreeSet<usize> = citation_re()
        .captures_iter(content)
        .filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok())
        .collect();

    sources
        .iter()
        .enumerate()
        .filter_map(|(idx, source)| {
            let number = idx + 1;
            if numbers.is_empty() || numbers.contains(&number) {
                Some(Citation {
                    number,
                    url: source.url.clone(),
                    title: source.title.clone(),
                    snippet: String::new(),
                })
            } else {
                None
            }
        })
        .collect()
}

/// A brief "N sources: domain, domain, ..." summary for display, truncated
/// at `max_sources` with a "+K more" suffix.
pub fn create_citation_summary(citations: &[Citation], max_sources: usize) -> String {
    if citations.is_empty() {
        return "No sources".to_string();
    }

    let domains: Vec<String> = citations
        .iter()
        .take(max_sources)
        .filter(|c| !c.url.is_empty())
        .map(|c| extract_domain(&c.url))
        .collect();

    if citations.len() <= max_sources {
        format!("{} sources: {}", citations.len(), domains.join(", "))
    } else {
        format!(
            "{} sources: {} (+{} more)",
            citations.len(),
            domains.join(", "),
            citations.len() - max_sources
        )
    }
}

fn extract_domain(url: &str) -> String {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let host = without_scheme.split(['/', '?', '#']).next().unwrap_or(url);
    host.strip_prefix("www.").unwrap_or(host).to_string()
}
