//! C6 — Follow-up Generator.
//!
//! Asks the LM for three follow-up questions from a compact, single-shot
//! prompt (fresh context, no conversation history). Never propagates
//! failure: any LM error or malformed reply falls back to a rule-based
//! template derived from the original query.

use crate::llm::{ChatOptions, LlmClient};
use crate::message::Message;
use crate::sources::Source;

const MAX_QUESTIONS: usize = 3;
const MIN_QUESTION_LEN: usize = 10;
const MAX_QUESTION_LEN: usize = 80;

/// Generate up to three follow-up questions for `query`/`answer`. Falls
/// back to a template on any LM failure or unusable reply — this never
/// returns an error to the caller.
pub async fn generate_follow_ups(
    llm: &dyn LlmClient,
    query: &str,
    answer: &str,
    sources: &[Source],
    model: &str,
) -> Vec<String> {
    let prompt = build_prompt(query, answer, sources);
    let messages = vec![Message::user(prompt)];

    match llm.chat(&messages, model, ChatOptions { temperature: 0.7 }).await {
        Ok(reply) => {
            let parsed = parse_questions(&reply);
            if parsed.is_empty() {
                fallback_questions(query)
            } else {
                parsed
            }
        }
        Err(_) => fallback_questions(query),
    }
}

fn build_prompt(query: &str, answer: &str, sources: &[Source]) -> String {
    let truncated_answer: String = answer.chars().take(500).collect();
    let titles: Vec<&str> = sources.iter().take(3).map(|s| s.title.as_str()).filter(|t| !t.is_empty()).collect();

    let mut prompt = format!(
        "Given this question and answer, suggest exactly 3 natural follow-up \
         questions a curious reader might ask next. One per line, no numbering.\n\n\
         Question: {query}\n\nAnswer: {truncated_answer}"
    );
    if !titles.is_empty() {
        prompt.push_str(&format!("\n\nSources consulted: {}", titles.join(", ")));
    }
    prompt
}

/// Parse an LM reply into at most [`MAX_QUESTIONS`] usable questions:
/// strip leading ordinals/bullets, keep lines ending in `?` longer than
/// [`MIN_QUESTION_LEN`] chars, truncate to [`MAX_QUESTION_LEN`].
fn parse_questions(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(strip_leading_marker)
        .filter(|line| line.ends_with('?') && line.chars().count() > MIN_QUESTION_LEN)
        .map(|line| truncate_chars(&line, MAX_QUESTION_LEN))
        .take(MAX_QUESTIONS)
        .collect()
}

fn strip_leading_marker(line: &str) -> String {
    let trimmed = line.trim();
    let without_ordinal = trimmed
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['.', ')', ':'])
        .trim_start();
    without_ordinal
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Rule-based fallback questions, derived from the query stem without an
/// LM round trip.
fn fallback_questions(query: &str) -> Vec<String> {
    let stem = query.trim().trim_end_matches(['?', '.']).to_string();
    if stem.is_empty() {
        return vec![
            "What are the key takeaways from this?".to_string(),
            "Are there any recent developments on this topic?".to_string(),
            "What are some related topics worth exploring?".to_string(),
        ];
    }
    vec![
        format!("What are the most important details about {stem}?"),
        format!("How does {stem} compare to related alternatives?"),
        format!("What are the practical implications of {stem}?"),
    ]
}
