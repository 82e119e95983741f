//! Extractive answer composition.
//!
//! The answer is built only from verbatim retrieved text: sentences of the
//! ranked chunks that mention any question token, kept in their original
//! order.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::QueryResult;

/// Returned when retrieval produced no chunks.
pub const NO_CONTEXT: &str = "(no context)";

/// Maximum number of sentences kept in a composed answer.
pub const MAX_SENTENCES: usize = 6;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9]+").unwrap());

static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Lowercase alphanumeric tokens of `question`. Any non-alphanumeric run
/// is a delimiter.
pub fn tokenize_question(question: &str) -> Vec<String> {
    TOKEN
        .find_iter(question)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

/// Split text after `.`, `!` or `?` when followed by whitespace. The
/// whitespace run between sentences is dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Compose an extractive answer for `question` from ranked `results`.
pub fn compose_extractive_answer(question: &str, results: &[QueryResult]) -> String {
    let Some(top) = results.first() else {
        return NO_CONTEXT.to_string();
    };

    let tokens = tokenize_question(question);
    let joined = results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut keep: Vec<&str> = Vec::new();
    for sentence in split_sentences(&joined) {
        let lowered = sentence.to_lowercase();
        if tokens.iter().any(|t| lowered.contains(t.as_str())) {
            keep.push(sentence);
            if keep.len() >= MAX_SENTENCES {
                break;
            }
        }
    }

    if keep.is_empty() {
        top.chunk.text.trim().to_string()
    } else {
        keep.join("\n").trim().to_string()
    }
}
