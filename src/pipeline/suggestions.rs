//! Follow-up suggestions derived from the latest assistant answer.
//!
//! One non-streaming request per committed turn. The model is asked for a
//! JSON object `{"questions": [...]}`; anything else means "no suggestions".
//! Failures here never fail the turn.

use std::sync::Arc;

use serde::Deserialize;

use super::source::Completer;
use crate::completion::{ChatMessage, ChatRole};

/// Number of follow-up prompts requested and shown.
pub const SUGGESTION_COUNT: usize = 3;

#[derive(Deserialize)]
struct SuggestionPayload {
    questions: Vec<String>,
}

/// Messages asking the model for follow-up prompts about `answer`.
pub fn suggestion_prompt(answer: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new(
            ChatRole::System,
            format!(
                "You suggest follow-up questions. Reply with JSON only, exactly in the form \
                 {{\"questions\": [\"...\", \"...\", \"...\"]}} containing {SUGGESTION_COUNT} \
                 short questions a reader might ask next."
            ),
        ),
        ChatMessage::user(answer.to_string()),
    ]
}

/// Parse the model's reply. `None` when the payload is not usable.
///
/// Accepts the JSON object bare or inside a Markdown code fence. Entries
/// pass through as written; empty strings are dropped and at most
/// `SUGGESTION_COUNT` are kept.
pub fn parse_suggestions(raw: &str) -> Option<Vec<String>> {
    let body = strip_code_fence(raw.trim());
    let payload: SuggestionPayload = serde_json::from_str(body).ok()?;

    let questions: Vec<String> = payload
        .questions
        .into_iter()
        .filter(|q| !q.is_empty())
        .take(SUGGESTION_COUNT)
        .collect();

    if questions.is_empty() {
        None
    } else {
        Some(questions)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Issues the suggestion request and swallows its failures.
#[derive(Clone)]
pub struct SuggestionGenerator {
    completer: Arc<dyn Completer>,
}

impl SuggestionGenerator {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    /// Follow-up prompts for `answer`; empty on any failure.
    pub async fn generate(&self, answer: &str) -> Vec<String> {
        if answer.trim().is_empty() {
            return Vec::new();
        }
        let raw = match self.completer.complete(suggestion_prompt(answer)).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "Suggestion request failed; hiding suggestions");
                return Vec::new();
            }
        };
        match parse_suggestions(&raw) {
            Some(questions) => questions,
            None => {
                tracing::debug!(chars = raw.len(), "Unparseable suggestion payload; hiding suggestions");
                Vec::new()
            }
        }
    }
}
