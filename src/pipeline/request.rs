//! Completion request builder: bounded room history + new input.

use crate::completion::{ChatMessage, ChatRole};
use crate::models::Message;

/// Prior turns carried into each request.
pub const HISTORY_TURNS: usize = 5;

/// Wrap the user's input with the answer-formatting instruction.
pub fn format_user_prompt(input: &str) -> String {
    format!(
        "Answer the following text in Markdown. Do not label the reply as an answer \
         and do not repeat the text back.\nText: \"\"\"{input}\"\"\""
    )
}

/// Build the ordered message list for the completion endpoint.
///
/// `history` is the room's messages before this send, oldest first; only
/// the last `HISTORY_TURNS` are kept.
pub fn build_messages(history: &[Message], input: &str) -> Vec<ChatMessage> {
    let start = history.len().saturating_sub(HISTORY_TURNS);
    let mut messages: Vec<ChatMessage> = history[start..]
        .iter()
        .map(|m| ChatMessage::new(ChatRole::from(m.role), m.content.clone()))
        .collect();
    messages.push(ChatMessage::user(format_user_prompt(input)));
    messages
}
