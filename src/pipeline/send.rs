use std::sync::Arc;

use super::committer::TurnCommitter;
use super::request::{build_messages, HISTORY_TURNS};
use super::source::{Completer, ResponseSource};
use super::stream::{consume_stream, StreamState, TextStream};
use super::suggestions::SuggestionGenerator;
use super::ChatError;
use crate::chat::{ChatEvent, EventSink};
use crate::models::Message;
use crate::store::RoomStore;

/// Persisted result of a completed send.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub user: Message,
    pub assistant: Message,
    pub suggestions: Vec<String>,
}

/// Stateless driver for sends; shared by every session.
pub struct ChatPipeline {
    store: Arc<RoomStore>,
    source: Arc<dyn ResponseSource>,
    suggestions: SuggestionGenerator,
}

impl ChatPipeline {
    pub fn new(
        store: Arc<RoomStore>,
        source: Arc<dyn ResponseSource>,
        completer: Arc<dyn Completer>,
    ) -> Self {
        Self {
            store,
            source,
            suggestions: SuggestionGenerator::new(completer),
        }
    }

    pub fn store(&self) -> &Arc<RoomStore> {
        &self.store
    }

    /// Run one send against `room_id`, publishing progress to `events`.
    ///
    /// The user turn is committed before the request goes out and stays
    /// committed if anything after it fails.
    pub async fn send(
        &self,
        room_id: &str,
        input: &str,
        events: &EventSink,
    ) -> Result<TurnOutcome, ChatError> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let history = self.store.recent_messages(room_id, HISTORY_TURNS)?;
        let committer = TurnCommitter::new(self.store.clone(), room_id);
        let user = committer.commit_user(input)?;

        let messages = build_messages(&history, input);
        tracing::debug!(
            room_id,
            history = history.len(),
            input_chars = input.len(),
            "Dispatching completion request"
        );

        let body = self.source.open(messages).await?;

        let mut state = StreamState::new();
        let text = consume_stream(TextStream::new(body), &mut state, |s| {
            events.emit(ChatEvent::Partial {
                room_id: room_id.to_string(),
                text: s.text.clone(),
                done: s.done,
            });
        })
        .await?;

        let assistant = committer.commit_assistant(&text)?;
        state.clear();
        events.emit(ChatEvent::Committed {
            room_id: room_id.to_string(),
            message_id: assistant.id.clone(),
        });
        tracing::info!(room_id, answer_chars = text.len(), "Assistant turn committed");

        let suggestions = self.suggestions.generate(&text).await;
        events.emit(ChatEvent::Suggestions {
            room_id: room_id.to_string(),
            suggestions: suggestions.clone(),
        });

        Ok(TurnOutcome {
            user,
            assistant,
            suggestions,
        })
    }
}
