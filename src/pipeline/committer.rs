//! Turn committer: user turn before dispatch, assistant turn after the
//! stream completes.
//!
//! `commit_assistant` consumes the committer, so a send can append at most
//! one assistant message.

use std::sync::Arc;

use crate::models::enums::MessageRole;
use crate::models::Message;
use crate::store::{RoomStore, StoreError};

pub struct TurnCommitter {
    store: Arc<RoomStore>,
    room_id: String,
}

impl TurnCommitter {
    pub fn new(store: Arc<RoomStore>, room_id: impl Into<String>) -> Self {
        Self {
            store,
            room_id: room_id.into(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn commit_user(&self, text: &str) -> Result<Message, StoreError> {
        self.store
            .append_message(&self.room_id, MessageRole::User, text)
    }

    pub fn commit_assistant(self, text: &str) -> Result<Message, StoreError> {
        self.store
            .append_message(&self.room_id, MessageRole::Assistant, text)
    }
}
