//! Chat UI protocol: events published to the browser and the views they
//! carry.
//!
//! Events flow one way (server → client) through an `EventSink`. A closed
//! sink means the client went away; emitting to it is a no-op.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::{Message, Room};

// ═══════════════════════════════════════════
// Frontend-facing types
// ═══════════════════════════════════════════

/// Room entry for the sidebar list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        RoomView {
            id: room.id.clone(),
            name: room.name.clone(),
            created_at: room.created_at.to_rfc3339(),
        }
    }
}

/// Persisted message as rendered in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: String,
}

impl From<&Message> for MessageView {
    fn from(m: &Message) -> Self {
        MessageView {
            id: m.id.clone(),
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
            created_at: m.created_at.to_rfc3339(),
        }
    }
}

/// Everything the server pushes to a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Live room list, newest first.
    Rooms { rooms: Vec<RoomView> },
    /// The session switched rooms (explicitly or by auto-selection).
    RoomSelected { room_id: String, name: String },
    /// Live transcript of the selected room, oldest first.
    Messages {
        room_id: String,
        messages: Vec<MessageView>,
    },
    /// A send started (`active: true`) or finished.
    Sending { room_id: String, active: bool },
    /// Accumulated, not yet committed assistant text.
    Partial {
        room_id: String,
        text: String,
        done: bool,
    },
    /// Streaming buffer cleared after the assistant turn was stored.
    Committed { room_id: String, message_id: String },
    /// Follow-up prompts; empty hides the suggestion UI.
    Suggestions {
        room_id: String,
        suggestions: Vec<String>,
    },
    Error { message: String },
    SignedOut,
}

impl ChatEvent {
    pub fn rooms(rooms: &[Room]) -> Self {
        ChatEvent::Rooms {
            rooms: rooms.iter().map(RoomView::from).collect(),
        }
    }

    pub fn messages(room_id: &str, messages: &[Message]) -> Self {
        ChatEvent::Messages {
            room_id: room_id.to_string(),
            messages: messages.iter().map(MessageView::from).collect(),
        }
    }
}

/// Outgoing half of a client's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ChatEvent>,
}

impl EventSink {
    /// New sink plus the receiver the transport drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: ChatEvent) {
        let _ = self.tx.send(event);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
