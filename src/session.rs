//! Per-connection chat session.
//!
//! Created once the user is authenticated, torn down on sign-out or when
//! the connection closes. Owns the room selection and the single in-flight
//! send; dropping the session aborts that send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::chat::{ChatEvent, EventSink};
use crate::models::{Room, UserIdentity};
use crate::pipeline::{ChatError, ChatPipeline};
use crate::rooms::{RoomSelector, SelectorUpdate};

/// Clears the busy flag when the send finishes or is aborted.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The spawned send and the room it writes to.
struct InFlight {
    room_id: String,
    handle: JoinHandle<()>,
}

pub struct ChatSession {
    user: UserIdentity,
    pipeline: Arc<ChatPipeline>,
    events: EventSink,
    selector: RoomSelector,
    in_flight: Option<InFlight>,
    busy: Arc<AtomicBool>,
}

impl ChatSession {
    pub fn start(
        user: UserIdentity,
        pipeline: Arc<ChatPipeline>,
        events: EventSink,
    ) -> Result<Self, ChatError> {
        let selector = RoomSelector::new(pipeline.store().clone(), &user.user_id)?;
        tracing::info!(user_id = %user.user_id, "Chat session started");
        Ok(Self {
            user,
            pipeline,
            events,
            selector,
            in_flight: None,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn selected_room(&self) -> Option<&Room> {
        self.selector.selected()
    }

    pub fn is_sending(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// "New Chat": create a room and switch to it.
    pub fn create_room(&mut self, name: &str) -> Result<Room, ChatError> {
        let room = self
            .pipeline
            .store()
            .create_room(&self.user.user_id, name)?;
        self.select_room(&room.id)
    }

    pub fn select_room(&mut self, room_id: &str) -> Result<Room, ChatError> {
        let room = self.selector.select(room_id)?;
        self.events.emit(ChatEvent::RoomSelected {
            room_id: room.id.clone(),
            name: room.name.clone(),
        });
        Ok(room)
    }

    /// Start a send in the selected room. Returns once the send is
    /// spawned; progress arrives as events.
    pub fn send(&mut self, input: &str) -> Result<(), ChatError> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }
        let room_id = self
            .selector
            .selected_id()
            .ok_or(ChatError::NoRoomSelected)?
            .to_string();
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChatError::SendInProgress);
        }
        let guard = InFlightGuard(self.busy.clone());

        self.events.emit(ChatEvent::Sending {
            room_id: room_id.clone(),
            active: true,
        });

        let pipeline = self.pipeline.clone();
        let events = self.events.clone();
        let input = input.to_string();
        let task_room_id = room_id.clone();
        let handle = tokio::spawn(async move {
            let room_id = task_room_id;
            if let Err(e) = pipeline.send(&room_id, &input, &events).await {
                tracing::warn!(room_id = %room_id, error = %e, "Send failed");
                events.emit(ChatEvent::Error {
                    message: user_message(&e),
                });
            }
            drop(guard);
            events.emit(ChatEvent::Sending {
                room_id,
                active: false,
            });
        });
        self.in_flight = Some(InFlight { room_id, handle });
        Ok(())
    }

    /// Send a previously offered follow-up prompt.
    pub fn choose_suggestion(&mut self, suggestion: &str) -> Result<(), ChatError> {
        self.send(suggestion)
    }

    /// Abort the in-flight send, if any. A committed user turn stays.
    pub fn cancel_send(&mut self) {
        let Some(InFlight { room_id, handle }) = self.in_flight.take() else {
            return;
        };
        if handle.is_finished() {
            return;
        }
        tracing::debug!(user_id = %self.user.user_id, room_id = %room_id, "Aborting in-flight send");
        handle.abort();
        self.events.emit(ChatEvent::Sending {
            room_id,
            active: false,
        });
    }

    /// End the session: abort the send, release subscriptions, notify the
    /// client.
    pub fn sign_out(mut self) {
        self.cancel_send();
        self.selector.clear();
        self.events.emit(ChatEvent::SignedOut);
        tracing::info!(user_id = %self.user.user_id, "Signed out");
    }

    /// Wait for the next live-data change and publish it. Returns `false`
    /// once no more updates can arrive.
    pub async fn next_update(&mut self) -> Result<bool, ChatError> {
        match self.selector.next_update().await? {
            None => Ok(false),
            Some(SelectorUpdate::Rooms {
                rooms,
                auto_selected,
            }) => {
                self.events.emit(ChatEvent::rooms(&rooms));
                if let Some(room) = auto_selected {
                    self.events.emit(ChatEvent::RoomSelected {
                        room_id: room.id,
                        name: room.name,
                    });
                }
                Ok(true)
            }
            Some(SelectorUpdate::Messages { room_id, messages }) => {
                self.events.emit(ChatEvent::messages(&room_id, &messages));
                Ok(true)
            }
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel_send();
    }
}

/// Text shown to the user for a failed action.
pub fn user_message(err: &ChatError) -> String {
    match err {
        ChatError::Upstream(_) => {
            "The assistant could not answer right now. Please try again.".to_string()
        }
        ChatError::Store(_) => "Your message could not be saved.".to_string(),
        other => other.to_string(),
    }
}
