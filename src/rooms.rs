//! Room selector: live room list of one user plus the live transcript of
//! the selected room.
//!
//! At most one message subscription is held. Switching rooms opens the new
//! subscription and drops the old one before any snapshot of the new room
//! is read, so nothing from the previous room is delivered afterwards. A
//! failed switch keeps the current room.

use std::sync::Arc;

use crate::models::{Message, Room};
use crate::store::{RoomStore, StoreError, Subscription};

/// Change observed by the selector.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorUpdate {
    /// New room list, newest first. `auto_selected` is set when this
    /// snapshot caused the newest room to be selected.
    Rooms {
        rooms: Vec<Room>,
        auto_selected: Option<Room>,
    },
    /// New transcript of the selected room, oldest first.
    Messages {
        room_id: String,
        messages: Vec<Message>,
    },
}

struct SelectedRoom {
    room: Room,
    messages: Subscription<Message>,
}

pub struct RoomSelector {
    store: Arc<RoomStore>,
    user_id: String,
    rooms: Subscription<Room>,
    selected: Option<SelectedRoom>,
}

enum Wake {
    Rooms(Option<Vec<Room>>),
    Messages(Option<Vec<Message>>),
}

impl RoomSelector {
    pub fn new(store: Arc<RoomStore>, user_id: &str) -> Result<Self, StoreError> {
        let rooms = store.subscribe_rooms(user_id)?;
        Ok(Self {
            store,
            user_id: user_id.to_string(),
            rooms,
            selected: None,
        })
    }

    pub fn selected(&self) -> Option<&Room> {
        self.selected.as_ref().map(|s| &s.room)
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected().map(|r| r.id.as_str())
    }

    /// Switch to `room_id`. Only rooms owned by the selector's user can be
    /// selected.
    pub fn select(&mut self, room_id: &str) -> Result<Room, StoreError> {
        let room = self
            .store
            .get_room(room_id)?
            .filter(|r| r.user_id == self.user_id)
            .ok_or_else(|| StoreError::RoomNotFound(room_id.to_string()))?;

        if self.selected_id() == Some(room.id.as_str()) {
            return Ok(room);
        }

        // Swapping drops the previous feed before any new snapshot is read.
        let messages = self.store.subscribe_messages(&room.id)?;
        tracing::debug!(room_id = %room.id, "Room selected");
        self.selected = Some(SelectedRoom {
            room: room.clone(),
            messages,
        });
        Ok(room)
    }

    /// Drop the selection and its subscription.
    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Wait for the next change. `None` once the store has gone away.
    pub async fn next_update(&mut self) -> Result<Option<SelectorUpdate>, StoreError> {
        let wake = {
            let Self {
                rooms, selected, ..
            } = self;
            tokio::select! {
                snapshot = rooms.next() => Wake::Rooms(snapshot),
                snapshot = next_messages(selected) => Wake::Messages(snapshot),
            }
        };

        match wake {
            Wake::Rooms(None) | Wake::Messages(None) => Ok(None),
            Wake::Rooms(Some(rooms)) => {
                let auto_selected = match (self.selected.is_none(), rooms.first()) {
                    (true, Some(newest)) => Some(self.select(&newest.id)?),
                    _ => None,
                };
                Ok(Some(SelectorUpdate::Rooms {
                    rooms,
                    auto_selected,
                }))
            }
            Wake::Messages(Some(messages)) => {
                let room_id = self
                    .selected_id()
                    .map(str::to_string)
                    .unwrap_or_default();
                Ok(Some(SelectorUpdate::Messages { room_id, messages }))
            }
        }
    }
}

async fn next_messages(selected: &mut Option<SelectedRoom>) -> Option<Vec<Message>> {
    match selected {
        Some(selected) => selected.messages.next().await,
        None => std::future::pending().await,
    }
}
