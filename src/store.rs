//! Room/message store with live snapshot subscriptions.
//!
//! Every write publishes a fresh, fully ordered snapshot to the subscribers
//! of the affected topic:
//! - `rooms` of a user, newest first
//! - `messages` of a room, oldest first
//!
//! A `Subscription` delivers the current snapshot immediately, then one
//! snapshot per change. Dropping it unsubscribes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::db::{self, DatabaseError, NewMessage};
use crate::models::enums::MessageRole;
use crate::models::{Message, Room};

/// Maximum room name length (characters).
const MAX_ROOM_NAME_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Room not found: {0}")]
    RoomNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Internal lock error")]
    LockPoisoned,
}

// ═══════════════════════════════════════════════════════════
// Subscriptions
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Topic {
    Rooms(String),
    Messages(String),
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    rooms: HashMap<String, Vec<(u64, mpsc::UnboundedSender<Vec<Room>>)>>,
    messages: HashMap<String, Vec<(u64, mpsc::UnboundedSender<Vec<Message>>)>>,
}

impl Registry {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, topic: &Topic, id: u64) {
        match topic {
            Topic::Rooms(user_id) => remove_subscriber(&mut self.rooms, user_id, id),
            Topic::Messages(room_id) => remove_subscriber(&mut self.messages, room_id, id),
        }
    }

    fn subscriber_count(&self, topic: &Topic) -> usize {
        match topic {
            Topic::Rooms(user_id) => self.rooms.get(user_id).map_or(0, Vec::len),
            Topic::Messages(room_id) => self.messages.get(room_id).map_or(0, Vec::len),
        }
    }
}

fn remove_subscriber<T>(
    map: &mut HashMap<String, Vec<(u64, mpsc::UnboundedSender<T>)>>,
    key: &str,
    id: u64,
) {
    if let Some(list) = map.get_mut(key) {
        list.retain(|(sub_id, _)| *sub_id != id);
        if list.is_empty() {
            map.remove(key);
        }
    }
}

fn publish<T: Clone>(
    map: &mut HashMap<String, Vec<(u64, mpsc::UnboundedSender<Vec<T>>)>>,
    key: &str,
    snapshot: Vec<T>,
) {
    if let Some(list) = map.get_mut(key) {
        list.retain(|(_, tx)| tx.send(snapshot.clone()).is_ok());
        if list.is_empty() {
            map.remove(key);
        }
    }
}

/// Live feed of ordered snapshots for one topic.
pub struct Subscription<T> {
    id: u64,
    topic: Topic,
    rx: mpsc::UnboundedReceiver<Vec<T>>,
    registry: Weak<Mutex<Registry>>,
}

impl<T> Subscription<T> {
    /// Wait for the next snapshot. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        self.rx.recv().await
    }

    /// Take a pending snapshot without waiting.
    pub fn try_next(&mut self) -> Option<Vec<T>> {
        self.rx.try_recv().ok()
    }

    /// Drain pending snapshots, keeping only the latest.
    pub fn latest(&mut self) -> Option<Vec<T>> {
        let mut last = None;
        while let Ok(snapshot) = self.rx.try_recv() {
            last = Some(snapshot);
        }
        last
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.lock() {
                registry.remove(&self.topic, self.id);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// RoomStore
// ═══════════════════════════════════════════════════════════

struct Inner {
    conn: Connection,
    /// Last timestamp handed out; keeps server time monotonic.
    last_timestamp: Option<DateTime<Utc>>,
}

/// Persistent room/message store shared by the HTTP layer and chat sessions.
pub struct RoomStore {
    inner: Mutex<Inner>,
    registry: Arc<Mutex<Registry>>,
}

impl RoomStore {
    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Mutex::new(Inner {
                conn,
                last_timestamp: None,
            }),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = db::open_database(path)?;
        tracing::info!(path = %path.display(), "Room store opened");
        Ok(Self::from_connection(conn))
    }

    /// In-memory store (tests, ephemeral runs).
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(db::open_memory_database()?))
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn lock_registry(&self) -> Result<MutexGuard<'_, Registry>, StoreError> {
        self.registry.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ── Rooms ───────────────────────────────────────────────

    /// Create a named room for `user_id` ("New Chat").
    pub fn create_room(&self, user_id: &str, name: &str) -> Result<Room, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::InvalidInput("Room name cannot be empty".into()));
        }
        if name.chars().count() > MAX_ROOM_NAME_CHARS {
            return Err(StoreError::InvalidInput(format!(
                "Room name too long (max {MAX_ROOM_NAME_CHARS} chars)"
            )));
        }
        if user_id.trim().is_empty() {
            return Err(StoreError::InvalidInput("User id cannot be empty".into()));
        }

        let mut inner = self.lock_inner()?;
        let room = Room {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            user_id: user_id.to_string(),
            created_at: inner.next_timestamp(),
        };
        db::insert_room(&inner.conn, &room)?;
        let snapshot = db::get_rooms_by_user(&inner.conn, user_id)?;

        // Publish under `inner` so snapshots reach subscribers in write order.
        publish(&mut self.lock_registry()?.rooms, user_id, snapshot);
        drop(inner);

        tracing::debug!(room_id = %room.id, "Room created");
        Ok(room)
    }

    pub fn get_room(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        let inner = self.lock_inner()?;
        Ok(db::get_room(&inner.conn, room_id)?)
    }

    /// Rooms of a user, newest first.
    pub fn list_rooms(&self, user_id: &str) -> Result<Vec<Room>, StoreError> {
        let inner = self.lock_inner()?;
        Ok(db::get_rooms_by_user(&inner.conn, user_id)?)
    }

    // ── Messages ────────────────────────────────────────────

    /// Append one message with a server-assigned timestamp.
    pub fn append_message(
        &self,
        room_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, StoreError> {
        let mut inner = self.lock_inner()?;
        if db::get_room(&inner.conn, room_id)?.is_none() {
            return Err(StoreError::RoomNotFound(room_id.to_string()));
        }
        let id = Uuid::new_v4().to_string();
        let created_at = inner.next_timestamp();
        let message = db::insert_message(
            &inner.conn,
            &NewMessage {
                id: &id,
                room_id,
                role,
                content,
                created_at,
            },
        )?;
        let snapshot = db::get_messages_by_room(&inner.conn, room_id)?;
        publish(&mut self.lock_registry()?.messages, room_id, snapshot);
        drop(inner);

        tracing::debug!(
            room_id,
            role = %role,
            chars = content.chars().count(),
            "Message appended"
        );
        Ok(message)
    }

    /// All messages of a room, oldest first.
    pub fn list_messages(&self, room_id: &str) -> Result<Vec<Message>, StoreError> {
        let inner = self.lock_inner()?;
        Ok(db::get_messages_by_room(&inner.conn, room_id)?)
    }

    /// The latest `limit` messages of a room, oldest first.
    pub fn recent_messages(&self, room_id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        let inner = self.lock_inner()?;
        Ok(db::get_recent_messages(&inner.conn, room_id, limit)?)
    }

    pub fn count_messages(
        &self,
        room_id: &str,
        role: Option<MessageRole>,
    ) -> Result<i64, StoreError> {
        let inner = self.lock_inner()?;
        Ok(db::count_messages(&inner.conn, room_id, role)?)
    }

    // ── Subscriptions ───────────────────────────────────────

    /// Live rooms of a user, newest first.
    pub fn subscribe_rooms(&self, user_id: &str) -> Result<Subscription<Room>, StoreError> {
        // Same lock order as writers: inner, then registry.
        let inner = self.lock_inner()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(db::get_rooms_by_user(&inner.conn, user_id)?);
        let mut registry = self.lock_registry()?;

        let id = registry.allocate_id();
        registry
            .rooms
            .entry(user_id.to_string())
            .or_default()
            .push((id, tx));

        Ok(Subscription {
            id,
            topic: Topic::Rooms(user_id.to_string()),
            rx,
            registry: Arc::downgrade(&self.registry),
        })
    }

    /// Live messages of a room, oldest first.
    pub fn subscribe_messages(&self, room_id: &str) -> Result<Subscription<Message>, StoreError> {
        let inner = self.lock_inner()?;
        if db::get_room(&inner.conn, room_id)?.is_none() {
            return Err(StoreError::RoomNotFound(room_id.to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(db::get_messages_by_room(&inner.conn, room_id)?);
        let mut registry = self.lock_registry()?;

        let id = registry.allocate_id();
        registry
            .messages
            .entry(room_id.to_string())
            .or_default()
            .push((id, tx));

        Ok(Subscription {
            id,
            topic: Topic::Messages(room_id.to_string()),
            rx,
            registry: Arc::downgrade(&self.registry),
        })
    }

    /// Number of live message subscriptions on a room.
    pub fn message_subscriber_count(&self, room_id: &str) -> usize {
        self.registry
            .lock()
            .map(|r| r.subscriber_count(&Topic::Messages(room_id.to_string())))
            .unwrap_or(0)
    }

    /// Number of live room-list subscriptions for a user.
    pub fn room_subscriber_count(&self, user_id: &str) -> usize {
        self.registry
            .lock()
            .map(|r| r.subscriber_count(&Topic::Rooms(user_id.to_string())))
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn poison_registry(&self) {
        let registry = self.registry.clone();
        let _ = std::thread::spawn(move || {
            let _guard = registry.lock().unwrap();
            panic!("registry poisoned");
        })
        .join();
    }
}

impl Inner {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}
