use std::str::FromStr;

use rusqlite::{params, Connection};

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::MessageRole;
use crate::models::Message;

/// Fields of a message before the store assigns its sequence number.
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub room_id: &'a str,
    pub role: MessageRole,
    pub content: &'a str,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Insert a message and return the stored row (with its sequence number).
pub fn insert_message(conn: &Connection, msg: &NewMessage<'_>) -> Result<Message, DatabaseError> {
    conn.execute(
        "INSERT INTO messages (id, room_id, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            msg.id,
            msg.room_id,
            msg.role.as_str(),
            msg.content,
            format_timestamp(&msg.created_at),
        ],
    )?;
    Ok(Message {
        seq: conn.last_insert_rowid(),
        id: msg.id.to_string(),
        room_id: msg.room_id.to_string(),
        role: msg.role,
        content: msg.content.to_string(),
        created_at: msg.created_at,
    })
}

/// All messages in a room, oldest first.
pub fn get_messages_by_room(conn: &Connection, room_id: &str) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, id, room_id, role, content, created_at
         FROM messages WHERE room_id = ?1
         ORDER BY created_at ASC, seq ASC",
    )?;
    let messages = collect_messages(stmt.query_map(params![room_id], read_row)?)?;
    Ok(messages)
}

/// The most recent `limit` messages in a room, returned oldest first.
pub fn get_recent_messages(
    conn: &Connection,
    room_id: &str,
    limit: usize,
) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, id, room_id, role, content, created_at
         FROM messages WHERE room_id = ?1
         ORDER BY created_at DESC, seq DESC
         LIMIT ?2",
    )?;
    let mut messages = collect_messages(stmt.query_map(params![room_id, limit as i64], read_row)?)?;
    messages.reverse();
    Ok(messages)
}

/// Count messages in a room, optionally restricted to one role.
pub fn count_messages(
    conn: &Connection,
    room_id: &str,
    role: Option<MessageRole>,
) -> Result<i64, DatabaseError> {
    let count = match role {
        Some(role) => conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE room_id = ?1 AND role = ?2",
            params![room_id, role.as_str()],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE room_id = ?1",
            params![room_id],
            |row| row.get(0),
        )?,
    };
    Ok(count)
}

struct MessageRow {
    seq: i64,
    id: String,
    room_id: String,
    role: String,
    content: String,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        seq: row.get(0)?,
        id: row.get(1)?,
        room_id: row.get(2)?,
        role: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn collect_messages(
    rows: impl Iterator<Item = rusqlite::Result<MessageRow>>,
) -> Result<Vec<Message>, DatabaseError> {
    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row?)?);
    }
    Ok(messages)
}

fn message_from_row(row: MessageRow) -> Result<Message, DatabaseError> {
    Ok(Message {
        seq: row.seq,
        id: row.id,
        room_id: row.room_id,
        role: MessageRole::from_str(&row.role)?,
        content: row.content,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_room;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Room;
    use chrono::{Duration, TimeZone, Utc};

    fn base() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> Connection {
        let conn = open_memory_database().unwrap();
        insert_room(
            &conn,
            &Room {
                id: "r1".into(),
                name: "General".into(),
                user_id: "alice".into(),
                created_at: base(),
            },
        )
        .unwrap();
        conn
    }

    fn add(conn: &Connection, id: &str, role: MessageRole, secs: i64) -> Message {
        insert_message(
            conn,
            &NewMessage {
                id,
                room_id: "r1",
                role,
                content: id,
                created_at: base() + Duration::seconds(secs),
            },
        )
        .unwrap()
    }

    #[test]
    fn messages_come_back_in_creation_order() {
        let conn = setup();
        add(&conn, "second", MessageRole::Assistant, 2);
        add(&conn, "first", MessageRole::User, 1);
        add(&conn, "third", MessageRole::User, 3);

        let ids: Vec<String> = get_messages_by_room(&conn, "r1")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn equal_timestamps_fall_back_to_sequence() {
        let conn = setup();
        add(&conn, "a", MessageRole::User, 5);
        add(&conn, "b", MessageRole::Assistant, 5);
        let ids: Vec<String> = get_messages_by_room(&conn, "r1")
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn recent_messages_are_bounded_and_ascending() {
        let conn = setup();
        for i in 0..8 {
            add(&conn, &format!("m{i}"), MessageRole::User, i);
        }
        let ids: Vec<String> = get_recent_messages(&conn, "r1", 3)
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m5", "m6", "m7"]);
    }

    #[test]
    fn message_requires_existing_room() {
        let conn = setup();
        let result = insert_message(
            &conn,
            &NewMessage {
                id: "x",
                room_id: "missing",
                role: MessageRole::User,
                content: "hi",
                created_at: base(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn count_by_role() {
        let conn = setup();
        add(&conn, "u1", MessageRole::User, 1);
        add(&conn, "a1", MessageRole::Assistant, 2);
        add(&conn, "u2", MessageRole::User, 3);
        assert_eq!(count_messages(&conn, "r1", None).unwrap(), 3);
        assert_eq!(count_messages(&conn, "r1", Some(MessageRole::User)).unwrap(), 2);
        assert_eq!(count_messages(&conn, "r1", Some(MessageRole::Assistant)).unwrap(), 1);
    }

    #[test]
    fn inserted_message_carries_sequence() {
        let conn = setup();
        let a = add(&conn, "a", MessageRole::User, 1);
        let b = add(&conn, "b", MessageRole::User, 2);
        assert!(b.seq > a.seq);
    }
}
