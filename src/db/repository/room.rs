use rusqlite::{params, Connection};

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::Room;

pub fn insert_room(conn: &Connection, room: &Room) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO rooms (id, name, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            room.id,
            room.name,
            room.user_id,
            format_timestamp(&room.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_room(conn: &Connection, id: &str) -> Result<Option<Room>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, name, user_id, created_at FROM rooms WHERE id = ?1",
        params![id],
        |row| {
            Ok(RoomRow {
                id: row.get(0)?,
                name: row.get(1)?,
                user_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    );

    match result {
        Ok(row) => Ok(Some(room_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Rooms owned by `user_id`, newest first.
pub fn get_rooms_by_user(conn: &Connection, user_id: &str) -> Result<Vec<Room>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, user_id, created_at FROM rooms
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC",
    )?;

    let rows = stmt.query_map(params![user_id], |row| {
        Ok(RoomRow {
            id: row.get(0)?,
            name: row.get(1)?,
            user_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;

    let mut rooms = Vec::new();
    for row in rows {
        rooms.push(room_from_row(row?)?);
    }
    Ok(rooms)
}

struct RoomRow {
    id: String,
    name: String,
    user_id: String,
    created_at: String,
}

fn room_from_row(row: RoomRow) -> Result<Room, DatabaseError> {
    Ok(Room {
        id: row.id,
        name: row.name,
        user_id: row.user_id,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
