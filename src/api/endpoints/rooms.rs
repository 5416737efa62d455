//! Room and message history views.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::chat::{MessageView, RoomView};

#[derive(Deserialize)]
pub struct RoomsQuery {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateRoomRequest {
    pub user_id: String,
    pub name: String,
}

fn required_user(user_id: Option<String>) -> Result<String, ApiError> {
    user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("user_id is required".into()))
}

/// `GET /api/rooms?user_id=`, newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<RoomsQuery>,
) -> Result<Json<Vec<RoomView>>, ApiError> {
    let user_id = required_user(query.user_id)?;
    let rooms = ctx.core.store.list_rooms(&user_id)?;
    Ok(Json(rooms.iter().map(RoomView::from).collect()))
}

/// `POST /api/rooms`: "New Chat".
pub async fn create(
    State(ctx): State<ApiContext>,
    body: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomView>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let user_id = required_user(Some(request.user_id))?;
    let room = ctx.core.store.create_room(&user_id, &request.name)?;
    Ok((StatusCode::CREATED, Json(RoomView::from(&room))))
}

/// `GET /api/rooms/:id/messages`, oldest first.
pub async fn messages(
    State(ctx): State<ApiContext>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    if ctx.core.store.get_room(&room_id)?.is_none() {
        return Err(ApiError::NotFound(format!("Room not found: {room_id}")));
    }
    let messages = ctx.core.store.list_messages(&room_id)?;
    Ok(Json(messages.iter().map(MessageView::from).collect()))
}
