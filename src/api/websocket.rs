//! Chat WebSocket: one `ChatSession` per connection.
//!
//! Connection lifecycle:
//! 1. Client opens `GET /ws/chat?user_id=...&email=...` with the identity
//!    issued by the external provider
//! 2. Server starts a session and pushes the live room list
//! 3. Client commands (`create_room`, `select_room`, `send`,
//!    `choose_suggestion`, `sign_out`) arrive as JSON text frames
//! 4. Close or sign-out tears the session down and aborts any in-flight send

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::chat::{ChatEvent, EventSink};
use crate::models::UserIdentity;
use crate::pipeline::{ChatError, ChatPipeline};
use crate::session::{user_message, ChatSession};

/// Query parameters for WebSocket upgrade.
#[derive(Deserialize)]
pub struct ChatConnectQuery {
    user_id: Option<String>,
    email: Option<String>,
}

/// Commands sent by the browser.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    CreateRoom { name: String },
    SelectRoom { room_id: String },
    Send { text: String },
    ChooseSuggestion { text: String },
    SignOut,
}

/// WebSocket upgrade handler. A user identity is required.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<ApiContext>,
    Query(query): Query<ChatConnectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = query
        .user_id
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or(ApiError::Unauthorized)?;
    let user = UserIdentity::new(user_id, query.email.filter(|e| !e.trim().is_empty()));

    tracing::info!(user_id = %user.user_id, "Chat WebSocket upgrade accepted");
    let pipeline = ctx.core.pipeline.clone();
    Ok(ws.on_upgrade(move |socket| handle_chat(socket, pipeline, user)))
}

enum Step {
    Incoming(Option<Result<Message, axum::Error>>),
    Update(Result<bool, ChatError>),
}

/// Main connection handler.
///
/// Spawns a sender task for event→WS forwarding, then runs the receive +
/// live-update loop until disconnect or sign-out.
async fn handle_chat(socket: WebSocket, pipeline: Arc<ChatPipeline>, user: UserIdentity) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (events, rx) = EventSink::channel();

    let sender_handle = tokio::spawn(async move {
        let mut sink = ws_sink;
        let mut rx = rx;
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(_) => continue,
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
            if event == ChatEvent::SignedOut {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let user_id = user.user_id.clone();
    let mut session = match ChatSession::start(user, pipeline, events.clone()) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(user_id = %user_id, error = %e, "Cannot start chat session");
            events.emit(ChatEvent::Error {
                message: user_message(&e),
            });
            drop(events);
            let _ = sender_handle.await;
            return;
        }
    };

    let mut signed_out = false;
    loop {
        let step = tokio::select! {
            msg = ws_stream.next() => Step::Incoming(msg),
            update = session.next_update() => Step::Update(update),
        };

        match step {
            Step::Incoming(Some(Ok(Message::Text(text)))) => {
                match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(ClientCommand::SignOut) => {
                        signed_out = true;
                        break;
                    }
                    Ok(command) => {
                        if let Err(e) = apply_command(&mut session, command) {
                            tracing::debug!(user_id = %user_id, error = %e, "Command rejected");
                            events.emit(ChatEvent::Error {
                                message: user_message(&e),
                            });
                        }
                    }
                    Err(e) => {
                        tracing::debug!(user_id = %user_id, error = %e, "Malformed client command");
                        events.emit(ChatEvent::Error {
                            message: "Unrecognized command".into(),
                        });
                    }
                }
            }
            Step::Incoming(Some(Ok(Message::Close(_)))) | Step::Incoming(None) => break,
            Step::Incoming(Some(Err(_))) => break,
            Step::Incoming(Some(Ok(_))) => {} // Ping/Pong handled by axum/tungstenite
            Step::Update(Ok(true)) => {}
            Step::Update(Ok(false)) => break,
            Step::Update(Err(e)) => {
                tracing::error!(user_id = %user_id, error = %e, "Live update failed");
                events.emit(ChatEvent::Error {
                    message: user_message(&e),
                });
                break;
            }
        }
    }

    // Cleanup: end the session (aborts any send), then let the sender drain.
    if signed_out {
        session.sign_out();
    } else {
        drop(session);
    }
    drop(events);
    let _ = sender_handle.await;

    tracing::info!(user_id = %user_id, "Chat WebSocket disconnected");
}

fn apply_command(session: &mut ChatSession, command: ClientCommand) -> Result<(), ChatError> {
    match command {
        ClientCommand::CreateRoom { name } => session.create_room(&name).map(|_| ()),
        ClientCommand::SelectRoom { room_id } => session.select_room(&room_id).map(|_| ()),
        ClientCommand::Send { text } => session.send(&text),
        ClientCommand::ChooseSuggestion { text } => session.choose_suggestion(&text),
        ClientCommand::SignOut => Ok(()),
    }
}
