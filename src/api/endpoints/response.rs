//! `POST /api/response`: relay a streamed completion as plain text.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::TryStreamExt;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::completion::ChatMessage;

/// Body is a JSON array of `{role, content}`. Responds with the generated
/// text as a chunked `text/plain` stream.
pub async fn respond(State(ctx): State<ApiContext>, body: Bytes) -> Result<Response, ApiError> {
    let messages: Vec<ChatMessage> = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Expected a JSON array of messages: {e}")))?;
    if messages.is_empty() {
        return Err(ApiError::BadRequest("At least one message is required".into()));
    }

    let deltas = ctx.core.completion.stream_chat(messages).await?;
    let deltas = deltas.inspect_err(|e| tracing::warn!(error = %e, "Completion stream broke off"));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(deltas),
    )
        .into_response())
}
