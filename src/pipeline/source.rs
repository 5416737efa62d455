//! Seams between the chat pipeline and the completion backends.
//!
//! - `ResponseSource`: opens a chunked text response for a message list
//! - `Completer`: one-shot completion (used for suggestions)
//!
//! `CompletionClient` implements both in-process. `EdgeClient` reaches a
//! deployed `/api/response` endpoint over HTTP instead.

use std::time::Duration;

use axum::body::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};

use super::stream::ByteStream;
use crate::completion::{ChatMessage, CompletionClient, CompletionError};

pub trait ResponseSource: Send + Sync {
    /// Dispatch `messages` and return the response body once the status
    /// is known to be successful.
    fn open(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<ByteStream, CompletionError>>;
}

pub trait Completer: Send + Sync {
    fn complete(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<String, CompletionError>>;
}

impl ResponseSource for CompletionClient {
    fn open(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<ByteStream, CompletionError>> {
        async move {
            let deltas = self.stream_chat(messages).await?;
            let body: ByteStream = deltas.map(|delta| delta.map(Bytes::from)).boxed();
            Ok(body)
        }
        .boxed()
    }
}

impl Completer for CompletionClient {
    fn complete(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<String, CompletionError>> {
        CompletionClient::complete(self, messages).boxed()
    }
}

/// Client for the `/api/response` edge endpoint.
pub struct EdgeClient {
    url: String,
    client: reqwest::Client,
}

impl EdgeClient {
    pub fn new(url: &str) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CompletionError::Http(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

impl ResponseSource for EdgeClient {
    fn open(&self, messages: Vec<ChatMessage>) -> BoxFuture<'_, Result<ByteStream, CompletionError>> {
        async move {
            let response = self
                .client
                .post(&self.url)
                .json(&messages)
                .send()
                .await
                .map_err(|e| CompletionError::from_reqwest(e, &self.url))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(CompletionError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let body: ByteStream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(|e| CompletionError::Http(e.to_string())))
                .boxed();
            Ok(body)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stream::{consume_stream, StreamState, TextStream};
    use crate::test_support::{spawn_upstream, StubUpstream};

    #[tokio::test]
    async fn completion_client_source_streams_plain_text() {
        let upstream = spawn_upstream(StubUpstream::streaming(&["ein ", "Bär"])).await;
        let client = CompletionClient::new(&upstream.base_url, "k", "m").unwrap();

        let body = ResponseSource::open(&client, vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        let mut state = StreamState::new();
        let text = consume_stream(TextStream::new(body), &mut state, |_| {})
            .await
            .unwrap();
        assert_eq!(text, "ein Bär");
    }

    #[tokio::test]
    async fn completion_client_completer_returns_text() {
        let upstream = spawn_upstream(StubUpstream::completing("done")).await;
        let client = CompletionClient::new(&upstream.base_url, "k", "m").unwrap();
        let text = Completer::complete(&client, vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(text, "done");
    }
}
