use std::collections::VecDeque;
use std::time::Duration;

use axum::body::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use super::sse::{SseDecoder, SseEvent};
use super::types::{ChatMessage, CompletionPayload, CompletionResponse};
use super::CompletionError;
use crate::config::AppConfig;

/// Connect timeout for the remote API. Reads are unbounded: streams of
/// `max_tokens` output can legitimately take a while.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Text deltas of a streamed completion, in arrival order.
pub type DeltaStream = BoxStream<'static, Result<String, CompletionError>>;

/// HTTP client for an OpenAI-compatible chat completions API.
pub struct CompletionClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl CompletionClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CompletionError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, CompletionError> {
        Self::new(&config.openai_base_url, &config.api_key, &config.model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the request body with the fixed sampling parameters.
    pub fn payload(&self, messages: Vec<ChatMessage>, stream: bool) -> CompletionPayload {
        CompletionPayload::new(&self.model, messages, stream)
    }

    async fn post(&self, payload: &CompletionPayload) -> Result<reqwest::Response, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| CompletionError::from_reqwest(e, &self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Completion API rejected request");
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Start a streamed completion and return its text deltas.
    ///
    /// Errors before the first byte (connection, non-2xx) are returned
    /// directly; errors mid-stream are yielded as the final item.
    pub async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<DeltaStream, CompletionError> {
        let payload = self.payload(messages, true);
        tracing::debug!(
            model = %self.model,
            messages = payload.messages.len(),
            "Opening completion stream"
        );
        let response = self.post(&payload).await?;

        let state = DeltaState {
            body: response.bytes_stream().boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            ended: false,
            base_url: self.base_url.clone(),
        };
        Ok(stream::unfold(state, DeltaState::next_item).boxed())
    }

    /// Non-streaming completion; returns the first choice's text.
    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionError> {
        let payload = self.payload(messages, false);
        let response = self.post(&payload).await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}

struct DeltaState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, CompletionError>>,
    ended: bool,
    base_url: String,
}

impl DeltaState {
    async fn next_item(mut self) -> Option<(Result<String, CompletionError>, Self)> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some((item, self));
            }
            if self.ended {
                return None;
            }
            match self.body.next().await {
                Some(Ok(bytes)) => {
                    let decoded = self.decoder.push(&bytes);
                    self.enqueue(decoded);
                    if self.decoder.is_done() {
                        self.ended = true;
                    }
                }
                Some(Err(e)) => {
                    self.ended = true;
                    self.pending
                        .push_back(Err(CompletionError::from_reqwest(e, &self.base_url)));
                }
                None => {
                    self.ended = true;
                    let flushed = self.decoder.finish();
                    self.enqueue(flushed);
                }
            }
        }
    }

    fn enqueue(&mut self, decoded: Result<Vec<SseEvent>, CompletionError>) {
        match decoded {
            Ok(events) => {
                for event in events {
                    if let SseEvent::Delta(text) = event {
                        self.pending.push_back(Ok(text));
                    }
                }
            }
            Err(e) => {
                self.ended = true;
                self.pending.push_back(Err(e));
            }
        }
    }
}
