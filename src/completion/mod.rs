//! Client side of the remote chat-completion API.
//!
//! - `types`: request/response wire shapes and the fixed sampling parameters
//! - `sse`: incremental decoder for the `data: {json}` event stream
//! - `client`: `CompletionClient` (streaming + one-shot requests)

pub mod client;
pub mod sse;
pub mod types;

pub use client::CompletionClient;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Cannot connect to completion API at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Completion API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse completion response: {0}")]
    Parse(String),

    #[error("Completion response contained no choices")]
    EmptyResponse,
}

impl CompletionError {
    pub(crate) fn from_reqwest(err: reqwest::Error, base_url: &str) -> Self {
        if err.is_connect() {
            CompletionError::Connection(base_url.to_string())
        } else {
            CompletionError::Http(err.to_string())
        }
    }
}
