//! Chat pipeline: one user send, end to end.
//!
//! commit user turn → build request → open stream → consume → commit
//! assistant turn → suggestions. Steps run strictly in that order.

pub mod committer;
pub mod request;
pub mod send;
pub mod source;
pub mod stream;
pub mod suggestions;

pub use send::{ChatPipeline, TurnOutcome};
pub use source::{Completer, EdgeClient, ResponseSource};

use crate::completion::CompletionError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("A message is already being answered")]
    SendInProgress,
    #[error("No room selected")]
    NoRoomSelected,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Completion failed: {0}")]
    Upstream(#[from] CompletionError),
}
