//! Shared application state.
//!
//! `CoreState` is built once at startup and wrapped in `Arc`; the HTTP
//! handlers and every WebSocket chat session borrow from it.

use std::sync::Arc;

use crate::completion::{CompletionClient, CompletionError};
use crate::config::{AppConfig, ConfigError};
use crate::pipeline::{ChatPipeline, EdgeClient, ResponseSource};
use crate::store::{RoomStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Completion client error: {0}")]
    Completion(#[from] CompletionError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct CoreState {
    pub config: AppConfig,
    pub store: Arc<RoomStore>,
    /// Direct client for the remote completion API. Serves
    /// `/api/response` and suggestion requests.
    pub completion: Arc<CompletionClient>,
    /// Send pipeline shared by all chat sessions.
    pub pipeline: Arc<ChatPipeline>,
}

impl CoreState {
    /// Open the store at `config.db_path` and wire the pipeline.
    pub fn new(config: AppConfig) -> Result<Self, CoreError> {
        let store = Arc::new(RoomStore::open(&config.db_path)?);
        Self::with_store(config, store)
    }

    /// Wire the pipeline around an already opened store.
    pub fn with_store(config: AppConfig, store: Arc<RoomStore>) -> Result<Self, CoreError> {
        let completion = Arc::new(CompletionClient::from_config(&config)?);

        let source: Arc<dyn ResponseSource> = match &config.edge_url {
            Some(url) => {
                tracing::info!(url = %url, "Chat sessions stream through edge endpoint");
                Arc::new(EdgeClient::new(url)?)
            }
            None => completion.clone(),
        };
        let pipeline = Arc::new(ChatPipeline::new(
            store.clone(),
            source,
            completion.clone(),
        ));

        tracing::debug!(
            model = %completion.model(),
            base_url = %completion.base_url(),
            "Core state ready"
        );
        Ok(Self {
            config,
            store,
            completion,
            pipeline,
        })
    }
}
