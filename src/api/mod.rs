//! HTTP surface: REST endpoints under `/api/` and the chat WebSocket.
//!
//! `api_router()` returns a composable `Router`; `server` owns the
//! listener lifecycle.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use router::api_router;
pub use server::{start_server, start_server_on, ApiServer};
pub use types::ApiContext;
