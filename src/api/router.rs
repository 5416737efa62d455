//! API router.
//!
//! Returns a composable `Router`: REST endpoints nested under `/api/`,
//! the chat WebSocket at `/ws/chat`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::core_state::CoreState;

/// Build the application router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/response", post(endpoints::response::respond))
        .route(
            "/rooms",
            get(endpoints::rooms::list).post(endpoints::rooms::create),
        )
        .route("/rooms/:id/messages", get(endpoints::rooms::messages));

    Router::new()
        .nest("/api", api)
        .route("/ws/chat", get(websocket::ws_upgrade))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
}
