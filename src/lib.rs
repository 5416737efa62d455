pub mod api;
pub mod chat; // Chat UI protocol (events, views)
pub mod completion;
pub mod config;
pub mod core_state;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod rooms;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::{CoreError, CoreState};

/// Start the chat service and serve until Ctrl-C.
///
/// Configuration is read from the environment; a missing completion API
/// key aborts startup.
pub async fn run() -> Result<(), CoreError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env()?;
    let core = Arc::new(CoreState::new(config)?);
    let server = api::start_server(core).await?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    server.stop().await;
    Ok(())
}
