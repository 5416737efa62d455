//! API server lifecycle: bind → spawn background task → return handle
//! with shutdown channel.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::api_router;
use crate::core_state::{CoreError, CoreState};

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    pub started_at: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ApiServer {
    /// Ask the server to stop accepting connections.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
    }

    /// Shut down and wait for in-flight requests to drain.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Err(e) = (&mut self.task).await {
            tracing::error!("API server task failed: {e}");
        }
    }
}

/// Start the server on the configured bind address.
pub async fn start_server(core: Arc<CoreState>) -> Result<ApiServer, CoreError> {
    let addr = core.config.bind;
    start_server_on(core, addr).await
}

/// Start the server on `addr` (port 0 picks an ephemeral port).
pub async fn start_server_on(
    core: Arc<CoreState>,
    addr: SocketAddr,
) -> Result<ApiServer, CoreError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let app = api_router(core);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("API server received shutdown signal");
        };

        tracing::info!(%addr, "API server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("API server error: {e}");
        }

        tracing::info!("API server stopped");
    });

    Ok(ApiServer {
        addr,
        started_at: chrono::Utc::now().to_rfc3339(),
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RoomStore;
    use crate::test_support::test_config;

    fn test_core() -> Arc<CoreState> {
        let store = Arc::new(RoomStore::in_memory().unwrap());
        Arc::new(CoreState::with_store(test_config("http://127.0.0.1:9", None), store).unwrap())
    }

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let server = start_server_on(test_core(), localhost())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);
        assert!(!server.started_at.is_empty());

        let url = format!("http://{}/api/health", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        drop(resp);

        server.stop().await;
        assert!(reqwest::get(&url).await.is_err());
    }

    #[tokio::test]
    async fn configured_bind_is_used() {
        let server = start_server(test_core()).await.expect("server should start");
        assert_eq!(server.addr.ip().to_string(), "127.0.0.1");
        server.stop().await;
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let mut server = start_server_on(test_core(), localhost())
            .await
            .expect("server should start");
        server.shutdown();
        server.shutdown(); // Second call should be safe
    }

    #[tokio::test]
    async fn bind_conflict_is_an_io_error() {
        let server = start_server_on(test_core(), localhost()).await.unwrap();
        let err = start_server_on(test_core(), server.addr).await.err().unwrap();
        assert!(matches!(err, CoreError::Io(_)));
        server.stop().await;
    }
}
