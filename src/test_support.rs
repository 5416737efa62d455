//! Test helpers: a local stand-in for the remote completion API.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::AppConfig;

/// Byte size of the chunks the stub writes; small enough to split
/// events and multi-byte characters.
const STUB_CHUNK_BYTES: usize = 7;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

/// Scripted behavior of the stub completion API.
#[derive(Clone, Default)]
pub struct StubUpstream {
    pub deltas: Vec<String>,
    pub completion: String,
    pub status: Option<u16>,
    /// Status returned for non-streaming requests only.
    pub completion_status: Option<u16>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubUpstream {
    pub fn streaming(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn completing(text: &str) -> Self {
        Self {
            completion: text.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_completion(mut self, text: &str) -> Self {
        self.completion = text.to_string();
        self
    }

    pub fn with_completion_status(mut self, status: u16) -> Self {
        self.completion_status = Some(status);
        self
    }
}

pub struct RunningUpstream {
    pub base_url: String,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RunningUpstream {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }
}

async fn completions(
    State(stub): State<StubUpstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.recorded.lock().unwrap().push(RecordedRequest {
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: body.clone(),
    });

    if let Some(status) = stub.status {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, "upstream failure").into_response();
    }

    if body["stream"] == true {
        let mut sse = String::from("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n");
        for delta in &stub.deltas {
            sse.push_str(&format!(
                "data: {}\n\n",
                json!({"choices": [{"index": 0, "delta": {"content": delta}}]})
            ));
        }
        sse.push_str("data: [DONE]\n\n");

        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = sse
            .into_bytes()
            .chunks(STUB_CHUNK_BYTES)
            .map(|c| Ok(c.to_vec()))
            .collect();
        return Response::builder()
            .header(header::CONTENT_TYPE, "text/event-stream")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();
    }

    if let Some(status) = stub.completion_status {
        return (StatusCode::from_u16(status).unwrap(), "no completion").into_response();
    }

    Json(json!({
        "id": "cmpl-test",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": stub.completion}}]
    }))
    .into_response()
}

/// Serve `stub` on an ephemeral localhost port.
pub async fn spawn_upstream(stub: StubUpstream) -> RunningUpstream {
    let recorded = stub.recorded.clone();
    let app = Router::new()
        .route("/chat/completions", post(completions))
        .with_state(stub);
    let base_url = serve(app).await;
    RunningUpstream { base_url, recorded }
}

/// Serve any router on an ephemeral localhost port; returns `http://addr`.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Configuration pointing at a stub upstream (and optionally an edge URL).
pub fn test_config(base_url: &str, edge_url: Option<&str>) -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "OPENAI_API_KEY" => Some("test-key".into()),
        "ROOMCHAT_OPENAI_BASE_URL" => Some(base_url.into()),
        "ROOMCHAT_EDGE_URL" => edge_url.map(str::to_string),
        "ROOMCHAT_BIND" => Some("127.0.0.1:0".into()),
        "ROOMCHAT_DB_PATH" => Some("roomchat-test.db".into()),
        _ => None,
    })
    .unwrap()
}
