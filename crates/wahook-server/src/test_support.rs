//! Shared fixtures: an app state on temp storage and a local Graph API stub.

use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;

use wahook_store::{open_store, BackendKind};

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::graph::GraphClient;
use crate::media::MediaStore;

pub const STUB_TOKEN: &str = "TOKEN";
pub const STUB_PHONE_ID: &str = "PN";

/// App state over an in-memory store, with media in a temp directory.
pub async fn test_state(config: ServerConfig) -> (AppState, TempDir) {
    test_state_on(BackendKind::Memory, config).await
}

/// App state over the given backend. File-backed stores and media live
/// in the returned temp directory.
pub async fn test_state_on(backend: BackendKind, config: ServerConfig) -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let store_path = match backend {
        BackendKind::File => dir.path().join("messages.json"),
        BackendKind::Sqlite | BackendKind::Memory => dir.path().join("wahook.db"),
    };
    let store = open_store(backend, &store_path).unwrap();
    let media = MediaStore::new(dir.path().join("media"), config.max_upload_size)
        .await
        .unwrap();
    let graph = GraphClient::new(&config).unwrap();

    let state = AppState {
        store,
        graph: Arc::new(graph),
        media: Arc::new(media),
        config: Arc::new(config),
    };
    (state, dir)
}

/// Every backend `STORE_BACKEND` can select.
pub const ALL_BACKENDS: [BackendKind; 3] = [
    BackendKind::Sqlite,
    BackendKind::File,
    BackendKind::Memory,
];

/// Configuration pointing the Graph client at a stub.
pub fn stub_config(base_url: &str) -> ServerConfig {
    ServerConfig {
        verify_token: Some("secret".into()),
        access_token: Some(STUB_TOKEN.into()),
        phone_number_id: Some(STUB_PHONE_ID.into()),
        graph_api_base: base_url.to_string(),
        graph_api_version: "v18.0".into(),
        ..ServerConfig::default()
    }
}

#[derive(Clone)]
struct StubState {
    base_url: String,
    sent: Arc<Mutex<Vec<Value>>>,
}

pub struct GraphStub {
    pub base_url: String,
    sent: Arc<Mutex<Vec<Value>>>,
}

impl GraphStub {
    /// JSON bodies accepted by the messages endpoint, in order.
    pub fn sent_bodies(&self) -> Vec<Value> {
        self.sent.lock().unwrap().clone()
    }
}

/// Serve a minimal Graph API on an ephemeral port.
///
/// `to: "fail"` is answered with a 400, a bad bearer token with a 401.
pub async fn spawn_graph_stub() -> GraphStub {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let sent = Arc::new(Mutex::new(Vec::new()));

    let state = StubState {
        base_url: base_url.clone(),
        sent: sent.clone(),
    };
    let app = Router::new()
        .route(&format!("/v18.0/{STUB_PHONE_ID}/messages"), post(stub_messages))
        .route(&format!("/v18.0/{STUB_PHONE_ID}/media"), post(stub_upload))
        .route("/v18.0/:media_id", get(stub_media_url))
        .route("/files/:id", get(stub_file))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    GraphStub { base_url, sent }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {STUB_TOKEN}"))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"message": "Invalid OAuth access token.", "code": 190}})),
    )
        .into_response()
}

async fn stub_messages(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let to = body["to"].as_str().unwrap_or_default().to_string();
    if to == "fail" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "(#100) Invalid parameter", "code": 100}})),
        )
            .into_response();
    }
    state.sent.lock().unwrap().push(body);
    Json(json!({
        "messaging_product": "whatsapp",
        "contacts": [{"input": to, "wa_id": to}],
        "messages": [{"id": "wamid.OUT1"}]
    }))
    .into_response()
}

async fn stub_upload(headers: HeaderMap, _body: Bytes) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"id": "UPLOADED1"})).into_response()
}

async fn stub_media_url(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(media_id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "url": format!("{}/files/{media_id}", state.base_url),
        "mime_type": "image/jpeg",
        "id": media_id
    }))
    .into_response()
}

async fn stub_file(Path(_id): Path<String>) -> impl IntoResponse {
    ([("content-type", "image/jpeg")], b"fake-jpeg-bytes".to_vec())
}
