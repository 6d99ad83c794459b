use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use wahook_store::{Contact, MessageStore, MessageView, SentMessage, StatusView};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::graph::GraphClient;
use crate::media::{content_type_for, MediaStore};
use crate::{sender, webhook};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    pub graph: Arc<GraphClient>,
    pub media: Arc<MediaStore>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/",
            get(webhook::verify_handler).post(webhook::receive_handler),
        )
        .route(
            "/webhook",
            get(webhook::verify_handler).post(webhook::receive_handler),
        )
        .route("/messages", get(list_messages))
        .route("/contacts", get(list_contacts))
        .route("/message-metadata", get(list_statuses))
        .route("/statuses", get(list_statuses))
        .route("/sent-messages", get(list_sent_messages))
        .route("/send-message", post(sender::send_message))
        .route("/send-template", post(sender::send_template))
        .route("/send-file-message", post(sender::send_file_message))
        .route("/download-db", get(download_db))
        .route("/media/:file", get(media_download))
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store: &'static str,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.backend_name(),
    })
}

async fn list_messages(State(state): State<AppState>) -> Result<Json<Vec<MessageView>>, ServerError> {
    Ok(Json(state.store.list_messages()?))
}

async fn list_contacts(State(state): State<AppState>) -> Result<Json<Vec<Contact>>, ServerError> {
    Ok(Json(state.store.list_contacts()?))
}

async fn list_statuses(State(state): State<AppState>) -> Result<Json<Vec<StatusView>>, ServerError> {
    Ok(Json(state.store.list_statuses()?))
}

async fn list_sent_messages(
    State(state): State<AppState>,
) -> Result<Json<Vec<SentMessage>>, ServerError> {
    Ok(Json(state.store.list_sent_messages()?))
}

/// Raw copy of the store's backing file.
async fn download_db(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let path = state
        .store
        .backing_file()?
        .ok_or_else(|| ServerError::NotFound("store has no backing file".into()))?;

    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| ServerError::Internal(format!("Failed to read {}: {e}", path.display())))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("store")
        .to_string();

    info!(path = %path.display(), size = data.len(), "Store file downloaded");

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&file_name).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        data,
    ))
}

async fn media_download(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.media.read(&file).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&file))], data))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
