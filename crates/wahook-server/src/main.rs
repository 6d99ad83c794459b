//! # wahook-server
//!
//! WhatsApp Cloud API webhook receiver.
//!
//! This binary provides:
//! - **Webhook endpoint** answering Meta's verification challenge and
//!   storing every inbound contact, message and delivery status
//! - **Media capture** that downloads inbound media to a local directory
//! - **Send API** for text, template and file messages through the Graph API
//! - **Query API** listing stored messages, contacts, statuses and sends,
//!   plus a raw download of the store file

mod api;
mod config;
mod error;
mod graph;
mod media;
mod sender;
mod webhook;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wahook_store::open_store;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::graph::GraphClient;
use crate::media::MediaStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wahook_server=debug")),
        )
        .init();

    info!("Starting wahook server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    if config.verify_token.is_none() {
        warn!("VERIFY_TOKEN is not set, webhook verification will be refused");
    }
    if config.access_token.is_none() || config.phone_number_id.is_none() {
        warn!("ACCESS_TOKEN or PHONE_NUMBER_ID missing, sending is disabled");
    }

    let database_path = config.database_path();
    let store = open_store(config.store_backend, &database_path)?;
    info!(
        backend = store.backend_name(),
        path = %database_path.display(),
        "Store ready"
    );

    let media = Arc::new(MediaStore::new(config.media_dir.clone(), config.max_upload_size).await?);
    let graph = Arc::new(GraphClient::new(&config)?);

    let http_addr = config.http_addr;
    let app_state = AppState {
        store,
        graph,
        media,
        config: Arc::new(config),
    };

    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
