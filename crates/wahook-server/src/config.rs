//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the server starts with zero configuration
//! for local development. Without `VERIFY_TOKEN` every webhook verification
//! is refused; without `ACCESS_TOKEN`/`PHONE_NUMBER_ID` the send endpoints
//! fail and media is not downloaded.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use wahook_shared::constants::{DEFAULT_GRAPH_API_BASE, DEFAULT_GRAPH_API_VERSION};
use wahook_store::BackendKind;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) server.
    /// Env: `HTTP_ADDR`, or `PORT` to bind `0.0.0.0:<PORT>`.
    /// Default: `0.0.0.0:3000`
    pub http_addr: SocketAddr,

    /// Shared secret echoed by Meta during webhook verification.
    /// Env: `VERIFY_TOKEN`
    pub verify_token: Option<String>,

    /// Graph API bearer token.
    /// Env: `ACCESS_TOKEN`
    pub access_token: Option<String>,

    /// Sender phone-number id used in `/{id}/messages`.
    /// Env: `PHONE_NUMBER_ID`
    pub phone_number_id: Option<String>,

    /// Env: `GRAPH_API_BASE`
    /// Default: `https://graph.facebook.com`
    pub graph_api_base: String,

    /// Env: `GRAPH_API_VERSION`
    /// Default: `v18.0`
    pub graph_api_version: String,

    /// Env: `STORE_BACKEND` (`sqlite`, `file`, `memory`)
    /// Default: `sqlite`
    pub store_backend: BackendKind,

    /// Env: `DATABASE_PATH`
    /// Default: `./wahook.db` for sqlite, `./messages.json` for file.
    pub database_path: Option<PathBuf>,

    /// Directory for downloaded and uploaded media.
    /// Env: `MEDIA_DIR`
    /// Default: `./media`
    pub media_dir: PathBuf,

    /// Fetch inbound media from the Graph API and keep a local copy.
    /// Env: `DOWNLOAD_MEDIA` (true/false)
    /// Default: `true`
    pub download_media: bool,

    /// Log outbound sends in the store.
    /// Env: `RECORD_SENT` (true/false)
    /// Default: `true`
    pub record_sent: bool,

    /// Text sent back to every new inbound text message.
    /// Env: `AUTO_REPLY_TEXT`
    /// Default: empty (disabled).
    pub auto_reply_text: Option<String>,

    /// Timeout for each Graph API request.
    /// Env: `HTTP_TIMEOUT_SECS`
    /// Default: `30`
    pub http_timeout: Duration,

    /// Maximum request body and media file size in bytes (16 MiB).
    /// Env: `MAX_UPLOAD_SIZE`
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 3000).into(),
            verify_token: None,
            access_token: None,
            phone_number_id: None,
            graph_api_base: DEFAULT_GRAPH_API_BASE.to_string(),
            graph_api_version: DEFAULT_GRAPH_API_VERSION.to_string(),
            store_backend: BackendKind::default(),
            database_path: None,
            media_dir: PathBuf::from("./media"),
            download_media: true,
            record_sent: true,
            auto_reply_text: None,
            http_timeout: Duration::from_secs(30),
            max_upload_size: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("verify_token", &redact(&self.verify_token))
            .field("access_token", &redact(&self.access_token))
            .field("phone_number_id", &self.phone_number_id)
            .field("graph_api_base", &self.graph_api_base)
            .field("graph_api_version", &self.graph_api_version)
            .field("store_backend", &self.store_backend)
            .field("database_path", &self.database_path())
            .field("media_dir", &self.media_dir)
            .field("download_media", &self.download_media)
            .field("record_sent", &self.record_sent)
            .field("auto_reply", &self.auto_reply_text.is_some())
            .field("http_timeout", &self.http_timeout)
            .field("max_upload_size", &self.max_upload_size)
            .finish()
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "<set>",
        None => "<unset>",
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = non_empty("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => config.http_addr = ([0, 0, 0, 0], port).into(),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, using default"),
            }
        }

        if let Some(addr) = non_empty("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        config.verify_token = non_empty("VERIFY_TOKEN");
        config.access_token = non_empty("ACCESS_TOKEN");
        config.phone_number_id = non_empty("PHONE_NUMBER_ID");

        if let Some(base) = non_empty("GRAPH_API_BASE") {
            config.graph_api_base = base.trim_end_matches('/').to_string();
        }

        if let Some(version) = non_empty("GRAPH_API_VERSION") {
            config.graph_api_version = version;
        }

        if let Some(backend) = non_empty("STORE_BACKEND") {
            match backend.parse::<BackendKind>() {
                Ok(kind) => config.store_backend = kind,
                Err(e) => tracing::warn!(error = %e, "Invalid STORE_BACKEND, using default"),
            }
        }

        config.database_path = non_empty("DATABASE_PATH").map(PathBuf::from);

        if let Some(dir) = non_empty("MEDIA_DIR") {
            config.media_dir = PathBuf::from(dir);
        }

        if let Some(val) = non_empty("DOWNLOAD_MEDIA") {
            config.download_media = parse_flag(&val);
        }

        if let Some(val) = non_empty("RECORD_SENT") {
            config.record_sent = parse_flag(&val);
        }

        config.auto_reply_text = non_empty("AUTO_REPLY_TEXT");

        if let Some(val) = non_empty("HTTP_TIMEOUT_SECS") {
            match val.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.http_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid HTTP_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(val) = non_empty("MAX_UPLOAD_SIZE") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Where the store keeps its data, resolved against the backend.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        match self.store_backend {
            BackendKind::File => PathBuf::from("./messages.json"),
            BackendKind::Sqlite | BackendKind::Memory => PathBuf::from("./wahook.db"),
        }
    }
}

fn parse_flag(val: &str) -> bool {
    let val = val.trim();
    !(val.eq_ignore_ascii_case("false") || val == "0" || val.eq_ignore_ascii_case("no"))
}
