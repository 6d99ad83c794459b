//! Client for the WhatsApp Cloud (Graph) API.
//!
//! Every request carries the configured bearer token and is bounded by the
//! configured timeout. Nothing is retried: a failure is reported once and
//! the caller decides what to do with it.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::{debug, info, warn};

use wahook_shared::constants::MESSAGING_PRODUCT;
use wahook_shared::outbound::{MediaUploadResponse, MediaUrlResponse, OutboundMessage, SendResponse};

use crate::config::ServerConfig;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("missing configuration: {0}")]
    MissingCredentials(&'static str),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },
}

/// Media bytes fetched from the Graph API.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub data: Bytes,
    pub mime_type: Option<String>,
}

pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    version: String,
    access_token: Option<String>,
    phone_number_id: Option<String>,
}

impl GraphClient {
    pub fn new(config: &ServerConfig) -> Result<Self, GraphError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.graph_api_base.trim_end_matches('/').to_string(),
            version: config.graph_api_version.clone(),
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
        })
    }

    /// Whether an access token is configured (enough to download media).
    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    fn token(&self) -> Result<&str, GraphError> {
        self.access_token
            .as_deref()
            .ok_or(GraphError::MissingCredentials("ACCESS_TOKEN"))
    }

    fn phone_endpoint(&self, path: &str) -> Result<String, GraphError> {
        let phone_number_id = self
            .phone_number_id
            .as_deref()
            .ok_or(GraphError::MissingCredentials("PHONE_NUMBER_ID"))?;
        Ok(format!(
            "{}/{}/{}/{}",
            self.base_url, self.version, phone_number_id, path
        ))
    }

    /// `POST /{phone_number_id}/messages`.
    pub async fn send(&self, message: &OutboundMessage) -> Result<SendResponse, GraphError> {
        let token = self.token()?;
        let url = self.phone_endpoint("messages")?;

        debug!(to = %message.to(), kind = %message.kind(), "sending message");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&message.to_json())
            .send()
            .await?;
        let response = check_status(response).await?;

        let parsed: SendResponse = response.json().await?;
        info!(
            to = %message.to(),
            message_id = parsed.message_id().unwrap_or("-"),
            "message sent"
        );
        Ok(parsed)
    }

    /// `POST /{phone_number_id}/media`, returning the new media id.
    pub async fn upload_media(
        &self,
        data: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> Result<String, GraphError> {
        let token = self.token()?;
        let url = self.phone_endpoint("media")?;

        let size = data.len();
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime_type)?;
        let form = Form::new()
            .text("messaging_product", MESSAGING_PRODUCT)
            .text("type", mime_type.to_string())
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        let response = check_status(response).await?;

        let uploaded: MediaUploadResponse = response.json().await?;
        info!(media_id = %uploaded.id, size, "media uploaded");
        Ok(uploaded.id)
    }

    /// `GET /{media_id}`: resolve a media id to a short-lived download URL.
    pub async fn media_url(&self, media_id: &str) -> Result<MediaUrlResponse, GraphError> {
        let token = self.token()?;
        let url = format!("{}/{}/{}", self.base_url, self.version, media_id);

        let response = self.client.get(&url).bearer_auth(token).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Resolve and fetch a media object in one go.
    pub async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, GraphError> {
        let resolved = self.media_url(media_id).await?;
        let token = self.token()?;

        let response = self
            .client
            .get(&resolved.url)
            .bearer_auth(token)
            .send()
            .await?;
        let response = check_status(response).await?;

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response.bytes().await?;

        debug!(media_id, size = data.len(), "media downloaded");
        Ok(DownloadedMedia {
            data,
            mime_type: resolved.mime_type.or(header_mime),
        })
    }
}

/// Turn a non-2xx response into [`GraphError::Api`], keeping the body for
/// the server log.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GraphError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "Graph API request failed");
    Err(GraphError::Api {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_graph_stub, stub_config};
    use wahook_shared::MessageKind;

    #[tokio::test]
    async fn send_text_returns_message_id() {
        let stub = spawn_graph_stub().await;
        let client = GraphClient::new(&stub_config(&stub.base_url)).unwrap();

        let resp = client
            .send(&OutboundMessage::Text {
                to: "111".into(),
                body: "hello".into(),
            })
            .await
            .unwrap();
        assert_eq!(resp.message_id(), Some("wamid.OUT1"));

        let sent = stub.sent_bodies();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["text"]["body"], "hello");
    }

    #[tokio::test]
    async fn api_error_is_reported() {
        let stub = spawn_graph_stub().await;
        let client = GraphClient::new(&stub_config(&stub.base_url)).unwrap();

        let err = client
            .send(&OutboundMessage::Text {
                to: "fail".into(),
                body: "x".into(),
            })
            .await
            .unwrap_err();
        match err {
            GraphError::Api { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid parameter"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn wrong_token_is_rejected_by_api() {
        let stub = spawn_graph_stub().await;
        let mut config = stub_config(&stub.base_url);
        config.access_token = Some("wrong".into());
        let client = GraphClient::new(&config).unwrap();

        let err = client
            .send(&OutboundMessage::Text {
                to: "111".into(),
                body: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn missing_credentials() {
        let client = GraphClient::new(&ServerConfig::default()).unwrap();
        assert!(!client.has_token());
        let err = client
            .send(&OutboundMessage::Template {
                to: "111".into(),
                name: "hello_world".into(),
                language: "en_US".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingCredentials("ACCESS_TOKEN")));
    }

    #[tokio::test]
    async fn download_media_follows_url() {
        let stub = spawn_graph_stub().await;
        let client = GraphClient::new(&stub_config(&stub.base_url)).unwrap();

        let media = client.download_media("MEDIA1").await.unwrap();
        assert_eq!(media.data.as_ref(), b"fake-jpeg-bytes");
        assert_eq!(media.mime_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn upload_then_send_media() {
        let stub = spawn_graph_stub().await;
        let client = GraphClient::new(&stub_config(&stub.base_url)).unwrap();

        let media_id = client
            .upload_media(b"%PDF".to_vec(), "doc.pdf", "application/pdf")
            .await
            .unwrap();
        assert_eq!(media_id, "UPLOADED1");

        client
            .send(&OutboundMessage::Media {
                to: "111".into(),
                kind: MessageKind::Document,
                media_id,
                caption: Some("invoice".into()),
                filename: Some("doc.pdf".into()),
            })
            .await
            .unwrap();
        assert_eq!(stub.sent_bodies()[0]["document"]["id"], "UPLOADED1");
    }
}
