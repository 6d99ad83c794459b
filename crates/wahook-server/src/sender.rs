//! Outbound send endpoints.

use axum::{extract::Multipart, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use wahook_shared::constants::MAX_TEXT_LENGTH;
use wahook_shared::outbound::{OutboundMessage, SendResponse};
use wahook_shared::MessageKind;
use wahook_store::NewSentMessage;

use crate::api::AppState;
use crate::error::ServerError;
use crate::media::media_reference;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTemplateRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
}

impl SendResult {
    fn from_response(response: &SendResponse) -> Self {
        Self {
            success: true,
            message_id: response.message_id().map(str::to_string),
            media_id: None,
        }
    }
}

/// Send through the Graph API, then log the send if configured to.
///
/// A failure to log does not fail the send: the message has already left.
pub async fn send_and_record(
    state: &AppState,
    message: &OutboundMessage,
    media_path: Option<String>,
) -> Result<SendResponse, ServerError> {
    let response = state.graph.send(message).await?;

    if state.config.record_sent {
        let record = NewSentMessage {
            wamid: response.message_id().map(str::to_string),
            phone: message.to().to_string(),
            kind: message.kind(),
            content: message.content(),
            media_path,
        };
        if let Err(e) = state.store.insert_sent_message(&record) {
            warn!(to = %message.to(), error = %e, "Failed to record sent message");
        }
    }

    Ok(response)
}

fn required(value: Option<String>, field: &str) -> Result<String, ServerError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServerError::BadRequest(format!("'{field}' is required")))
}

pub async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendResult>, ServerError> {
    let phone = required(req.phone, "phone")?;
    let body = required(req.message, "message")?;
    if body.chars().count() > MAX_TEXT_LENGTH {
        return Err(ServerError::BadRequest(format!(
            "'message' exceeds {MAX_TEXT_LENGTH} characters"
        )));
    }

    let message = OutboundMessage::Text { to: phone, body };
    let response = send_and_record(&state, &message, None).await?;
    Ok(Json(SendResult::from_response(&response)))
}

pub async fn send_template(
    State(state): State<AppState>,
    Json(req): Json<SendTemplateRequest>,
) -> Result<Json<SendResult>, ServerError> {
    let phone = required(req.phone, "phone")?;
    let name = required(req.template_name, "templateName")?;
    let language = req
        .language_code
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "en_US".to_string());

    let message = OutboundMessage::Template {
        to: phone,
        name,
        language,
    };
    let response = send_and_record(&state, &message, None).await?;
    Ok(Json(SendResult::from_response(&response)))
}

/// Multipart fields: `file` (required), `phone` (required), `caption`.
///
/// The file is kept locally, uploaded to the Graph API, then sent by media id.
pub async fn send_file_message(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SendResult>, ServerError> {
    let mut phone = None;
    let mut caption = None;
    let mut file: Option<(Vec<u8>, Option<String>, Option<String>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;
                file = Some((data.to_vec(), file_name, content_type));
            }
            "phone" | "caption" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;
                if name == "phone" {
                    phone = Some(text);
                } else {
                    caption = Some(text);
                }
            }
            _ => {}
        }
    }

    let phone = required(phone, "phone")?;
    let (data, file_name, content_type) = file.ok_or_else(|| {
        ServerError::BadRequest("Missing 'file' field in multipart form".to_string())
    })?;
    let caption = caption.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    let mime_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());
    let upload_name = file_name.clone().unwrap_or_else(|| "upload".to_string());

    let stored = state
        .media
        .store(&data, Some(&mime_type), file_name.as_deref())
        .await?;

    let sent = upload_and_send(&state, phone, caption, data, upload_name, &mime_type, &stored).await;
    let (response, media_id) = match sent {
        Ok(sent) => sent,
        Err(e) => {
            // Only files that were actually sent are kept.
            state.media.remove(&stored).await;
            return Err(e);
        }
    };

    info!(media_id = %media_id, file = %stored, "File message sent");

    let mut result = SendResult::from_response(&response);
    result.media_id = Some(media_id);
    Ok(Json(result))
}

async fn upload_and_send(
    state: &AppState,
    phone: String,
    caption: Option<String>,
    data: Vec<u8>,
    upload_name: String,
    mime_type: &str,
    stored: &str,
) -> Result<(SendResponse, String), ServerError> {
    let media_id = state.graph.upload_media(data, &upload_name, mime_type).await?;

    let message = OutboundMessage::Media {
        to: phone,
        kind: MessageKind::from_mime(mime_type),
        media_id: media_id.clone(),
        caption,
        filename: Some(upload_name),
    };
    let response = send_and_record(state, &message, Some(media_reference(stored))).await?;
    Ok((response, media_id))
}
