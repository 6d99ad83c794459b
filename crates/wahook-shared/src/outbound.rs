//! Request and response bodies for the Graph API `/messages` and `/media`
//! endpoints.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::constants::MESSAGING_PRODUCT;
use crate::types::MessageKind;

/// A message to send through `POST /{phone_number_id}/messages`.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text {
        to: String,
        body: String,
    },
    Template {
        to: String,
        name: String,
        language: String,
    },
    /// Media previously uploaded through `/media`.
    Media {
        to: String,
        kind: MessageKind,
        media_id: String,
        caption: Option<String>,
        filename: Option<String>,
    },
}

impl OutboundMessage {
    pub fn to(&self) -> &str {
        match self {
            OutboundMessage::Text { to, .. }
            | OutboundMessage::Template { to, .. }
            | OutboundMessage::Media { to, .. } => to,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            OutboundMessage::Text { .. } => MessageKind::Text,
            OutboundMessage::Template { .. } => MessageKind::Template,
            OutboundMessage::Media { kind, .. } => kind.clone(),
        }
    }

    /// Text recorded in the sent-message log.
    pub fn content(&self) -> String {
        match self {
            OutboundMessage::Text { body, .. } => body.clone(),
            OutboundMessage::Template { name, language, .. } => format!("{name} ({language})"),
            OutboundMessage::Media {
                caption, filename, ..
            } => caption
                .clone()
                .or_else(|| filename.clone())
                .unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            OutboundMessage::Text { to, body } => json!({
                "messaging_product": MESSAGING_PRODUCT,
                "recipient_type": "individual",
                "to": to,
                "type": "text",
                "text": { "preview_url": false, "body": body },
            }),
            OutboundMessage::Template { to, name, language } => json!({
                "messaging_product": MESSAGING_PRODUCT,
                "to": to,
                "type": "template",
                "template": {
                    "name": name,
                    "language": { "code": language },
                },
            }),
            OutboundMessage::Media {
                to,
                kind,
                media_id,
                caption,
                filename,
            } => {
                let mut media = json!({ "id": media_id });
                // audio and sticker reject captions
                if matches!(
                    kind,
                    MessageKind::Image | MessageKind::Video | MessageKind::Document
                ) {
                    if let Some(caption) = caption {
                        media["caption"] = json!(caption);
                    }
                }
                if *kind == MessageKind::Document {
                    if let Some(filename) = filename {
                        media["filename"] = json!(filename);
                    }
                }
                let mut body = json!({
                    "messaging_product": MESSAGING_PRODUCT,
                    "to": to,
                    "type": kind.as_str(),
                });
                body[kind.as_str()] = media;
                body
            }
        }
    }
}

/// Successful response of `POST /messages`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub contacts: Vec<SendResponseContact>,
    #[serde(default)]
    pub messages: Vec<SendResponseMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendResponseContact {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub wa_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendResponseMessage {
    #[serde(default)]
    pub id: Option<String>,
}

impl SendResponse {
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().and_then(|m| m.id.as_deref())
    }

    pub fn wa_id(&self) -> Option<&str> {
        self.contacts.first().and_then(|c| c.wa_id.as_deref())
    }
}

/// Response of `POST /{phone_number_id}/media`.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaUploadResponse {
    pub id: String,
}

/// Response of `GET /{media_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaUrlResponse {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_body() {
        let msg = OutboundMessage::Text {
            to: "111".into(),
            body: "hello".into(),
        };
        let v = msg.to_json();
        assert_eq!(v["messaging_product"], "whatsapp");
        assert_eq!(v["to"], "111");
        assert_eq!(v["type"], "text");
        assert_eq!(v["text"]["body"], "hello");
    }

    #[test]
    fn template_body() {
        let msg = OutboundMessage::Template {
            to: "111".into(),
            name: "hello_world".into(),
            language: "en_US".into(),
        };
        let v = msg.to_json();
        assert_eq!(v["type"], "template");
        assert_eq!(v["template"]["name"], "hello_world");
        assert_eq!(v["template"]["language"]["code"], "en_US");
        assert_eq!(msg.content(), "hello_world (en_US)");
    }

    #[test]
    fn media_body_drops_caption_for_audio() {
        let msg = OutboundMessage::Media {
            to: "111".into(),
            kind: MessageKind::Audio,
            media_id: "M1".into(),
            caption: Some("ignored".into()),
            filename: None,
        };
        let v = msg.to_json();
        assert_eq!(v["type"], "audio");
        assert_eq!(v["audio"]["id"], "M1");
        assert!(v["audio"].get("caption").is_none());
    }

    #[test]
    fn document_body_keeps_filename() {
        let msg = OutboundMessage::Media {
            to: "111".into(),
            kind: MessageKind::Document,
            media_id: "M2".into(),
            caption: Some("invoice".into()),
            filename: Some("invoice.pdf".into()),
        };
        let v = msg.to_json();
        assert_eq!(v["document"]["caption"], "invoice");
        assert_eq!(v["document"]["filename"], "invoice.pdf");
    }

    #[test]
    fn send_response_ids() {
        let r: SendResponse = serde_json::from_value(json!({
            "messaging_product": "whatsapp",
            "contacts": [{"input": "111", "wa_id": "111"}],
            "messages": [{"id": "wamid.OUT"}]
        }))
        .unwrap();
        assert_eq!(r.message_id(), Some("wamid.OUT"));
        assert_eq!(r.wa_id(), Some("111"));
    }
}
