use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The `type` tag of a WhatsApp message.
///
/// Unknown tags are preserved verbatim in [`MessageKind::Other`] so that
/// a new message type introduced by the platform is still stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Location,
    Contacts,
    Interactive,
    Button,
    Reaction,
    Template,
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Audio => "audio",
            MessageKind::Document => "document",
            MessageKind::Sticker => "sticker",
            MessageKind::Location => "location",
            MessageKind::Contacts => "contacts",
            MessageKind::Interactive => "interactive",
            MessageKind::Button => "button",
            MessageKind::Reaction => "reaction",
            MessageKind::Template => "template",
            MessageKind::Other(tag) => tag,
        }
    }

    /// Kinds whose payload references downloadable media.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            MessageKind::Image
                | MessageKind::Video
                | MessageKind::Audio
                | MessageKind::Document
                | MessageKind::Sticker
        )
    }

    /// Body stored for a message that carries no usable text.
    pub fn placeholder(&self) -> String {
        format!("[{}]", self.as_str())
    }

    /// Pick a media kind from a MIME type, falling back to `document`.
    pub fn from_mime(mime: &str) -> Self {
        let base = mime.split(';').next().unwrap_or("").trim();
        if base == "image/webp" {
            MessageKind::Sticker
        } else if base.starts_with("image/") {
            MessageKind::Image
        } else if base.starts_with("video/") {
            MessageKind::Video
        } else if base.starts_with("audio/") {
            MessageKind::Audio
        } else {
            MessageKind::Document
        }
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        match tag {
            "text" => MessageKind::Text,
            "image" => MessageKind::Image,
            "video" => MessageKind::Video,
            "audio" | "voice" => MessageKind::Audio,
            "document" => MessageKind::Document,
            "sticker" => MessageKind::Sticker,
            "location" => MessageKind::Location,
            "contacts" => MessageKind::Contacts,
            "interactive" => MessageKind::Interactive,
            "button" => MessageKind::Button,
            "reaction" => MessageKind::Reaction,
            "template" => MessageKind::Template,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

impl FromStr for MessageKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MessageKind::from(s))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(MessageKind::from(tag.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tag_is_preserved() {
        let kind = MessageKind::from("order");
        assert_eq!(kind, MessageKind::Other("order".into()));
        assert_eq!(kind.to_string(), "order");
    }

    #[test]
    fn media_kinds() {
        assert!(MessageKind::Image.is_media());
        assert!(MessageKind::Document.is_media());
        assert!(!MessageKind::Text.is_media());
        assert!(!MessageKind::Location.is_media());
    }

    #[test]
    fn kind_from_mime() {
        assert_eq!(MessageKind::from_mime("image/jpeg"), MessageKind::Image);
        assert_eq!(MessageKind::from_mime("image/webp"), MessageKind::Sticker);
        assert_eq!(
            MessageKind::from_mime("audio/ogg; codecs=opus"),
            MessageKind::Audio
        );
        assert_eq!(MessageKind::from_mime("application/pdf"), MessageKind::Document);
    }

    #[test]
    fn serde_uses_lowercase_tag() {
        let json = serde_json::to_string(&MessageKind::Image).unwrap();
        assert_eq!(json, "\"image\"");
        let back: MessageKind = serde_json::from_str("\"voice\"").unwrap();
        assert_eq!(back, MessageKind::Audio);
    }
}
