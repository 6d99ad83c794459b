//! Domain model structs persisted by every backend.
//!
//! Stored records derive `Serialize` and `Deserialize` so the document
//! backend can keep them as-is; the joined `*View` structs are what the
//! read endpoints hand out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wahook_shared::MessageKind;

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

/// A conversation participant, keyed by WhatsApp id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: i64,
    /// Platform id (phone-number-like), unique.
    pub wa_id: String,
    /// Last profile name seen. Never cleared by a payload without one.
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// An inbound message. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub contact_id: i64,
    /// Platform message id, unique when present.
    pub wamid: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Text, caption, placeholder, or the local path of downloaded media.
    pub body: String,
    /// Send time reported by the platform.
    pub timestamp: DateTime<Utc>,
    /// When this server stored it.
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub contact_id: i64,
    pub wamid: Option<String>,
    pub kind: MessageKind,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of [`crate::MessageStore::insert_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Message),
    /// A message with the same wamid was already stored.
    Duplicate,
}

impl InsertOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOutcome::Duplicate)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// One delivery-state update. Append-only; a message accumulates several.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub id: i64,
    pub message_id: i64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStatus {
    pub message_id: i64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Sent message log
// ---------------------------------------------------------------------------

/// A message sent through the Graph API by this server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SentMessage {
    pub id: i64,
    /// Message id returned by the Graph API.
    pub wamid: Option<String>,
    pub phone: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub media_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSentMessage {
    pub wamid: Option<String>,
    pub phone: String,
    pub kind: MessageKind,
    pub content: String,
    pub media_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Read views
// ---------------------------------------------------------------------------

/// A message joined with its contact.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub wamid: Option<String>,
    pub phone: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// A status record joined with its message and contact.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub id: i64,
    pub message_id: i64,
    pub wamid: Option<String>,
    pub phone: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}
