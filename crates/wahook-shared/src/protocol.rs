//! Inbound WhatsApp Cloud API webhook schema.
//!
//! Meta delivers notifications as
//! `entry[].changes[].value.{contacts,messages,statuses}`. Every field here
//! is optional or defaulted: a payload missing any part of that tree still
//! deserializes, and the missing part is simply skipped by the consumer.
//! `null` counts as missing. Nested objects of the wrong shape read as
//! absent, and list elements that cannot be read at all are dropped one by
//! one into [`LenientList::rejected`] without touching their siblings.

use std::ops::Deref;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::MessageKind;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Top-level webhook notification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookNotification {
    /// Normally `"whatsapp_business_account"`.
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: LenientList<WebhookEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEntry {
    /// WhatsApp Business Account id.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: LenientList<WebhookChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<WebhookValue>,
}

/// The payload of a single change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messaging_product: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub contacts: LenientList<WebhookContact>,
    #[serde(default)]
    pub messages: LenientList<WebhookMessage>,
    #[serde(default)]
    pub statuses: LenientList<WebhookStatus>,
}

impl WebhookValue {
    /// Contacts, messages and statuses that could not be read.
    pub fn rejected(&self) -> impl Iterator<Item = &str> {
        self.contacts
            .rejected()
            .iter()
            .chain(self.messages.rejected())
            .chain(self.statuses.rejected())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    #[serde(default)]
    pub phone_number_id: Option<String>,
}

impl WebhookNotification {
    /// Every `value` across every entry and change, in delivery order.
    pub fn values(&self) -> impl Iterator<Item = &WebhookValue> {
        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .filter_map(|change| change.value.as_ref())
    }

    /// Entries and changes that could not be read, with the reason.
    pub fn rejected(&self) -> impl Iterator<Item = &str> {
        self.entry
            .rejected()
            .iter()
            .chain(self.entry.iter().flat_map(|e| e.changes.rejected()))
            .map(String::as_str)
    }

    /// Lenient conversion from an already-parsed JSON document.
    ///
    /// A document that is not an object at all (e.g. an array) yields an
    /// empty notification rather than an error.
    pub fn from_value_lossy(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Webhook document is not a notification, ignoring it");
            Self::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookContact {
    /// Stable WhatsApp id of the participant.
    #[serde(default)]
    pub wa_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub profile: Option<WebhookProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookProfile {
    #[serde(default)]
    pub name: Option<String>,
}

impl WebhookContact {
    /// The profile name, if present and non-blank.
    pub fn name(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookMessage {
    /// Sender's WhatsApp id.
    #[serde(default)]
    pub from: Option<String>,
    /// Platform message id (`wamid.…`).
    #[serde(default)]
    pub id: Option<String>,
    /// Unix seconds, delivered as a string.
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: Option<String>,
    #[serde(default, rename = "type")]
    pub msg_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub text: Option<TextContent>,
    #[serde(default, deserialize_with = "lenient")]
    pub image: Option<MediaObject>,
    #[serde(default, deserialize_with = "lenient")]
    pub video: Option<MediaObject>,
    #[serde(default, deserialize_with = "lenient")]
    pub audio: Option<MediaObject>,
    #[serde(default, deserialize_with = "lenient")]
    pub voice: Option<MediaObject>,
    #[serde(default, deserialize_with = "lenient")]
    pub document: Option<MediaObject>,
    #[serde(default, deserialize_with = "lenient")]
    pub sticker: Option<MediaObject>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "lenient")]
    pub button: Option<ButtonReply>,
    #[serde(default, deserialize_with = "lenient")]
    pub reaction: Option<Reaction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub body: Option<String>,
}

/// Reference to media hosted by Meta, fetched through `GET /{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ButtonReply {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reaction {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
}

impl WebhookMessage {
    pub fn kind(&self) -> MessageKind {
        match self.msg_type.as_deref() {
            Some(tag) if !tag.is_empty() => MessageKind::from(tag),
            _ if self.text.is_some() => MessageKind::Text,
            _ => MessageKind::Other("unknown".to_string()),
        }
    }

    /// The media object matching this message's kind, if it has one.
    pub fn media(&self) -> Option<&MediaObject> {
        match self.kind() {
            MessageKind::Image => self.image.as_ref(),
            MessageKind::Video => self.video.as_ref(),
            MessageKind::Audio => self.audio.as_ref().or(self.voice.as_ref()),
            MessageKind::Document => self.document.as_ref(),
            MessageKind::Sticker => self.sticker.as_ref(),
            _ => None,
        }
    }

    pub fn text_body(&self) -> Option<&str> {
        self.text.as_ref().and_then(|t| t.body.as_deref())
    }

    /// Best-effort human-readable body for non-media kinds.
    pub fn summary(&self) -> Option<String> {
        match self.kind() {
            MessageKind::Text => self.text_body().map(str::to_string),
            MessageKind::Location => self.location.as_ref().map(|loc| {
                let coords = format!(
                    "{},{}",
                    loc.latitude.unwrap_or_default(),
                    loc.longitude.unwrap_or_default()
                );
                match loc.name.as_deref() {
                    Some(name) => format!("{name} ({coords})"),
                    None => coords,
                }
            }),
            MessageKind::Button => self.button.as_ref().and_then(|b| b.text.clone()),
            MessageKind::Reaction => self.reaction.as_ref().and_then(|r| r.emoji.clone()),
            _ => self.media().and_then(|m| m.caption.clone()),
        }
    }

    pub fn unix_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_unix_seconds(self.timestamp.as_deref()?)
    }
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Delivery-state update for a message previously sent by the business.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookStatus {
    /// Platform message id the status refers to.
    #[serde(default)]
    pub id: Option<String>,
    /// `sent`, `delivered`, `read`, `failed`, ...
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub errors: LenientList<StatusError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl WebhookStatus {
    pub fn unix_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_unix_seconds(self.timestamp.as_deref()?)
    }

    /// Code and text of the first reported error.
    pub fn first_error(&self) -> Option<(Option<i64>, Option<String>)> {
        self.errors.first().map(|e| {
            let text = e.message.clone().or_else(|| e.title.clone());
            (e.code, text)
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `0000-01-01T00:00:00Z`, the earliest instant with a four-digit year.
const MIN_UNIX_SECONDS: i64 = -62_167_219_200;
/// `9999-12-31T23:59:59Z`.
const MAX_UNIX_SECONDS: i64 = 253_402_300_799;

/// Unix seconds to a timestamp, refusing instants outside years 0 to 9999
/// so that every accepted value has a four-digit RFC 3339 form.
fn parse_unix_seconds(raw: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = raw.trim().parse().ok()?;
    if !(MIN_UNIX_SECONDS..=MAX_UNIX_SECONDS).contains(&secs) {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}

/// A JSON array read element by element.
///
/// `null` or a missing key is an empty list. An element that does not fit
/// `T` is left out and its error kept in [`rejected`](Self::rejected); a
/// value that is not an array at all is one rejection.
#[derive(Debug, Clone)]
pub struct LenientList<T> {
    items: Vec<T>,
    rejected: Vec<String>,
}

impl<T> LenientList<T> {
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }
}

impl<T> Default for LenientList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> From<Vec<T>> for LenientList<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items,
            rejected: Vec::new(),
        }
    }
}

impl<T> Deref for LenientList<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<'a, T> IntoIterator for &'a LenientList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for LenientList<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut list = Self::default();
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => {}
            Some(Value::Array(elements)) => {
                for (index, element) in elements.into_iter().enumerate() {
                    match serde_json::from_value(element) {
                        Ok(item) => list.items.push(item),
                        Err(e) => list.rejected.push(format!("element {index}: {e}")),
                    }
                }
            }
            Some(other) => list
                .rejected
                .push(format!("expected an array, found {}", json_kind(&other))),
        }
        Ok(list)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// An optional nested object; `null` or a value of the wrong shape is `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|value| serde_json::from_value(value).ok()))
}

/// Accept `"1700000000"`, `1700000000`, or `null`.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
