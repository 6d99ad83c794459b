//! Webhook verification and ingestion.
//!
//! Meta verifies the endpoint once with a `GET` challenge, then delivers
//! every inbound message and delivery status with a `POST`. Once the body
//! parses as JSON the `POST` is always acknowledged with 200, whatever
//! happens while storing it, so the platform never redelivers because of a
//! local fault.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use wahook_shared::constants::SUBSCRIBE_MODE;
use wahook_shared::outbound::OutboundMessage;
use wahook_shared::protocol::{WebhookMessage, WebhookNotification, WebhookStatus, WebhookValue};
use wahook_shared::MessageKind;
use wahook_store::{InsertOutcome, NewMessage, NewStatus};

use crate::api::AppState;
use crate::media::media_reference;
use crate::sender::send_and_record;

/// Query string of the verification request.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// The challenge to echo, or `None` when verification must be refused.
///
/// Without a configured secret nothing verifies.
pub fn verify(params: &VerifyParams, expected: Option<&str>) -> Option<String> {
    let expected = expected?;
    if params.mode.as_deref() != Some(SUBSCRIBE_MODE) {
        return None;
    }
    let token = params.verify_token.as_deref()?;

    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return None;
    }

    Some(params.challenge.clone().unwrap_or_default())
}

pub async fn verify_handler(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match verify(&params, state.config.verify_token.as_deref()) {
        Some(challenge) => {
            info!("Webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!(mode = ?params.mode, "Webhook verification refused");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

pub async fn receive_handler(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let document: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, size = body.len(), "Webhook body is not JSON");
            return StatusCode::BAD_REQUEST;
        }
    };
    debug!(payload = %document, "Webhook received");

    let notification = WebhookNotification::from_value_lossy(document);
    let report = ingest(&state, &notification).await;

    info!(
        contacts = report.contacts,
        messages = report.messages,
        duplicates = report.duplicates,
        statuses = report.statuses,
        orphan_statuses = report.orphan_statuses,
        skipped = report.skipped,
        errors = report.errors,
        "Webhook processed"
    );

    StatusCode::OK
}

/// What one notification did to the store.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub contacts: usize,
    pub messages: usize,
    pub duplicates: usize,
    pub statuses: usize,
    /// Statuses whose message is not stored here.
    pub orphan_statuses: usize,
    /// Entries lacking the id needed to store them, or unreadable ones.
    pub skipped: usize,
    pub errors: usize,
}

/// Store everything in the notification.
///
/// Within each value: contacts first, then every message (each one
/// upserts its sender before inserting), then every status. Each step
/// completes before the next starts.
pub async fn ingest(state: &AppState, notification: &WebhookNotification) -> IngestReport {
    let mut report = IngestReport::default();

    for reason in notification.rejected() {
        warn!(reason, "Unreadable webhook entry, skipping");
        report.skipped += 1;
    }

    for value in notification.values() {
        for reason in value.rejected() {
            warn!(reason, "Unreadable webhook element, skipping");
            report.skipped += 1;
        }

        ingest_contacts(state, value, &mut report);

        for message in &value.messages {
            ingest_message(state, message, &mut report).await;
        }

        for status in &value.statuses {
            ingest_status(state, status, &mut report);
        }
    }

    report
}

fn ingest_contacts(state: &AppState, value: &WebhookValue, report: &mut IngestReport) {
    for contact in &value.contacts {
        let Some(wa_id) = contact.wa_id.as_deref().filter(|id| !id.is_empty()) else {
            report.skipped += 1;
            continue;
        };
        match state.store.upsert_contact(wa_id, contact.name()) {
            Ok(_) => report.contacts += 1,
            Err(e) => {
                error!(wa_id, error = %e, "Failed to upsert contact");
                report.errors += 1;
            }
        }
    }
}

async fn ingest_message(state: &AppState, message: &WebhookMessage, report: &mut IngestReport) {
    let Some(from) = message.from.as_deref().filter(|f| !f.is_empty()) else {
        warn!(wamid = ?message.id, "Message without sender, skipping");
        report.skipped += 1;
        return;
    };

    let contact = match state.store.upsert_contact(from, None) {
        Ok(contact) => contact,
        Err(e) => {
            error!(from, error = %e, "Failed to upsert sender");
            report.errors += 1;
            return;
        }
    };

    // Redelivery: skip before downloading media a second time.
    if let Some(wamid) = message.id.as_deref() {
        match state.store.find_message_by_wamid(wamid) {
            Ok(Some(_)) => {
                debug!(wamid, "Duplicate message");
                report.duplicates += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                error!(wamid, error = %e, "Message lookup failed");
                report.errors += 1;
                return;
            }
        }
    }

    let kind = message.kind();
    let body = resolve_body(state, message, &kind).await;

    let new_message = NewMessage {
        contact_id: contact.id,
        wamid: message.id.clone(),
        kind,
        body,
        timestamp: message.unix_timestamp().unwrap_or_else(Utc::now),
    };

    match state.store.insert_message(&new_message) {
        Ok(InsertOutcome::Inserted(stored)) => {
            info!(from, wamid = ?stored.wamid, kind = %stored.kind, "Message stored");
            report.messages += 1;
            if stored.kind == MessageKind::Text {
                auto_reply(state, from).await;
            }
        }
        Ok(InsertOutcome::Duplicate) => report.duplicates += 1,
        Err(e) => {
            error!(from, wamid = ?message.id, error = %e, "Failed to store message");
            report.errors += 1;
        }
    }
}

/// Text for text-like kinds; the local media path when the download
/// succeeds; otherwise the caption or a `[kind]` placeholder.
async fn resolve_body(state: &AppState, message: &WebhookMessage, kind: &MessageKind) -> String {
    if kind.is_media() && state.config.download_media && state.graph.has_token() {
        if let Some(media) = message.media() {
            if let Some(media_id) = media.id.as_deref() {
                match download_media(state, media_id, media.filename.as_deref()).await {
                    Ok(reference) => return reference,
                    Err(e) => warn!(media_id, error = %e, "Media download failed"),
                }
            }
        }
    }

    message
        .summary()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| kind.placeholder())
}

async fn download_media(
    state: &AppState,
    media_id: &str,
    filename: Option<&str>,
) -> Result<String, crate::error::ServerError> {
    let media = state.graph.download_media(media_id).await?;
    let file_name = state
        .media
        .store(&media.data, media.mime_type.as_deref(), filename)
        .await?;
    Ok(media_reference(&file_name))
}

async fn auto_reply(state: &AppState, to: &str) {
    let Some(text) = state.config.auto_reply_text.as_deref() else {
        return;
    };
    let reply = OutboundMessage::Text {
        to: to.to_string(),
        body: text.to_string(),
    };
    if let Err(e) = send_and_record(state, &reply, None).await {
        warn!(to, error = %e, "Auto-reply failed");
    }
}

fn ingest_status(state: &AppState, status: &WebhookStatus, report: &mut IngestReport) {
    let Some(wamid) = status.id.as_deref().filter(|id| !id.is_empty()) else {
        report.skipped += 1;
        return;
    };

    let message = match state.store.find_message_by_wamid(wamid) {
        Ok(Some(message)) => message,
        Ok(None) => {
            info!(wamid, status = ?status.status, "Status for unknown message, dropped");
            report.orphan_statuses += 1;
            return;
        }
        Err(e) => {
            error!(wamid, error = %e, "Message lookup failed");
            report.errors += 1;
            return;
        }
    };

    let (error_code, error_message) = status.first_error().unwrap_or((None, None));
    let record = NewStatus {
        message_id: message.id,
        status: status.status.clone().unwrap_or_else(|| "unknown".to_string()),
        timestamp: status.unix_timestamp().unwrap_or_else(Utc::now),
        error_code,
        error_message,
    };

    match state.store.insert_status(&record) {
        Ok(_) => report.statuses += 1,
        Err(e) => {
            error!(wamid, error = %e, "Failed to store status");
            report.errors += 1;
        }
    }
}
