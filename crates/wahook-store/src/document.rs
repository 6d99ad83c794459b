//! [`MessageStore`] kept as one JSON document.
//!
//! All collections live in memory behind a mutex. When a path is set, every
//! write is committed by serializing the whole document to a sibling temp
//! file and renaming it over the original, so a crash leaves either the old
//! or the new document on disk, never a torn one.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::MessageStore;
use crate::error::{Result, StoreError};
use crate::models::{
    Contact, InsertOutcome, Message, MessageView, NewMessage, NewSentMessage, NewStatus,
    SentMessage, StatusRecord, StatusView,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Collections {
    #[serde(default)]
    contacts: Vec<Contact>,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    statuses: Vec<StatusRecord>,
    #[serde(default)]
    sent_messages: Vec<SentMessage>,
}

/// `messages.json` -> `messages.json.corrupt`, numbered if that is taken.
fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupt");
    let first = PathBuf::from(&name);
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| {
            let mut numbered = name.clone();
            numbered.push(format!(".{n}"));
            PathBuf::from(numbered)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

fn next_id<T>(items: &[T], id: impl Fn(&T) -> i64) -> i64 {
    items.iter().map(id).max().unwrap_or(0) + 1
}

pub struct DocumentStore {
    path: Option<PathBuf>,
    state: Mutex<Collections>,
}

impl DocumentStore {
    /// Load the document at `path`, or start empty if it is missing.
    ///
    /// An unreadable document is moved aside to `<name>.corrupt` and the
    /// store starts empty.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let state = match std::fs::read(path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Collections::default(),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    let aside = corrupt_path(path);
                    std::fs::rename(path, &aside)?;
                    warn!(
                        path = %path.display(),
                        moved_to = %aside.display(),
                        error = %e,
                        "unreadable store document moved aside, starting empty"
                    );
                    Collections::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Collections::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            contacts = state.contacts.len(),
            messages = state.messages.len(),
            "opened document store"
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            state: Mutex::new(state),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(Collections::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, Collections>> {
        self.state.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Persist `next` and, only once that succeeded, make it current.
    fn commit(&self, guard: &mut MutexGuard<'_, Collections>, next: Collections) -> Result<()> {
        if let Some(path) = &self.path {
            let bytes = serde_json::to_vec_pretty(&next)?;
            let tmp = path.with_extension("tmp");
            std::fs::write(&tmp, bytes)?;
            std::fs::rename(&tmp, path)?;
            debug!(path = %path.display(), "store document written");
        }
        **guard = next;
        Ok(())
    }
}

impl MessageStore for DocumentStore {
    fn backend_name(&self) -> &'static str {
        if self.path.is_some() {
            "file"
        } else {
            "memory"
        }
    }

    fn upsert_contact(&self, wa_id: &str, name: Option<&str>) -> Result<Contact> {
        let mut guard = self.state()?;
        let now = Utc::now();

        if let Some(existing) = guard.contacts.iter().find(|c| c.wa_id == wa_id) {
            let Some(name) = name else {
                return Ok(existing.clone());
            };
            if existing.name.as_deref() == Some(name) {
                return Ok(existing.clone());
            }
        }

        let mut next = guard.clone();
        let contact = match next.contacts.iter_mut().find(|c| c.wa_id == wa_id) {
            Some(existing) => {
                existing.name = name.map(str::to_string).or(existing.name.take());
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let contact = Contact {
                    id: next_id(&next.contacts, |c| c.id),
                    wa_id: wa_id.to_string(),
                    name: name.map(str::to_string),
                    created_at: now,
                    updated_at: now,
                };
                next.contacts.push(contact.clone());
                contact
            }
        };

        self.commit(&mut guard, next)?;
        Ok(contact)
    }

    fn insert_message(&self, message: &NewMessage) -> Result<InsertOutcome> {
        let mut guard = self.state()?;

        if !guard.contacts.iter().any(|c| c.id == message.contact_id) {
            return Err(StoreError::UnknownContact(message.contact_id));
        }
        if let Some(wamid) = &message.wamid {
            if guard
                .messages
                .iter()
                .any(|m| m.wamid.as_deref() == Some(wamid.as_str()))
            {
                return Ok(InsertOutcome::Duplicate);
            }
        }

        let mut next = guard.clone();
        let stored = Message {
            id: next_id(&next.messages, |m| m.id),
            contact_id: message.contact_id,
            wamid: message.wamid.clone(),
            kind: message.kind.clone(),
            body: message.body.clone(),
            timestamp: message.timestamp,
            received_at: Utc::now(),
        };
        next.messages.push(stored.clone());

        self.commit(&mut guard, next)?;
        Ok(InsertOutcome::Inserted(stored))
    }

    fn find_message_by_wamid(&self, wamid: &str) -> Result<Option<Message>> {
        let guard = self.state()?;
        Ok(guard
            .messages
            .iter()
            .find(|m| m.wamid.as_deref() == Some(wamid))
            .cloned())
    }

    fn insert_status(&self, status: &NewStatus) -> Result<StatusRecord> {
        let mut guard = self.state()?;

        if !guard.messages.iter().any(|m| m.id == status.message_id) {
            return Err(StoreError::UnknownMessage(status.message_id));
        }

        let mut next = guard.clone();
        let record = StatusRecord {
            id: next_id(&next.statuses, |s| s.id),
            message_id: status.message_id,
            status: status.status.clone(),
            timestamp: status.timestamp,
            error_code: status.error_code,
            error_message: status.error_message.clone(),
            created_at: Utc::now(),
        };
        next.statuses.push(record.clone());

        self.commit(&mut guard, next)?;
        Ok(record)
    }

    fn insert_sent_message(&self, sent: &NewSentMessage) -> Result<SentMessage> {
        let mut guard = self.state()?;

        let mut next = guard.clone();
        let record = SentMessage {
            id: next_id(&next.sent_messages, |s| s.id),
            wamid: sent.wamid.clone(),
            phone: sent.phone.clone(),
            kind: sent.kind.clone(),
            content: sent.content.clone(),
            media_path: sent.media_path.clone(),
            timestamp: Utc::now(),
        };
        next.sent_messages.push(record.clone());

        self.commit(&mut guard, next)?;
        Ok(record)
    }

    fn list_contacts(&self) -> Result<Vec<Contact>> {
        Ok(self.state()?.contacts.clone())
    }

    fn list_messages(&self) -> Result<Vec<MessageView>> {
        let guard = self.state()?;
        let mut views: Vec<MessageView> = guard
            .messages
            .iter()
            .filter_map(|m| {
                let contact = guard.contacts.iter().find(|c| c.id == m.contact_id)?;
                Some(MessageView {
                    id: m.id,
                    wamid: m.wamid.clone(),
                    phone: contact.wa_id.clone(),
                    name: contact.name.clone(),
                    kind: m.kind.clone(),
                    body: m.body.clone(),
                    timestamp: m.timestamp,
                })
            })
            .collect();
        views.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(views)
    }

    fn list_statuses(&self) -> Result<Vec<StatusView>> {
        let guard = self.state()?;
        let views = guard
            .statuses
            .iter()
            .filter_map(|s| {
                let message = guard.messages.iter().find(|m| m.id == s.message_id)?;
                let contact = guard.contacts.iter().find(|c| c.id == message.contact_id)?;
                Some(StatusView {
                    id: s.id,
                    message_id: s.message_id,
                    wamid: message.wamid.clone(),
                    phone: contact.wa_id.clone(),
                    status: s.status.clone(),
                    timestamp: s.timestamp,
                    error_code: s.error_code,
                    error_message: s.error_message.clone(),
                })
            })
            .collect();
        Ok(views)
    }

    fn list_sent_messages(&self) -> Result<Vec<SentMessage>> {
        let mut log = self.state()?.sent_messages.clone();
        log.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(log)
    }

    fn backing_file(&self) -> Result<Option<PathBuf>> {
        Ok(self.path.clone().filter(|p| p.exists()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wahook_shared::MessageKind;

    fn text(contact_id: i64, wamid: &str, secs: i64) -> NewMessage {
        NewMessage {
            contact_id,
            wamid: Some(wamid.to_string()),
            kind: MessageKind::Text,
            body: format!("body of {wamid}"),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn contact_name_survives_nameless_upsert() {
        let store = DocumentStore::in_memory();
        store.upsert_contact("111", Some("Alice")).unwrap();
        let c = store.upsert_contact("111", None).unwrap();
        assert_eq!(c.name.as_deref(), Some("Alice"));
        let c = store.upsert_contact("111", Some("Alicia")).unwrap();
        assert_eq!(c.name.as_deref(), Some("Alicia"));
        assert_eq!(store.list_contacts().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_message_is_noop() {
        let store = DocumentStore::in_memory();
        let c = store.upsert_contact("111", None).unwrap();
        assert!(!store.insert_message(&text(c.id, "wamid.A", 1)).unwrap().is_duplicate());
        assert!(store.insert_message(&text(c.id, "wamid.A", 1)).unwrap().is_duplicate());
        assert_eq!(store.list_messages().unwrap().len(), 1);
    }

    #[test]
    fn unknown_references_are_rejected() {
        let store = DocumentStore::in_memory();
        assert!(matches!(
            store.insert_message(&text(7, "wamid.A", 1)),
            Err(StoreError::UnknownContact(7))
        ));
        let status = NewStatus {
            message_id: 3,
            status: "read".into(),
            timestamp: Utc::now(),
            error_code: None,
            error_message: None,
        };
        assert!(matches!(
            store.insert_status(&status),
            Err(StoreError::UnknownMessage(3))
        ));
    }

    #[test]
    fn messages_listed_newest_first() {
        let store = DocumentStore::in_memory();
        let c = store.upsert_contact("111", Some("Alice")).unwrap();
        store.insert_message(&text(c.id, "wamid.old", 10)).unwrap();
        store.insert_message(&text(c.id, "wamid.new", 20)).unwrap();
        let views = store.list_messages().unwrap();
        assert_eq!(views[0].wamid.as_deref(), Some("wamid.new"));
        assert_eq!(views[0].name.as_deref(), Some("Alice"));
    }

    #[test]
    fn document_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");

        {
            let store = DocumentStore::open(&path).unwrap();
            let c = store.upsert_contact("111", Some("Alice")).unwrap();
            let InsertOutcome::Inserted(m) = store.insert_message(&text(c.id, "wamid.A", 1)).unwrap()
            else {
                panic!("expected insert");
            };
            store
                .insert_status(&NewStatus {
                    message_id: m.id,
                    status: "delivered".into(),
                    timestamp: Utc::now(),
                    error_code: None,
                    error_message: None,
                })
                .unwrap();
        }

        let store = DocumentStore::open(&path).unwrap();
        assert_eq!(store.list_contacts().unwrap().len(), 1);
        assert!(store.find_message_by_wamid("wamid.A").unwrap().is_some());
        assert_eq!(store.list_statuses().unwrap()[0].status, "delivered");
        assert_eq!(store.backing_file().unwrap(), Some(path));
    }

    #[test]
    fn corrupt_document_is_kept_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = DocumentStore::open(&path).unwrap();
        assert!(store.list_contacts().unwrap().is_empty());
        store.upsert_contact("111", None).unwrap();

        let aside = dir.path().join("messages.json.corrupt");
        assert_eq!(std::fs::read(&aside).unwrap(), b"{not json");

        let reopened = DocumentStore::open(&path).unwrap();
        assert_eq!(reopened.list_contacts().unwrap().len(), 1);

        // A second bad document does not overwrite the first one.
        std::fs::write(&path, b"[broken").unwrap();
        DocumentStore::open(&path).unwrap();
        assert_eq!(std::fs::read(&aside).unwrap(), b"{not json");
        assert_eq!(
            std::fs::read(dir.path().join("messages.json.corrupt.1")).unwrap(),
            b"[broken"
        );
    }
}
