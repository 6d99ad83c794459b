//! [`MessageStore`] over a [`Database`].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::backend::MessageStore;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{
    Contact, InsertOutcome, Message, MessageView, NewMessage, NewSentMessage, NewStatus,
    SentMessage, StatusRecord, StatusView,
};

/// A single SQLite connection guarded by a mutex.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl MessageStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn upsert_contact(&self, wa_id: &str, name: Option<&str>) -> Result<Contact> {
        self.db()?.upsert_contact(wa_id, name)
    }

    fn insert_message(&self, message: &NewMessage) -> Result<InsertOutcome> {
        self.db()?.insert_message(message)
    }

    fn find_message_by_wamid(&self, wamid: &str) -> Result<Option<Message>> {
        self.db()?.get_message_by_wamid(wamid)
    }

    fn insert_status(&self, status: &NewStatus) -> Result<StatusRecord> {
        self.db()?.insert_status(status)
    }

    fn insert_sent_message(&self, sent: &NewSentMessage) -> Result<SentMessage> {
        self.db()?.insert_sent_message(sent)
    }

    fn list_contacts(&self) -> Result<Vec<Contact>> {
        self.db()?.list_contacts()
    }

    fn list_messages(&self) -> Result<Vec<MessageView>> {
        self.db()?.list_message_views()
    }

    fn list_statuses(&self) -> Result<Vec<StatusView>> {
        self.db()?.list_status_views()
    }

    fn list_sent_messages(&self) -> Result<Vec<SentMessage>> {
        self.db()?.list_sent_messages()
    }

    fn backing_file(&self) -> Result<Option<PathBuf>> {
        let db = self.db()?;
        let Some(path) = db.path() else {
            return Ok(None);
        };
        db.checkpoint()?;
        Ok(Some(path))
    }
}
