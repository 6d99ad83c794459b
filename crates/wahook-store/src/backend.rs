//! The persistence interface shared by all backends.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::document::DocumentStore;
use crate::error::{Result, StoreError};
use crate::models::{
    Contact, InsertOutcome, Message, MessageView, NewMessage, NewSentMessage, NewStatus,
    SentMessage, StatusRecord, StatusView,
};
use crate::sqlite::SqliteStore;

/// An ordered append log of contacts, messages and statuses, with point
/// lookups by platform id.
///
/// Implementations serialize their own writes; callers may share one
/// instance across request handlers behind an `Arc`.
pub trait MessageStore: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Create the contact if absent, then apply `name` if one is given.
    fn upsert_contact(&self, wa_id: &str, name: Option<&str>) -> Result<Contact>;

    /// Insert a message. A wamid already stored yields
    /// [`InsertOutcome::Duplicate`]; an unknown contact id is an error.
    fn insert_message(&self, message: &NewMessage) -> Result<InsertOutcome>;

    fn find_message_by_wamid(&self, wamid: &str) -> Result<Option<Message>>;

    /// Append a status to an existing message.
    fn insert_status(&self, status: &NewStatus) -> Result<StatusRecord>;

    fn insert_sent_message(&self, sent: &NewSentMessage) -> Result<SentMessage>;

    /// Insertion order.
    fn list_contacts(&self) -> Result<Vec<Contact>>;

    /// Newest first.
    fn list_messages(&self) -> Result<Vec<MessageView>>;

    /// Insertion order.
    fn list_statuses(&self) -> Result<Vec<StatusView>>;

    /// Newest first.
    fn list_sent_messages(&self) -> Result<Vec<SentMessage>>;

    /// The single file holding all data, if the backend has one and it is
    /// safe to copy right now.
    fn backing_file(&self) -> Result<Option<PathBuf>>;
}

/// Which backend to open. Parsed from `STORE_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Sqlite,
    /// JSON document on disk.
    File,
    /// JSON document in memory only.
    Memory,
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sql" => Ok(BackendKind::Sqlite),
            "file" | "json" => Ok(BackendKind::File),
            "memory" | "mem" => Ok(BackendKind::Memory),
            other => Err(StoreError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::File => "file",
            BackendKind::Memory => "memory",
        })
    }
}

/// Open the configured backend. `path` is ignored for [`BackendKind::Memory`].
pub fn open_store(kind: BackendKind, path: &Path) -> Result<Arc<dyn MessageStore>> {
    let store: Arc<dyn MessageStore> = match kind {
        BackendKind::Sqlite => Arc::new(SqliteStore::open(path)?),
        BackendKind::File => Arc::new(DocumentStore::open(path)?),
        BackendKind::Memory => Arc::new(DocumentStore::in_memory()),
    };
    tracing::info!(backend = store.backend_name(), "store opened");
    Ok(store)
}
