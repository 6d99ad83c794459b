use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. writing the JSON document).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON document could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// A message referenced a contact id that does not exist.
    #[error("Unknown contact id {0}")]
    UnknownContact(i64),

    /// A status referenced a message id that does not exist.
    #[error("Unknown message id {0}")]
    UnknownMessage(i64),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Unrecognised `STORE_BACKEND` value.
    #[error("Unknown store backend: {0}")]
    UnknownBackend(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
