//! v001 -- Initial schema creation.
//!
//! Creates `contacts`, `messages`, `statuses` and `sent_messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Contacts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS contacts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    wa_id      TEXT NOT NULL UNIQUE,          -- platform participant id
    name       TEXT,
    created_at TEXT NOT NULL,                 -- RFC-3339, UTC, micros
    updated_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Messages (inbound)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id  INTEGER NOT NULL,             -- FK -> contacts(id)
    wamid       TEXT UNIQUE,                  -- NULLs never collide
    kind        TEXT NOT NULL,
    body        TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    received_at TEXT NOT NULL,

    FOREIGN KEY (contact_id) REFERENCES contacts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_ts ON messages(timestamp DESC);

-- ----------------------------------------------------------------
-- Statuses (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS statuses (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id    INTEGER NOT NULL,           -- FK -> messages(id)
    status        TEXT NOT NULL,
    timestamp     TEXT NOT NULL,
    error_code    INTEGER,
    error_message TEXT,
    created_at    TEXT NOT NULL,

    FOREIGN KEY (message_id) REFERENCES messages(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_statuses_message_id ON statuses(message_id);

-- ----------------------------------------------------------------
-- Sent messages (outbound log)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sent_messages (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    wamid      TEXT,
    phone      TEXT NOT NULL,
    kind       TEXT NOT NULL,
    content    TEXT NOT NULL,
    media_path TEXT,
    timestamp  TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
