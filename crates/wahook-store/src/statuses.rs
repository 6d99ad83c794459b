use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewStatus, StatusRecord, StatusView};
use crate::time::{fmt_ts, parse_ts};

impl Database {
    /// Append a status record to an existing message.
    pub fn insert_status(&self, status: &NewStatus) -> Result<StatusRecord> {
        let exists: Option<i64> = self
            .conn()
            .query_row(
                "SELECT id FROM messages WHERE id = ?1",
                params![status.message_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::UnknownMessage(status.message_id));
        }

        let created_at = Utc::now();
        self.conn().execute(
            "INSERT INTO statuses (message_id, status, timestamp, error_code, error_message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                status.message_id,
                status.status,
                fmt_ts(&status.timestamp),
                status.error_code,
                status.error_message,
                fmt_ts(&created_at),
            ],
        )?;

        Ok(StatusRecord {
            id: self.conn().last_insert_rowid(),
            message_id: status.message_id,
            status: status.status.clone(),
            timestamp: status.timestamp,
            error_code: status.error_code,
            error_message: status.error_message.clone(),
            created_at,
        })
    }

    /// All status records in insertion order, joined with message and contact.
    pub fn list_status_views(&self) -> Result<Vec<StatusView>> {
        let mut stmt = self.conn().prepare(
            "SELECT s.id, s.message_id, m.wamid, c.wa_id, s.status, s.timestamp,
                    s.error_code, s.error_message
             FROM statuses s
             JOIN messages m ON m.id = s.message_id
             JOIN contacts c ON c.id = m.contact_id
             ORDER BY s.id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            let ts_str: String = row.get(5)?;
            Ok(StatusView {
                id: row.get(0)?,
                message_id: row.get(1)?,
                wamid: row.get(2)?,
                phone: row.get(3)?,
                status: row.get(4)?,
                timestamp: parse_ts(5, &ts_str)?,
                error_code: row.get(6)?,
                error_message: row.get(7)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}
