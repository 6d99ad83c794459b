use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use wahook_shared::MessageKind;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{InsertOutcome, Message, MessageView, NewMessage};
use crate::time::{fmt_ts, parse_ts};

impl Database {
    /// Insert an inbound message. A repeated wamid is a no-op.
    pub fn insert_message(&self, message: &NewMessage) -> Result<InsertOutcome> {
        if !self.contact_exists(message.contact_id)? {
            return Err(StoreError::UnknownContact(message.contact_id));
        }

        let received_at = Utc::now();
        let affected = self.conn().execute(
            "INSERT INTO messages (contact_id, wamid, kind, body, timestamp, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(wamid) DO NOTHING",
            params![
                message.contact_id,
                message.wamid,
                message.kind.as_str(),
                message.body,
                fmt_ts(&message.timestamp),
                fmt_ts(&received_at),
            ],
        )?;

        if affected == 0 {
            return Ok(InsertOutcome::Duplicate);
        }

        Ok(InsertOutcome::Inserted(Message {
            id: self.conn().last_insert_rowid(),
            contact_id: message.contact_id,
            wamid: message.wamid.clone(),
            kind: message.kind.clone(),
            body: message.body.clone(),
            timestamp: message.timestamp,
            received_at,
        }))
    }

    pub fn get_message_by_wamid(&self, wamid: &str) -> Result<Option<Message>> {
        let message = self
            .conn()
            .query_row(
                "SELECT id, contact_id, wamid, kind, body, timestamp, received_at
                 FROM messages WHERE wamid = ?1",
                params![wamid],
                row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    /// All messages joined with their contact, newest first.
    pub fn list_message_views(&self) -> Result<Vec<MessageView>> {
        let mut stmt = self.conn().prepare(
            "SELECT m.id, m.wamid, c.wa_id, c.name, m.kind, m.body, m.timestamp
             FROM messages m
             JOIN contacts c ON c.id = m.contact_id
             ORDER BY m.timestamp DESC, m.id DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(4)?;
            let ts_str: String = row.get(6)?;
            Ok(MessageView {
                id: row.get(0)?,
                wamid: row.get(1)?,
                phone: row.get(2)?,
                name: row.get(3)?,
                kind: MessageKind::from(kind.as_str()),
                body: row.get(5)?,
                timestamp: parse_ts(6, &ts_str)?,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let kind: String = row.get(3)?;
    let ts_str: String = row.get(5)?;
    let received_str: String = row.get(6)?;

    Ok(Message {
        id: row.get(0)?,
        contact_id: row.get(1)?,
        wamid: row.get(2)?,
        kind: MessageKind::from(kind.as_str()),
        body: row.get(4)?,
        timestamp: parse_ts(5, &ts_str)?,
        received_at: parse_ts(6, &received_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn new_message(contact_id: i64, wamid: Option<&str>, secs: i64, body: &str) -> NewMessage {
        NewMessage {
            contact_id,
            wamid: wamid.map(str::to_string),
            kind: MessageKind::Text,
            body: body.to_string(),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn duplicate_wamid_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        let c = db.upsert_contact("111", None).unwrap();

        let first = db
            .insert_message(&new_message(c.id, Some("wamid.A"), 1, "hi"))
            .unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));

        let second = db
            .insert_message(&new_message(c.id, Some("wamid.A"), 1, "hi"))
            .unwrap();
        assert!(second.is_duplicate());
        assert_eq!(db.list_message_views().unwrap().len(), 1);
    }

    #[test]
    fn messages_without_wamid_never_collide() {
        let db = Database::open_in_memory().unwrap();
        let c = db.upsert_contact("111", None).unwrap();
        db.insert_message(&new_message(c.id, None, 1, "a")).unwrap();
        db.insert_message(&new_message(c.id, None, 2, "b")).unwrap();
        assert_eq!(db.list_message_views().unwrap().len(), 2);
    }

    #[test]
    fn unknown_contact_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .insert_message(&new_message(42, Some("wamid.X"), 1, "hi"))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownContact(42)));
    }

    #[test]
    fn views_are_newest_first_and_joined() {
        let db = Database::open_in_memory().unwrap();
        let c = db.upsert_contact("111", Some("Alice")).unwrap();
        db.insert_message(&new_message(c.id, Some("wamid.old"), 100, "old"))
            .unwrap();
        db.insert_message(&new_message(c.id, Some("wamid.new"), 200, "new"))
            .unwrap();

        let views = db.list_message_views().unwrap();
        assert_eq!(views[0].body, "new");
        assert_eq!(views[1].body, "old");
        assert_eq!(views[0].phone, "111");
        assert_eq!(views[0].name.as_deref(), Some("Alice"));
    }

    #[test]
    fn lookup_by_wamid() {
        let db = Database::open_in_memory().unwrap();
        let c = db.upsert_contact("111", None).unwrap();
        db.insert_message(&new_message(c.id, Some("wamid.A"), 1, "hi"))
            .unwrap();

        let found = db.get_message_by_wamid("wamid.A").unwrap().unwrap();
        assert_eq!(found.contact_id, c.id);
        assert_eq!(found.body, "hi");
        assert!(db.get_message_by_wamid("wamid.missing").unwrap().is_none());
    }
}
