use chrono::Utc;
use rusqlite::params;
use wahook_shared::MessageKind;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewSentMessage, SentMessage};
use crate::time::{fmt_ts, parse_ts};

impl Database {
    pub fn insert_sent_message(&self, sent: &NewSentMessage) -> Result<SentMessage> {
        let timestamp = Utc::now();
        self.conn().execute(
            "INSERT INTO sent_messages (wamid, phone, kind, content, media_path, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sent.wamid,
                sent.phone,
                sent.kind.as_str(),
                sent.content,
                sent.media_path,
                fmt_ts(&timestamp),
            ],
        )?;

        Ok(SentMessage {
            id: self.conn().last_insert_rowid(),
            wamid: sent.wamid.clone(),
            phone: sent.phone.clone(),
            kind: sent.kind.clone(),
            content: sent.content.clone(),
            media_path: sent.media_path.clone(),
            timestamp,
        })
    }

    /// Outbound log, newest first.
    pub fn list_sent_messages(&self) -> Result<Vec<SentMessage>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, wamid, phone, kind, content, media_path, timestamp
             FROM sent_messages
             ORDER BY timestamp DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(3)?;
            let ts_str: String = row.get(6)?;
            Ok(SentMessage {
                id: row.get(0)?,
                wamid: row.get(1)?,
                phone: row.get(2)?,
                kind: MessageKind::from(kind.as_str()),
                content: row.get(4)?,
                media_path: row.get(5)?,
                timestamp: parse_ts(6, &ts_str)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_log_newest_first() {
        let db = Database::open_in_memory().unwrap();
        for (i, body) in ["first", "second"].iter().enumerate() {
            db.insert_sent_message(&NewSentMessage {
                wamid: Some(format!("wamid.out{i}")),
                phone: "111".into(),
                kind: MessageKind::Text,
                content: body.to_string(),
                media_path: None,
            })
            .unwrap();
        }
        let log = db.list_sent_messages().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].content, "second");
        assert_eq!(log[1].wamid.as_deref(), Some("wamid.out0"));
    }
}
