use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Contact;
use crate::time::{fmt_ts, parse_ts};

const CONTACT_COLUMNS: &str = "id, wa_id, name, created_at, updated_at";

impl Database {
    /// Insert the contact if absent; set its name when one is given.
    ///
    /// A `None` name leaves any stored name untouched.
    pub fn upsert_contact(&self, wa_id: &str, name: Option<&str>) -> Result<Contact> {
        let now = fmt_ts(&Utc::now());

        self.conn().execute(
            "INSERT INTO contacts (wa_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(wa_id) DO UPDATE SET
                 name = COALESCE(excluded.name, contacts.name),
                 updated_at = excluded.updated_at",
            params![wa_id, name, now],
        )?;

        self.get_contact_by_wa_id(wa_id)?
            .ok_or(StoreError::NotFound)
    }

    pub fn get_contact_by_wa_id(&self, wa_id: &str) -> Result<Option<Contact>> {
        let contact = self
            .conn()
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE wa_id = ?1"),
                params![wa_id],
                row_to_contact,
            )
            .optional()?;
        Ok(contact)
    }

    pub fn contact_exists(&self, id: i64) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row("SELECT id FROM contacts WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// All contacts in insertion order.
    pub fn list_contacts(&self) -> Result<Vec<Contact>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY id ASC"))?;
        let rows = stmt.query_map([], row_to_contact)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    let created_str: String = row.get(3)?;
    let updated_str: String = row.get(4)?;

    Ok(Contact {
        id: row.get(0)?,
        wa_id: row.get(1)?,
        name: row.get(2)?,
        created_at: parse_ts(3, &created_str)?,
        updated_at: parse_ts(4, &updated_str)?,
    })
}
