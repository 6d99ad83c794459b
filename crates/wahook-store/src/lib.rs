//! # wahook-store
//!
//! Persistence for inbound WhatsApp traffic: contacts, messages, delivery
//! statuses and the outbound send log.
//!
//! Handlers talk to the [`MessageStore`] trait. Two backends implement it:
//! [`SqliteStore`], a `rusqlite` database with typed CRUD helpers on
//! [`Database`], and [`DocumentStore`], a single JSON document kept either
//! on disk or purely in memory.

pub mod backend;
pub mod contacts;
pub mod database;
pub mod document;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod sent;
pub mod sqlite;
pub mod statuses;

mod error;
mod time;

pub use backend::{open_store, BackendKind, MessageStore};
pub use database::Database;
pub use document::DocumentStore;
pub use error::{Result, StoreError};
pub use models::*;
pub use sqlite::SqliteStore;
