//! # wahook-shared
//!
//! Wire types shared between the store and the server: the inbound
//! WhatsApp Cloud API webhook schema, message kinds, and the request bodies
//! sent back to the Graph API.

pub mod constants;
pub mod outbound;
pub mod protocol;
pub mod types;

pub use types::MessageKind;
