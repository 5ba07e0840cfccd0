//! # Hookwire Channels
//!
//! Reference implementations of the engine's two contracts: senders
//! for the common sinks (SMTP email, chat bot message, generic webhook
//! POST, spreadsheet-row append) and a generic REST source connector.
//! The engine only ever sees these through the core traits.

pub mod email;
pub mod senders;
pub mod sources;
pub mod template;

pub use email::EmailSender;
pub use senders::{ChatSender, SheetAppendSender, WebhookSender};
pub use sources::RestSource;
pub use template::render;
