//! # Hookwire Core
//!
//! Shared building blocks for the Hookwire workflow-automation backend:
//! the workflow data model, the TOML configuration system, the error
//! type, and the two contracts everything else plugs into —
//! [`traits::SourceConnector`] (fetch new items since a cursor) and
//! [`traits::ActionSender`] (deliver a payload to a sink).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::HookwireConfig;
pub use error::{Error, Result};
pub use traits::{ActionSender, SourceConnector};
pub use types::{
    DeliveryPayload, Predicate, PredicateOp, SourceItem, SourceKind, TriggerKind, Workflow,
    WorkflowDraft, WorkflowParams,
};
