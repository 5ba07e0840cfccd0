//! Action dispatcher — routes (target, action) pairs to senders.
//!
//! A routing table resolved at startup. The dispatcher itself performs
//! no I/O and holds no mutable state, so it is safe to share across
//! concurrently ticking workflows.

use std::collections::HashMap;
use std::sync::Arc;

use hookwire_core::{ActionSender, DeliveryPayload, Error, Result};

/// Immutable routing table from (target, action) to a sender.
#[derive(Default)]
pub struct Dispatcher {
    routes: HashMap<(String, String), Arc<dyn ActionSender>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sender for one (target, action) pair. Later
    /// registrations win, which keeps startup wiring order-dependent
    /// and explicit.
    pub fn register(&mut self, target: &str, action: &str, sender: Arc<dyn ActionSender>) {
        self.routes
            .insert((target.to_string(), action.to_string()), sender);
    }

    /// Route a payload. Unknown pairs fail with the distinguished
    /// `UnsupportedAction` error rather than a generic one.
    pub async fn dispatch(
        &self,
        target: &str,
        action: &str,
        target_cfg: &serde_json::Value,
        payload: &DeliveryPayload,
    ) -> Result<()> {
        let Some(sender) = self
            .routes
            .get(&(target.to_string(), action.to_string()))
        else {
            return Err(Error::UnsupportedAction {
                target: target.to_string(),
                action: action.to_string(),
            });
        };
        sender.send(target_cfg, payload).await
    }

    /// Registered (target, action) pairs, for startup logging.
    pub fn routes(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self.routes.keys().cloned().collect();
        keys.sort();
        keys
    }
}
