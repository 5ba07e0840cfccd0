//! Connector and sender contracts.
//!
//! The engine talks to the outside world only through these two
//! traits. Concrete implementations live in `hookwire-channels` (or
//! in downstream code); tests inject fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DeliveryPayload, SourceItem, Workflow};

/// "Fetch new items since cursor" contract consumed by the poller.
///
/// Markers are uniformly `u64`: a row count, a next-assignable message
/// uid, an item count. Connectors for sources with opaque tokens must
/// map them to a monotonic counter.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// The current end marker of the source (total row count, next
    /// message uid). Items at positions `<= current_end` exist.
    async fn current_end(&self, source_cfg: &serde_json::Value) -> Result<u64>;

    /// Fetch items strictly after `lower_exclusive` up to and
    /// including `upper_inclusive`, oldest first.
    async fn fetch_range(
        &self,
        source_cfg: &serde_json::Value,
        lower_exclusive: u64,
        upper_inclusive: u64,
    ) -> Result<Vec<SourceItem>>;

    /// Map a raw item into the flat, templating-friendly payload shape.
    fn to_payload(&self, item: &SourceItem, workflow: &Workflow) -> DeliveryPayload;
}

/// "Deliver to a sink" contract consumed by the dispatcher.
///
/// Returning `Err` is the only failure signal; the dispatcher never
/// inspects sentinel values.
#[async_trait]
pub trait ActionSender: Send + Sync {
    async fn send(&self, target_cfg: &serde_json::Value, payload: &DeliveryPayload) -> Result<()>;
}
