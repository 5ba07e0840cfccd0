//! Webhook fan-out — the push-driven sibling of the poller.
//!
//! One inbound event goes to every enabled webhook workflow whose
//! configured path matches, not just the first. No cursor: delivery is
//! push-driven, and per-workflow failures stay internal.

use hookwire_core::{DeliveryPayload, Workflow};

use crate::dispatch::Dispatcher;
use crate::filter;

/// Result of fanning one inbound event out to a path's workflows.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FanoutOutcome {
    /// The inbound path, echoed back as the result id.
    pub id: String,
    /// Workflows that accepted the event without a dispatch error.
    pub delivered: usize,
    /// Workflows that matched the path (delivered + filtered + failed).
    pub matched: usize,
}

/// Deliver an inbound webhook body to all matching workflows.
///
/// Matching: enabled, source = webhook, configured path string-equal
/// to the inbound path. Each match gets a payload wrapping the body,
/// runs its filter chain, and is dispatched synchronously. An error
/// for one workflow is logged and never blocks the others.
pub async fn fan_out(
    workflows: &[Workflow],
    path: &str,
    body: &serde_json::Value,
    dispatcher: &Dispatcher,
) -> FanoutOutcome {
    let mut delivered = 0;
    let mut matched = 0;

    for workflow in workflows {
        if !workflow.enabled
            || !matches!(workflow.source, hookwire_core::SourceKind::Webhook)
            || workflow.webhook_path() != Some(path)
        {
            continue;
        }
        matched += 1;

        let payload = webhook_payload(workflow, path, body);
        if !filter::passes(&payload, &workflow.filters) {
            tracing::debug!("Webhook event filtered out by workflow {}", workflow.id);
            continue;
        }

        match dispatcher
            .dispatch(&workflow.target, &workflow.action, &workflow.params.target, &payload)
            .await
        {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::warn!("Webhook delivery failed for workflow {}: {e}", workflow.id);
            }
        }
    }

    FanoutOutcome {
        id: path.to_string(),
        delivered,
        matched,
    }
}

/// Wrap the inbound body into the flat payload shape. Object bodies
/// keep their top-level fields for filtering/templating; anything else
/// lands under "body".
fn webhook_payload(workflow: &Workflow, path: &str, body: &serde_json::Value) -> DeliveryPayload {
    let mut fields = body.as_object().cloned().unwrap_or_default();
    fields.insert("path".into(), path.into());
    if !body.is_object() {
        fields.insert("body".into(), body.clone());
    }
    DeliveryPayload::new(workflow, serde_json::Value::Object(fields))
}
