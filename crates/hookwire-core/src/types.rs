//! Workflow definitions — the core data model for trigger→action rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a workflow's items come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Spreadsheet,
    Mailbox,
    Board,
    Webhook,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Spreadsheet => "spreadsheet",
            SourceKind::Mailbox => "mailbox",
            SourceKind::Board => "board",
            SourceKind::Webhook => "webhook",
        }
    }

    /// Webhook workflows are push-driven and never polled.
    pub fn is_polled(&self) -> bool {
        !matches!(self, SourceKind::Webhook)
    }
}

/// What event on the source fires the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    NewRow,
    NewMessage,
    NewItem,
    WebhookReceived,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::NewRow => "new_row",
            TriggerKind::NewMessage => "new_message",
            TriggerKind::NewItem => "new_item",
            TriggerKind::WebhookReceived => "webhook_received",
        }
    }
}

/// One field comparison in a workflow's filter chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Predicate {
    /// Payload field name (matched case-insensitively).
    pub field: String,
    pub op: PredicateOp,
    #[serde(default)]
    pub value: String,
}

/// Comparison operators. Unrecognized ops deserialize to `Unknown`
/// and always pass — a bad predicate must not brick the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PredicateOp {
    Equals,
    Contains,
    NotEmpty,
    #[serde(other)]
    Unknown,
}

/// Per-workflow connector and sender configuration blobs.
///
/// The shapes are owned by the concrete connector/sender; the engine
/// only carries them through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowParams {
    #[serde(default)]
    pub source: serde_json::Value,
    #[serde(default)]
    pub target: serde_json::Value,
}

/// A registered trigger→action rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique, creation-ordered id.
    pub id: String,
    pub enabled: bool,
    pub source: SourceKind,
    pub trigger: TriggerKind,
    /// Sink name, e.g. "email", "chat", "sheet".
    pub target: String,
    /// Action name on the sink, e.g. "send", "append".
    pub action: String,
    #[serde(default)]
    pub params: WorkflowParams,
    #[serde(default)]
    pub filters: Vec<Predicate>,
    /// Poll interval override; engine default applies when absent.
    #[serde(default)]
    pub poll_minutes: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Build from a draft, assigning a fresh id.
    pub fn from_draft(draft: WorkflowDraft) -> Self {
        Self {
            id: workflow_id(),
            enabled: true,
            source: draft.source,
            trigger: draft.trigger,
            target: draft.target,
            action: draft.action,
            params: draft.params,
            filters: draft.filters,
            poll_minutes: draft.poll_minutes,
            created_at: Utc::now(),
        }
    }

    /// Identity of the watched source, used to namespace cursors.
    /// Two workflows on the same sheet still get distinct keys because
    /// the workflow id is appended by the store key.
    pub fn source_identity(&self) -> String {
        let cfg = &self.params.source;
        let detail = cfg["sheet_id"]
            .as_str()
            .or_else(|| cfg["mailbox"].as_str())
            .or_else(|| cfg["board_id"].as_str())
            .or_else(|| cfg["url"].as_str())
            .unwrap_or("default");
        format!("{}:{}", self.source.as_str(), detail)
    }

    /// Inbound path for webhook-sourced workflows.
    pub fn webhook_path(&self) -> Option<&str> {
        self.params.source["path"].as_str()
    }
}

/// User-supplied workflow fields, before an id is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDraft {
    pub source: SourceKind,
    pub trigger: TriggerKind,
    pub target: String,
    pub action: String,
    #[serde(default)]
    pub params: WorkflowParams,
    #[serde(default)]
    pub filters: Vec<Predicate>,
    #[serde(default)]
    pub poll_minutes: Option<u64>,
}

/// A raw item handed back by a source connector, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceItem {
    /// Position of this item in the source (1-based row index,
    /// message uid, item number).
    pub position: u64,
    /// Source-shaped data; the connector's `to_payload` flattens it.
    pub data: serde_json::Value,
}

/// The item-shaped object handed to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub workflow_id: String,
    pub source: SourceKind,
    /// Flat JSON object; keys are matched case-insensitively by the
    /// filter evaluator and the templating layer.
    pub fields: serde_json::Value,
}

impl DeliveryPayload {
    pub fn new(workflow: &Workflow, fields: serde_json::Value) -> Self {
        Self {
            workflow_id: workflow.id.clone(),
            source: workflow.source,
            fields,
        }
    }

    /// Case-insensitive field lookup. Missing or non-scalar fields
    /// resolve to the empty string.
    pub fn field(&self, name: &str) -> String {
        let Some(obj) = self.fields.as_object() else {
            return String::new();
        };
        let found = obj
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v);
        match found {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(serde_json::Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    /// All field names present on the payload.
    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .as_object()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Creation-ordered workflow id: millisecond timestamp plus a random
/// suffix to break ties within the same millisecond.
fn workflow_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix: u16 = rand::random();
    format!("wf-{millis:x}-{suffix:04x}")
}
