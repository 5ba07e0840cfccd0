//! HTTP-backed senders: chat bot messages, generic webhook POSTs, and
//! spreadsheet-row appends.
//!
//! Each sender reads per-workflow details (chat id, message template,
//! endpoint URL) from the workflow's target config; process-wide
//! credentials come from the sender's own constructor.

use async_trait::async_trait;

use hookwire_core::config::ChatSenderConfig;
use hookwire_core::{ActionSender, DeliveryPayload, Error, Result};

use crate::template;

/// Chat message sender over the Telegram Bot API.
pub struct ChatSender {
    config: ChatSenderConfig,
    client: reqwest::Client,
}

impl ChatSender {
    pub fn new(config: ChatSenderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ActionSender for ChatSender {
    async fn send(&self, target_cfg: &serde_json::Value, payload: &DeliveryPayload) -> Result<()> {
        let chat_id = target_cfg["chat_id"]
            .as_str()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.config.chat_id);
        if chat_id.is_empty() {
            return Err(Error::Config("Chat sender: no chat_id configured".into()));
        }

        let text = match target_cfg["message"].as_str() {
            Some(tpl) => template::render(tpl, payload),
            None => default_text(payload),
        };

        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        );
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({"chat_id": chat_id, "text": text}))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| Error::Send(format!("Chat send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("Chat message sent to {chat_id}");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(Error::Send(format!("Chat API error {status}: {body}")))
        }
    }
}

/// Generic webhook sender — POSTs the payload as JSON.
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionSender for WebhookSender {
    async fn send(&self, target_cfg: &serde_json::Value, payload: &DeliveryPayload) -> Result<()> {
        let url = target_cfg["url"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("Webhook sender: missing 'url'".into()))?;

        let mut req = self
            .client
            .post(url)
            .json(&serde_json::json!({
                "workflow_id": payload.workflow_id,
                "source": payload.source.as_str(),
                "fields": payload.fields,
            }))
            .timeout(std::time::Duration::from_secs(10));

        if let Some(headers) = target_cfg["headers"].as_object() {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    req = req.header(key.as_str(), v);
                }
            }
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Send(format!("Webhook send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("Webhook delivered to {url}");
            Ok(())
        } else {
            Err(Error::Send(format!("Webhook error {}", resp.status())))
        }
    }
}

/// Spreadsheet-row append over a REST endpoint.
///
/// The target config names the endpoint and the columns to write;
/// each column value is a template rendered from the payload.
pub struct SheetAppendSender {
    client: reqwest::Client,
}

impl SheetAppendSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for SheetAppendSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionSender for SheetAppendSender {
    async fn send(&self, target_cfg: &serde_json::Value, payload: &DeliveryPayload) -> Result<()> {
        let url = target_cfg["url"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("Sheet sender: missing 'url'".into()))?;

        let row: Vec<String> = match target_cfg["columns"].as_array() {
            Some(cols) => cols
                .iter()
                .map(|c| template::render(c.as_str().unwrap_or(""), payload))
                .collect(),
            // No column mapping: write every payload field in name order.
            None => {
                let mut names = payload.field_names();
                names.sort();
                names.iter().map(|n| payload.field(n)).collect()
            }
        };

        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({"values": [row]}))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| Error::Send(format!("Sheet append failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("Row appended via {url}");
            Ok(())
        } else {
            Err(Error::Send(format!("Sheet API error {}", resp.status())))
        }
    }
}

/// Fallback message body when the workflow configures no template.
fn default_text(payload: &DeliveryPayload) -> String {
    let mut names = payload.field_names();
    names.sort();
    let lines: Vec<String> = names
        .iter()
        .map(|n| format!("{n}: {}", payload.field(n)))
        .collect();
    format!("[{}] new item\n{}", payload.source.as_str(), lines.join("\n"))
}
