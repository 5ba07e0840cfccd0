//! Email sender — SMTP via async lettre. Supports Gmail, Outlook,
//! custom relays through STARTTLS.

use async_trait::async_trait;

use hookwire_core::config::EmailSenderConfig;
use hookwire_core::{ActionSender, DeliveryPayload, Error, Result};

use crate::template;

/// SMTP-backed email sender. Per-workflow target config supplies the
/// recipient and subject/body templates.
pub struct EmailSender {
    config: EmailSenderConfig,
}

impl EmailSender {
    pub fn new(config: EmailSenderConfig) -> Self {
        Self { config }
    }

    async fn deliver(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        use lettre::{
            AsyncSmtpTransport, AsyncTransport, Message, message::Mailbox,
            message::header::ContentType, transport::smtp::authentication::Credentials,
        };

        let from_name = self.config.display_name.as_deref().unwrap_or("Hookwire");
        let from_mailbox: Mailbox = format!("{from_name} <{}>", self.config.email)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid from address: {e}")))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| Error::Config(format!("Invalid to address: {e}")))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Send(format!("Build email: {e}")))?;

        let creds = Credentials::new(self.config.email.clone(), self.config.password.clone());
        let mailer =
            AsyncSmtpTransport::<lettre::Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| Error::Send(format!("SMTP relay: {e}")))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| Error::Send(format!("SMTP send: {e}")))?;

        tracing::info!("Email sent to {to}");
        Ok(())
    }
}

#[async_trait]
impl ActionSender for EmailSender {
    async fn send(&self, target_cfg: &serde_json::Value, payload: &DeliveryPayload) -> Result<()> {
        let to = target_cfg["to"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("Email sender: missing 'to'".into()))?;

        let subject = target_cfg["subject"]
            .as_str()
            .map(|tpl| template::render(tpl, payload))
            .unwrap_or_else(|| format!("[{}] new item", payload.source.as_str()));
        let body = target_cfg["body"]
            .as_str()
            .map(|tpl| template::render(tpl, payload))
            .unwrap_or_else(|| {
                serde_json::to_string_pretty(&payload.fields).unwrap_or_default()
            });

        self.deliver(to, &subject, &body).await
    }
}
