//! Hookwire configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookwireConfig {
    /// Directory holding workflows.json and cursors.json.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub email: Option<EmailSenderConfig>,
    #[serde(default)]
    pub chat: Option<ChatSenderConfig>,
}

fn default_data_dir() -> String {
    "~/.hookwire".into()
}

impl Default for HookwireConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            engine: EngineConfig::default(),
            gateway: GatewayConfig::default(),
            email: None,
            chat: None,
        }
    }
}

impl HookwireConfig {
    /// Load config from the default path (~/.hookwire/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Hookwire home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hookwire")
    }
}

/// Poll-scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default poll interval for workflows without an override.
    #[serde(default = "default_poll_minutes")]
    pub default_poll_minutes: u64,
}

fn default_poll_minutes() -> u64 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_poll_minutes: default_poll_minutes(),
        }
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret for inbound webhook signatures; empty disables
    /// verification.
    #[serde(default)]
    pub webhook_secret: String,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8710
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_secret: String::new(),
        }
    }
}

/// SMTP credentials for the email sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSenderConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// Bot credentials for the chat sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSenderConfig {
    pub bot_token: String,
    /// Default chat when a workflow's target config names none.
    #[serde(default)]
    pub chat_id: String,
}
