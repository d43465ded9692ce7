//! Configuration management

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::directory::BotRecord;
use crate::platform::SEND_API_URL;

/// Route parameter naming the bot
const APP_ID_PARAM: &str = "{app_id}";

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Webhook server bind address
    #[serde(default = "default_webhook_addr")]
    pub webhook_addr: String,

    /// Route for the handshake and event delivery; must contain `{app_id}`
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// Send API base endpoint
    #[serde(default = "default_send_api_url")]
    pub send_api_url: String,

    /// Send API request timeout in seconds
    #[serde(default = "default_send_api_timeout")]
    pub send_api_timeout_secs: u64,

    /// API key required on the outbound send endpoint (unset = open)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable debug mode (log raw payloads)
    #[serde(default)]
    pub debug_mode: bool,

    /// Bots served by the in-memory directory
    #[serde(default)]
    pub bots: Vec<BotRecord>,
}

fn default_webhook_addr() -> String {
    "0.0.0.0:8082".to_string()
}

fn default_webhook_path() -> String {
    "/messenger/{app_id}".to_string()
}

fn default_send_api_url() -> String {
    SEND_API_URL.to_string()
}

fn default_send_api_timeout() -> u64 {
    10
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            webhook_addr: default_webhook_addr(),
            webhook_path: default_webhook_path(),
            send_api_url: default_send_api_url(),
            send_api_timeout_secs: default_send_api_timeout(),
            api_key: None,
            debug_mode: false,
            bots: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let mut bots = match std::env::var("MESSENGER_BOTS_FILE") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read bots file {}", path))?;
                serde_json::from_str::<Vec<BotRecord>>(&raw)
                    .with_context(|| format!("Failed to parse bots file {}", path))?
            }
            Err(_) => Vec::new(),
        };

        if let Ok(app_id) = std::env::var("MESSENGER_APP_ID") {
            let verify_token = std::env::var("MESSENGER_VERIFY_TOKEN")
                .context("MESSENGER_VERIFY_TOKEN is required with MESSENGER_APP_ID")?;
            let secret = std::env::var("MESSENGER_APP_SECRET")
                .context("MESSENGER_APP_SECRET is required with MESSENGER_APP_ID")?;
            bots.push(BotRecord {
                app_id,
                page_id: std::env::var("MESSENGER_PAGE_ID").ok(),
                verify_token,
                secret,
                access_token: std::env::var("MESSENGER_ACCESS_TOKEN").ok(),
                context_id: std::env::var("MESSENGER_CONTEXT_ID").ok(),
            });
        }

        let config = Self {
            webhook_addr: std::env::var("WEBHOOK_ADDR").unwrap_or_else(|_| default_webhook_addr()),
            webhook_path: std::env::var("WEBHOOK_PATH").unwrap_or_else(|_| default_webhook_path()),
            send_api_url: std::env::var("SEND_API_URL")
                .unwrap_or_else(|_| default_send_api_url()),
            send_api_timeout_secs: std::env::var("SEND_API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_send_api_timeout),
            api_key: std::env::var("BRIDGE_API_KEY").ok(),
            debug_mode: std::env::var("DEBUG_MODE").is_ok(),
            bots,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the router cannot serve
    pub fn validate(&self) -> Result<()> {
        if !self.webhook_path.starts_with('/') || !self.webhook_path.contains(APP_ID_PARAM) {
            bail!(
                "WEBHOOK_PATH must start with '/' and contain {}, got {}",
                APP_ID_PARAM,
                self.webhook_path
            );
        }
        Ok(())
    }

    /// Check the key presented on the send endpoint
    pub fn is_api_key_valid(&self, presented: Option<&str>) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => presented == Some(expected.as_str()),
        }
    }
}
