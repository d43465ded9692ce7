//! Bot directory: resolves the bot owning a webhook
//!
//! The handshake looks a bot up by app id; event delivery narrows the lookup
//! to the page id of the first entry.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::PLATFORM;

/// Lookup key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotQuery {
    pub app_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub platform: &'static str,
}

impl BotQuery {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            client_id: None,
            platform: PLATFORM,
        }
    }

    pub fn with_client(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }
}

/// Bot credentials and context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotRecord {
    pub app_id: String,
    /// Page id; when set, events from other pages are rejected
    #[serde(default)]
    pub page_id: Option<String>,
    /// Token echoed back during the subscription handshake
    pub verify_token: String,
    /// App secret keying the payload signature
    pub secret: String,
    /// Page access token for the Send API
    #[serde(default)]
    pub access_token: Option<String>,
    /// Context id stamped on decoded senders
    #[serde(default)]
    pub context_id: Option<String>,
}

/// Identity lookup collaborator
#[async_trait]
pub trait BotDirectory: Send + Sync {
    async fn fetch(&self, query: &BotQuery) -> Result<BotRecord>;
}

/// In-memory directory keyed by app id
#[derive(Default)]
pub struct StaticDirectory {
    bots: DashMap<String, BotRecord>,
}

impl StaticDirectory {
    pub fn new(bots: impl IntoIterator<Item = BotRecord>) -> Self {
        let directory = Self::default();
        for bot in bots {
            directory.insert(bot);
        }
        directory
    }

    pub fn insert(&self, bot: BotRecord) {
        debug!("Registering bot for app {}", bot.app_id);
        self.bots.insert(bot.app_id.clone(), bot);
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }
}

#[async_trait]
impl BotDirectory for StaticDirectory {
    async fn fetch(&self, query: &BotQuery) -> Result<BotRecord> {
        let bot = self
            .bots
            .get(&query.app_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| anyhow!("No bot registered for app {}", query.app_id))?;

        if let (Some(expected), Some(client_id)) = (&bot.page_id, &query.client_id)
            && expected != client_id
        {
            return Err(anyhow!(
                "Page {} does not belong to app {}",
                client_id,
                query.app_id
            ));
        }

        Ok(bot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> BotRecord {
        BotRecord {
            app_id: "APP1".to_string(),
            page_id: Some("PAGE1".to_string()),
            verify_token: "verify".to_string(),
            secret: "secret".to_string(),
            access_token: Some("token".to_string()),
            context_id: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_by_app() {
        let directory = StaticDirectory::new([bot()]);
        let found = directory.fetch(&BotQuery::new("APP1")).await.unwrap();
        assert_eq!(found.verify_token, "verify");
        assert!(directory.fetch(&BotQuery::new("APP2")).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_checks_page() {
        let directory = StaticDirectory::new([bot()]);

        let ok = BotQuery::new("APP1").with_client(Some("PAGE1".to_string()));
        assert!(directory.fetch(&ok).await.is_ok());

        let other = BotQuery::new("APP1").with_client(Some("PAGE2".to_string()));
        assert!(directory.fetch(&other).await.is_err());
    }

    #[test]
    fn test_bot_record_parsing() {
        let bots: Vec<BotRecord> = serde_json::from_str(
            r#"[{"appId": "A", "verifyToken": "v", "secret": "s", "accessToken": "t"}]"#,
        )
        .unwrap();
        assert_eq!(bots[0].access_token.as_deref(), Some("t"));
        assert!(bots[0].page_id.is_none());
    }

    #[test]
    fn test_query_serialize() {
        let query = BotQuery::new("APP1");
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            serde_json::json!({"appId": "APP1", "platform": "messenger"})
        );
    }
}
