//! Send API client
//!
//! Executes encoded request descriptors. No retries: a failed call is
//! reported to the caller as-is.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::platform::SendRequest;

/// Send API HTTP client
#[derive(Clone)]
pub struct SendApiClient {
    base_url: String,
    http_client: Client,
}

impl SendApiClient {
    /// Create a client posting to `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http_client: Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to build Send API HTTP client")?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST one descriptor
    ///
    /// The descriptor's `uri` names the canonical endpoint; the request goes to
    /// the configured base URL so deployments can point at a proxy. A Graph
    /// error body or a non-success status is returned as an error.
    pub async fn send(&self, request: &SendRequest) -> Result<SendResult> {
        debug!("Sending message to recipient: {}", request.body.recipient.id);

        let response = self
            .http_client
            .post(&self.base_url)
            .query(&[("access_token", request.qs.access_token.as_str())])
            .json(&request.body)
            .send()
            .await
            .context("Failed to send Send API request")?;

        let status = response.status();
        let result: SendResult = response
            .json()
            .await
            .with_context(|| format!("Failed to parse Send API response ({})", status))?;

        if let Some(error) = &result.error {
            error!(
                "Send API error ({}): {} - {}",
                status, error.code, error.message
            );
            return Err(anyhow!(
                "Send API error {}: {}",
                error.code,
                error.message
            ));
        }

        if !status.is_success() {
            error!("Send API returned {}", status);
            return Err(anyhow!("Send API returned {}", status));
        }

        info!(
            "Message sent successfully, message_id: {:?}",
            result.message_id
        );
        Ok(result)
    }
}

/// Send API response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GraphError>,
}

impl SendResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Graph API error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub fbtrace_id: Option<String>,
}
