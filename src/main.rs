//! Messenger Bridge - Main Entry Point
//!
//! Runs the webhook server that:
//! 1. Answers the Messenger subscription handshake
//! 2. Verifies and decodes incoming events, publishing them to the broker
//! 3. Encodes and delivers outbound messages through the Send API

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use messenger_bridge::webhook::{self, WebhookState};
use messenger_bridge::{BridgeConfig, MessageBroker, SendApiClient, StaticDirectory};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,messenger_bridge=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Messenger Bridge starting...");

    // Load configuration
    let config = BridgeConfig::from_env()?;
    info!("📋 Configuration loaded ({} bot(s))", config.bots.len());

    let directory = Arc::new(StaticDirectory::new(config.bots.clone()));
    if directory.is_empty() {
        warn!("No bots configured, every webhook request will be rejected");
    }

    let broker = Arc::new(MessageBroker::new());
    let send_api = SendApiClient::new(
        config.send_api_url.clone(),
        Duration::from_secs(config.send_api_timeout_secs),
    )?;

    let webhook_addr: SocketAddr = config
        .webhook_addr
        .parse()
        .with_context(|| format!("Invalid WEBHOOK_ADDR {}", config.webhook_addr))?;

    let state = WebhookState {
        config: Arc::new(config),
        directory,
        broker: broker.clone(),
        send_api,
    };

    let event_logger = spawn_event_logger(broker.clone());
    let webhook_server = spawn_webhook_server(webhook_addr, state);

    info!("🌐 Messenger webhook server listening on {}", webhook_addr);

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => info!("📢 Shutdown signal received"),
        Err(err) => tracing::error!("Unable to listen for shutdown signal: {}", err),
    }

    // Graceful shutdown
    info!("🛑 Shutting down...");
    webhook_server.abort();
    event_logger.abort();

    info!("✅ Messenger Bridge stopped");
    Ok(())
}

/// Spawn the webhook HTTP server
fn spawn_webhook_server(addr: SocketAddr, state: WebhookState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = webhook::run_server(addr, state).await {
            tracing::error!("Webhook server error: {}", e);
        }
    })
}

/// Spawn a subscriber that logs every bridge event
fn spawn_event_logger(broker: Arc<MessageBroker>) -> tokio::task::JoinHandle<()> {
    let mut rx = broker.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!("Bridge event: {}", json),
                    Err(e) => warn!("Failed to serialize bridge event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event logger lagged, {} event(s) skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
