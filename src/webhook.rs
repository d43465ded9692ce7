//! Messenger webhook HTTP handlers
//!
//! - GET: subscription handshake
//! - POST: signed event delivery
//! - POST `/send`: encode and deliver normalized messages

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::broker::MessageBroker;
use crate::config::BridgeConfig;
use crate::decoder::{self, DecodeContext};
use crate::directory::{BotDirectory, BotQuery};
use crate::encoder::{self, SendAuth};
use crate::error::WebhookError;
use crate::platform::{SIGNATURE_HEADER, WebhookPayload};
use crate::send_api::{SendApiClient, SendResult};
use crate::signature::SignatureHeader;
use crate::types::{NormalizedMessage, OneOrMany};

/// Header carrying the key for the send endpoint
pub const API_KEY_HEADER: &str = "x-api-key";

/// Acknowledgement body for accepted deliveries
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub config: Arc<BridgeConfig>,
    pub directory: Arc<dyn BotDirectory>,
    pub broker: Arc<MessageBroker>,
    pub send_api: SendApiClient,
}

/// Build the router
pub fn router(state: WebhookState) -> Router {
    let path = state.config.webhook_path.clone();
    let send_path = format!("{}/send", path.trim_end_matches('/'));

    Router::new()
        .route(&path, get(verify).post(receive_events))
        .route(&send_path, post(send_messages))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Run the webhook HTTP server
pub async fn run_server(addr: SocketAddr, state: WebhookState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Middleware to log all incoming HTTP requests
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("🌐 HTTP {} {}", method, path);

    let response = next.run(req).await;

    info!("📤 Response status: {}", response.status());

    response
}

// =============================================================================
// Handshake
// =============================================================================

/// Subscription handshake query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandshakeParams {
    #[serde(rename = "hub.mode", default)]
    pub mode: Option<String>,
    #[serde(rename = "hub.challenge", default)]
    pub challenge: Option<String>,
    #[serde(rename = "hub.verify_token", default)]
    pub verify_token: Option<String>,
}

/// Handshake outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Token matched: echo the challenge
    Challenge(String),
    Forbidden,
    /// Mode or token missing
    NotFound,
}

impl IntoResponse for Handshake {
    fn into_response(self) -> Response {
        match self {
            Handshake::Challenge(challenge) => (StatusCode::OK, challenge).into_response(),
            Handshake::Forbidden => StatusCode::FORBIDDEN.into_response(),
            Handshake::NotFound => StatusCode::NOT_FOUND.into_response(),
        }
    }
}

/// Decide the handshake for `app_id`
///
/// Lookup failures are indistinguishable from a token mismatch.
pub async fn handshake(
    directory: &dyn BotDirectory,
    app_id: &str,
    params: &HandshakeParams,
) -> Handshake {
    let present = |value: &Option<String>| value.as_deref().filter(|s| !s.is_empty()).is_some();
    if !present(&params.mode) || !present(&params.verify_token) {
        return Handshake::NotFound;
    }

    if params.mode.as_deref() != Some("subscribe") {
        warn!("Handshake with unexpected mode for app {}", app_id);
        return Handshake::Forbidden;
    }

    match directory.fetch(&BotQuery::new(app_id)).await {
        Ok(bot) if params.verify_token.as_deref() == Some(bot.verify_token.as_str()) => {
            info!("Webhook verification successful for app {}", app_id);
            Handshake::Challenge(params.challenge.clone().unwrap_or_default())
        }
        Ok(_) => {
            warn!("Verify token mismatch for app {}", app_id);
            Handshake::Forbidden
        }
        Err(e) => {
            warn!("Bot lookup failed during handshake: {}", e);
            Handshake::Forbidden
        }
    }
}

/// Webhook verification (GET request from Messenger)
async fn verify(
    State(state): State<WebhookState>,
    Path(app_id): Path<String>,
    Query(params): Query<HandshakeParams>,
) -> Handshake {
    info!("📥 Received verification request for app {}", app_id);
    handshake(state.directory.as_ref(), &app_id, &params).await
}

// =============================================================================
// Event delivery
// =============================================================================

/// Handle an event delivery (POST request from Messenger)
async fn receive_events(
    State(state): State<WebhookState>,
    Path(app_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, WebhookError> {
    debug!("Request body length: {} bytes", body.len());

    let signature = SignatureHeader::parse(
        headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok()),
    )?;

    if state.config.debug_mode {
        debug!("Raw payload: {}", String::from_utf8_lossy(&body));
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)?;

    let query = BotQuery::new(app_id).with_client(payload.page_id().map(str::to_string));
    let bot = state.directory.fetch(&query).await.map_err(|e| {
        warn!("Bot lookup failed for event delivery: {}", e);
        WebhookError::UnknownBot
    })?;

    signature.verify(&body, &bot.secret)?;

    let ctx = DecodeContext {
        context_id: bot.context_id.clone(),
    };
    let messages = decoder::decode_payload(&payload, &ctx).into_vec();
    info!(
        "Received {} event(s) for app {}",
        messages.len(),
        query.app_id
    );

    for message in messages {
        state.broker.publish_inbound(message);
    }

    Ok(EVENT_RECEIVED)
}

// =============================================================================
// Outbound send
// =============================================================================

/// Result of sending one normalized message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SendOutcome {
    /// Encoded and delivered
    Sent { result: SendResult },
    /// Nothing to send for this message
    Skipped,
    /// Encoded but the Send API call failed
    Failed { error: String },
}

/// Encode and deliver one message or a batch
async fn send_messages(
    State(state): State<WebhookState>,
    Path(app_id): Path<String>,
    headers: HeaderMap,
    Json(messages): Json<OneOrMany<NormalizedMessage>>,
) -> Result<Json<Vec<SendOutcome>>, WebhookError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if !state.config.is_api_key_valid(presented) {
        return Err(WebhookError::Unauthorized);
    }

    let bot = state
        .directory
        .fetch(&BotQuery::new(app_id))
        .await
        .map_err(|e| {
            warn!("Bot lookup failed for send: {}", e);
            WebhookError::UnknownBot
        })?;
    let Some(access_token) = bot.access_token else {
        warn!("Bot for app {} has no access token", bot.app_id);
        return Err(WebhookError::UnknownBot);
    };

    let requests = encoder::encode_batch(messages, &SendAuth::new(access_token)).into_vec();
    let mut outcomes = Vec::with_capacity(requests.len());

    for request in requests {
        let Some(request) = request else {
            outcomes.push(SendOutcome::Skipped);
            continue;
        };

        state.broker.publish_outbound(request.clone());
        outcomes.push(match state.send_api.send(&request).await {
            Ok(result) => SendOutcome::Sent { result },
            Err(e) => SendOutcome::Failed {
                error: format!("{:#}", e),
            },
        });
    }

    Ok(Json(outcomes))
}
