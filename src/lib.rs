//! Messenger Bridge Library
//!
//! Translates between normalized messages and the Facebook Messenger Platform,
//! and guards the webhook that receives Messenger callbacks.
//!
//! # Architecture
//!
//! ```text
//! Messenger ──HTTPS POST──▶ Webhook gate ──▶ Decoder ──▶ Broker ──▶ consumers
//!                           (signature)
//!
//! producers ──▶ /send ──▶ Encoder ──▶ Broker + Send API client ──▶ Messenger
//! ```
//!
//! # Usage
//!
//! ```bash
//! export MESSENGER_APP_ID=1234567890
//! export MESSENGER_VERIFY_TOKEN=your_verify_token
//! export MESSENGER_APP_SECRET=your_app_secret
//! export MESSENGER_ACCESS_TOKEN=your_page_token   # needed for /send
//!
//! messenger-bridge
//! ```
//!
//! Encoding a message without the server:
//!
//! ```
//! use messenger_bridge::prelude::*;
//!
//! let msg = NormalizedMessage::outbound(MessageType::Text, "U1").with_text("hi");
//! let request = encode(&msg, &SendAuth::new("PAGE_TOKEN")).unwrap();
//! assert_eq!(request.body.recipient.id, "U1");
//! ```

pub mod broker;
pub mod classify;
pub mod config;
pub mod decoder;
pub mod directory;
pub mod encoder;
pub mod error;
pub mod platform;
pub mod send_api;
pub mod signature;
pub mod types;
pub mod validation;
pub mod webhook;

pub use broker::{BridgeEvent, MessageBroker};
pub use config::BridgeConfig;
pub use decoder::{DecodeContext, decode, decode_payload};
pub use directory::{BotDirectory, BotQuery, BotRecord, StaticDirectory};
pub use encoder::{SendAuth, encode, encode_batch};
pub use error::WebhookError;
pub use send_api::SendApiClient;
pub use types::*;

/// Prelude for common imports
pub mod prelude {
    pub use crate::broker::{BridgeEvent, MessageBroker};
    pub use crate::config::BridgeConfig;
    pub use crate::decoder::{DecodeContext, decode, decode_payload};
    pub use crate::encoder::{SendAuth, encode, encode_batch};
    pub use crate::platform::SendRequest;
    pub use crate::types::*;
}
