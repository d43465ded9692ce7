//! Messenger Platform wire types
//!
//! Inbound: the webhook payload `{object, entry: [{id, time, messaging: [...]}]}`.
//! Outbound: the Send API request descriptor `{uri, qs, method, body}`.

use serde::{Deserialize, Serialize, Serializer};
use url::Url;

// =============================================================================
// API Endpoints
// =============================================================================

/// Send API base endpoint
pub const SEND_API_URL: &str = "https://graph.facebook.com/v2.6/me/messages";

/// Header carrying the payload signature
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

// =============================================================================
// Inbound Webhook Types
// =============================================================================

/// Root webhook payload
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebhookPayload {
    /// Object type, `page` for Messenger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

impl WebhookPayload {
    /// Page id of the first entry
    ///
    /// A single delivery never mixes entries from different pages.
    pub fn page_id(&self) -> Option<&str> {
        self.entry.first().and_then(|entry| entry.id.as_deref())
    }
}

/// One page's batch of events
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    /// Raw events, decoded one by one so a malformed event cannot reject the batch
    #[serde(default)]
    pub messaging: Vec<serde_json::Value>,
}

/// Reference to a user or page
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ParticipantRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A single messaging event
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MessagingEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<ParticipantRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ParticipantRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<InboundMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postback: Option<Postback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optin: Option<Optin>,
    /// Delivery receipt, contents unused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<serde_json::Value>,
    /// Read receipt, contents unused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<serde_json::Value>,
}

impl MessagingEvent {
    /// Delivery and read receipts and echoes of our own messages
    pub fn is_receipt_or_echo(&self) -> bool {
        self.delivery.is_some()
            || self.read.is_some()
            || self.message.as_ref().is_some_and(|m| m.is_echo)
    }
}

/// Message body of an event
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InboundMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_reply: Option<QuickReplyPayload>,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<InboundAttachment>>,
}

/// Payload of a tapped quick reply
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuickReplyPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Postback from a tapped button
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Postback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Opt-in (checkbox plugin / send-to-messenger)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Optin {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ref: Option<String>,
}

/// Attachment on an inbound message
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InboundAttachment {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<InboundAttachmentPayload>,
}

/// Attachment payload: a URL for media, coordinates for locations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InboundAttachmentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

// =============================================================================
// Outbound Send API Types
// =============================================================================

/// Request descriptor for one Send API call
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SendRequest {
    pub uri: String,
    pub qs: AccessTokenQuery,
    pub method: &'static str,
    pub body: SendBody,
}

impl SendRequest {
    /// Full request URL including the percent-encoded access token
    pub fn url(&self) -> String {
        match Url::parse_with_params(&self.uri, [("access_token", &self.qs.access_token)]) {
            Ok(url) => url.into(),
            Err(_) => self.uri.clone(),
        }
    }
}

/// Marker written in place of the token when a descriptor is serialized
pub const REDACTED: &str = "[redacted]";

/// Query credential
///
/// The token never appears in serialized descriptors (events, logs); the
/// Send API client reads the field directly.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccessTokenQuery {
    #[serde(serialize_with = "redact")]
    pub access_token: String,
}

fn redact<S: Serializer>(_: &String, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(REDACTED)
}

/// Request body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SendBody {
    pub recipient: Recipient,
    pub message: OutgoingMessage,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Recipient {
    pub id: String,
}

/// Outgoing message: text, text with quick replies, or a template attachment
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct OutgoingMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_replies: Option<Vec<QuickReply>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<TemplateAttachment>,
}

/// Quick reply button
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuickReply {
    pub content_type: QuickReplyContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuickReplyContent {
    Text,
}

/// `{type: "template", payload}` attachment
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TemplateAttachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub payload: TemplatePayload,
}

impl TemplateAttachment {
    pub fn new(payload: TemplatePayload) -> Self {
        Self {
            kind: AttachmentKind::Template,
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Template,
}

/// Template payload, tagged by `template_type`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "template_type", rename_all = "snake_case")]
pub enum TemplatePayload {
    Generic {
        elements: Vec<GenericElement>,
    },
    List {
        top_element_style: TopElementStyle,
        sharable: bool,
        elements: Vec<ListElement>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TopElementStyle {
    Compact,
    Large,
}

/// Element of a generic template
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GenericElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
}

/// Element of a list template
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ListElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_action: Option<Button>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<Button>>,
}

/// Template button
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Button {
    #[serde(rename = "type")]
    pub kind: ButtonType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Button {
    pub fn web_url(title: Option<String>, url: Option<String>) -> Self {
        Self {
            kind: ButtonType::WebUrl,
            title,
            url,
            payload: None,
        }
    }

    pub fn postback(title: Option<String>, payload: Option<String>) -> Self {
        Self {
            kind: ButtonType::Postback,
            title,
            url: None,
            payload,
        }
    }
}

/// Platform button type
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ButtonType {
    WebUrl,
    Postback,
}

/// Button behaviour hint carried in `details.type` of a normalized button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonHint {
    Url,
    Reply,
    Post,
}

impl ButtonHint {
    pub fn parse(hint: &str) -> Option<Self> {
        match hint {
            "url" => Some(ButtonHint::Url),
            "reply" => Some(ButtonHint::Reply),
            "post" => Some(ButtonHint::Post),
            _ => None,
        }
    }

    pub fn button_type(self) -> ButtonType {
        match self {
            ButtonHint::Url => ButtonType::WebUrl,
            ButtonHint::Reply | ButtonHint::Post => ButtonType::Postback,
        }
    }
}

impl ButtonType {
    /// Resolve a hint, defaulting to `web_url` when absent or unrecognized
    pub fn from_hint(hint: Option<&str>) -> Self {
        hint.and_then(ButtonHint::parse)
            .map(ButtonHint::button_type)
            .unwrap_or(ButtonType::WebUrl)
    }
}
