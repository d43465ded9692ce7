//! Normalized message types shared by the encoder and decoder

use serde::{Deserialize, Serialize};

/// Platform tag stamped on every decoded sender
pub const PLATFORM: &str = "messenger";

/// Content type of a location attachment
pub const CONTENT_TYPE_LOCATION: &str = "application/x.location";

/// Content type of a button attachment
pub const CONTENT_TYPE_BUTTON: &str = "application/x.button";

// =============================================================================
// Message Type
// =============================================================================

/// Normalized message type
///
/// Outbound messages use all six kinds; decoded messages are always `Text`.
/// Anything unrecognized deserializes to `Unknown` and encodes to nothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Location,
    Image,
    Quick,
    Actions,
    List,
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Parties
// =============================================================================

/// Identity of a sender or receiver
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl Party {
    /// Receiver addressed by conversation id
    pub fn conversation(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: Some(conversation_id.into()),
            ..Self::default()
        }
    }
}

// =============================================================================
// Details
// =============================================================================

/// Action nested under `details.actions` of a list button
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Structured extras carried by a message or an attachment
///
/// The same shape serves every attachment kind: locations use `address`/`url`
/// outbound and `lat`/`lon` inbound, buttons use `type`/`subtitle`/`actions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Details {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Button behaviour hint: `url`, `reply` or `post`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

// =============================================================================
// Attachments
// =============================================================================

/// Generic attachment body
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Attachment: either a bare label or a generic item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Attachment {
    Label(String),
    Item(AttachmentItem),
}

impl Attachment {
    /// Content type of an item, `None` for bare labels
    pub fn content_type(&self) -> Option<&str> {
        match self {
            Attachment::Label(_) => None,
            Attachment::Item(item) => item.content_type.as_deref(),
        }
    }

    /// True for bare labels and `application/x.button` items
    pub fn is_button(&self) -> bool {
        match self {
            Attachment::Label(_) => true,
            Attachment::Item(item) => item.content_type.as_deref() == Some(CONTENT_TYPE_BUTTON),
        }
    }
}

impl From<&str> for Attachment {
    fn from(label: &str) -> Self {
        Attachment::Label(label.to_string())
    }
}

impl From<AttachmentItem> for Attachment {
    fn from(item: AttachmentItem) -> Self {
        Attachment::Item(item)
    }
}

// =============================================================================
// Normalized Message
// =============================================================================

/// Platform-agnostic message
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Party>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Party>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Raw inbound event, kept for traceability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<serde_json::Value>,
}

impl NormalizedMessage {
    /// Outbound message of the given type addressed to a conversation
    pub fn outbound(kind: MessageType, conversation_id: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            receiver: Some(Party::conversation(conversation_id)),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = Some(details);
        self
    }

    /// Attachments as a slice, empty when absent
    pub fn attachment_list(&self) -> &[Attachment] {
        self.attachments.as_deref().unwrap_or_default()
    }
}

// =============================================================================
// One or Many
// =============================================================================

/// A single value or a sequence of values
///
/// Sending accepts one message or an array; decoding a webhook payload yields
/// one message or several.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// Apply `f` to every element, preserving the shape
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> OneOrMany<U> {
        let mut f = f;
        match self {
            OneOrMany::One(value) => OneOrMany::One(f(value)),
            OneOrMany::Many(values) => OneOrMany::Many(values.into_iter().map(f).collect()),
        }
    }

    /// Collapse a vector: exactly one element becomes `One`
    pub fn from_vec(mut values: Vec<T>) -> Self {
        if values.len() == 1
            && let Some(value) = values.pop()
        {
            return OneOrMany::One(value);
        }
        OneOrMany::Many(values)
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}
