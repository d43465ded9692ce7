//! Outbound encoder: normalized message -> Send API request descriptor

use serde::Deserialize;
use tracing::{debug, warn};

use crate::classify;
use crate::platform::{
    AccessTokenQuery, GenericElement, OutgoingMessage, Recipient, SEND_API_URL, SendBody,
    SendRequest, TemplateAttachment, TemplatePayload, TopElementStyle,
};
use crate::types::{MessageType, NormalizedMessage, OneOrMany};

/// Credentials for the Send API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAuth {
    pub access_token: String,
}

impl SendAuth {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

/// Encode one message
///
/// Returns `None` when there is nothing to send: the type is missing or
/// unrecognized, or the receiver has no conversation id.
pub fn encode(msg: &NormalizedMessage, auth: &SendAuth) -> Option<SendRequest> {
    let kind = msg.kind?;

    let Some(conversation_id) = msg.receiver.as_ref().and_then(|r| r.conversation_id.clone())
    else {
        warn!("Message without receiver conversation id, nothing to send");
        return None;
    };

    let text = msg.text.as_deref();
    let attachments = msg.attachment_list();

    let message = match kind {
        MessageType::Text => OutgoingMessage {
            text: msg.text.clone(),
            ..OutgoingMessage::default()
        },
        MessageType::Location => generic(classify::location(attachments, text)),
        MessageType::Image => generic(classify::image(attachments, text)),
        MessageType::Quick => OutgoingMessage {
            text: msg.text.clone(),
            quick_replies: Some(classify::button(attachments)),
            ..OutgoingMessage::default()
        },
        MessageType::Actions => {
            let title = msg
                .details
                .as_ref()
                .and_then(|details| details.title.clone())
                .filter(|title| !title.is_empty());
            let subtitle = title.as_ref().and(msg.text.clone());
            generic(vec![GenericElement {
                title: title.or_else(|| msg.text.clone()),
                subtitle,
                image_url: None,
                buttons: Some(classify::rich_button(attachments)),
            }])
        }
        MessageType::List => OutgoingMessage {
            attachment: Some(TemplateAttachment::new(TemplatePayload::List {
                top_element_style: TopElementStyle::Compact,
                sharable: false,
                elements: classify::list(attachments),
            })),
            ..OutgoingMessage::default()
        },
        MessageType::Unknown => {
            debug!("Unhandled message type, nothing to send");
            return None;
        }
    };

    Some(SendRequest {
        uri: SEND_API_URL.to_string(),
        qs: AccessTokenQuery {
            access_token: auth.access_token.clone(),
        },
        method: "POST",
        body: SendBody {
            recipient: Recipient {
                id: conversation_id,
            },
            message,
        },
    })
}

/// Encode one message or a sequence, each independently
pub fn encode_batch(
    msgs: OneOrMany<NormalizedMessage>,
    auth: &SendAuth,
) -> OneOrMany<Option<SendRequest>> {
    msgs.map(|msg| encode(&msg, auth))
}

fn generic(elements: Vec<GenericElement>) -> OutgoingMessage {
    OutgoingMessage {
        attachment: Some(TemplateAttachment::new(TemplatePayload::Generic { elements })),
        ..OutgoingMessage::default()
    }
}
