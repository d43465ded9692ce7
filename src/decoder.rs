//! Inbound decoder: Messenger webhook event -> normalized message
//!
//! Decoding never fails. Missing or malformed fields leave the corresponding
//! normalized fields unset.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::platform::{InboundAttachment, InboundMessage, MessagingEvent, WebhookPayload};
use crate::types::{
    Attachment, AttachmentItem, CONTENT_TYPE_LOCATION, Details, MessageType, NormalizedMessage,
    OneOrMany, PLATFORM, Party,
};

/// Per-bot context attached to decoded senders
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    pub context_id: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|s| !s.is_empty())
}

/// Deserialize `raw[key]`, leaving it unset when absent or mistyped
fn field<T: DeserializeOwned>(raw: &Value, key: &str) -> Option<T> {
    let value = raw.get(key)?;
    if value.is_null() {
        return None;
    }
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring malformed event field {}: {}", key, e);
            None
        }
    }
}

/// Parse an event field by field so one bad field cannot discard the rest
fn lenient_event(raw: &Value) -> MessagingEvent {
    let message = raw.get("message").filter(|m| m.is_object()).map(|m| InboundMessage {
        mid: field(m, "mid"),
        text: field(m, "text"),
        quick_reply: field(m, "quick_reply"),
        is_echo: field(m, "is_echo").unwrap_or_default(),
        attachments: m.get("attachments").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| InboundAttachment::deserialize(item).ok())
                .collect()
        }),
    });

    MessagingEvent {
        sender: field(raw, "sender"),
        recipient: field(raw, "recipient"),
        timestamp: field(raw, "timestamp"),
        message,
        postback: field(raw, "postback"),
        optin: field(raw, "optin"),
        delivery: field(raw, "delivery"),
        read: field(raw, "read"),
    }
}

/// Decode a single raw messaging event
pub fn decode(raw: &Value, ctx: &DecodeContext) -> NormalizedMessage {
    let event = lenient_event(raw);

    let message = event.message.as_ref();
    let sender_id = event.sender.as_ref().and_then(|s| s.id.clone());

    let message_id = message
        .and_then(|m| non_empty(m.mid.as_ref()))
        .cloned()
        .unwrap_or_else(|| {
            format!(
                "{}-{}",
                event.timestamp.map(|t| t.to_string()).unwrap_or_default(),
                sender_id.as_deref().unwrap_or_default()
            )
        });

    let mut sender = Party {
        platform: Some(PLATFORM.to_string()),
        context_id: ctx.context_id.clone(),
        ..Party::default()
    };
    let mut text = None;

    match sender_id.filter(|id| !id.is_empty()) {
        Some(id) => {
            sender.id = Some(id);
            text = resolve_text(&event);
        }
        None => {
            if let Some(optin) = &event.optin
                && non_empty(optin.reference.as_ref()).is_some()
                && let Some(user_ref) = non_empty(optin.user_ref.as_ref())
            {
                sender.id = Some(user_ref.clone());
                text = Some(String::new());
            }
        }
    }
    sender.conversation_id = sender.id.clone();

    let attachments = message
        .and_then(|m| m.attachments.as_ref())
        .map(|list| list.iter().filter_map(reinterpret).collect());

    NormalizedMessage {
        kind: Some(MessageType::Text),
        text,
        attachments,
        details: None,
        sender: Some(sender),
        receiver: Some(Party {
            id: event.recipient.as_ref().and_then(|r| r.id.clone()),
            ..Party::default()
        }),
        message_id: Some(message_id),
        timestamp: event.timestamp,
        request: Some(raw.clone()),
    }
}

/// Text precedence, first match wins:
/// plain text, postback payload, quick reply payload, then an empty fallback.
/// Receipts and echoes never take the first or last branch.
fn resolve_text(event: &MessagingEvent) -> Option<String> {
    let message = event.message.as_ref();
    let suppressed = event.is_receipt_or_echo();
    let message_text = message.and_then(|m| non_empty(m.text.as_ref()));
    let quick_reply = message.and_then(|m| m.quick_reply.as_ref());

    if let Some(text) = message_text
        && quick_reply.is_none()
        && !suppressed
    {
        return Some(text.clone());
    }
    if let Some(payload) = event.postback.as_ref().and_then(|p| non_empty(p.payload.as_ref())) {
        return Some(payload.clone());
    }
    if let Some(payload) = quick_reply.and_then(|q| non_empty(q.payload.as_ref())) {
        return Some(payload.clone());
    }
    if !suppressed {
        return Some(message_text.cloned().unwrap_or_default());
    }
    None
}

/// Map an inbound attachment onto the normalized shape
///
/// Only locations and images are understood; everything else is dropped.
fn reinterpret(attachment: &InboundAttachment) -> Option<Attachment> {
    let payload = attachment.payload.as_ref()?;
    match attachment.kind.as_str() {
        "location" => {
            let coordinates = payload.coordinates?;
            Some(Attachment::Item(AttachmentItem {
                content_type: Some(CONTENT_TYPE_LOCATION.to_string()),
                details: Some(Details {
                    lat: Some(coordinates.lat),
                    lon: Some(coordinates.long),
                    ..Details::default()
                }),
                ..AttachmentItem::default()
            }))
        }
        "image" => {
            let raw_url = payload.url.as_ref()?;
            let (content_type, filename) = match Url::parse(raw_url) {
                Ok(url) => {
                    let path = Path::new(url.path());
                    (
                        mime_guess::from_path(path)
                            .first()
                            .map(|mime| mime.essence_str().to_string()),
                        path.file_name()
                            .map(|name| name.to_string_lossy().into_owned()),
                    )
                }
                Err(e) => {
                    debug!("Unparseable image URL {}: {}", raw_url, e);
                    (None, None)
                }
            };
            Some(Attachment::Item(AttachmentItem {
                url: Some(raw_url.clone()),
                content_type,
                filename,
                ..AttachmentItem::default()
            }))
        }
        other => {
            debug!("Dropping unsupported attachment type: {}", other);
            None
        }
    }
}

/// Decode every event of every entry in a webhook payload
///
/// Exactly one event yields `One`, anything else `Many`.
pub fn decode_payload(payload: &WebhookPayload, ctx: &DecodeContext) -> OneOrMany<NormalizedMessage> {
    let messages = payload
        .entry
        .iter()
        .flat_map(|entry| entry.messaging.iter())
        .map(|event| decode(event, ctx))
        .collect();
    OneOrMany::from_vec(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> DecodeContext {
        DecodeContext {
            context_id: Some("ctx-1".to_string()),
        }
    }

    #[test]
    fn test_decode_plain_text() {
        let event = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": "R1"},
            "timestamp": 100,
            "message": {"text": "hello"}
        });
        let msg = decode(&event, &DecodeContext::default());

        assert_eq!(msg.kind, Some(MessageType::Text));
        assert_eq!(msg.text.as_deref(), Some("hello"));
        assert_eq!(msg.message_id.as_deref(), Some("100-S1"));
        assert_eq!(msg.timestamp, Some(100));
        assert_eq!(
            msg.sender,
            Some(Party {
                platform: Some("messenger".to_string()),
                context_id: None,
                id: Some("S1".to_string()),
                conversation_id: Some("S1".to_string()),
            })
        );
        assert_eq!(
            msg.receiver,
            Some(Party {
                id: Some("R1".to_string()),
                ..Party::default()
            })
        );
        assert_eq!(msg.request, Some(event));
        assert!(msg.attachments.is_none());
    }

    #[test]
    fn test_decode_uses_platform_mid() {
        let event = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": "R1"},
            "timestamp": 100,
            "message": {"mid": "mid.123", "text": "hello"}
        });
        let msg = decode(&event, &ctx());

        assert_eq!(msg.message_id.as_deref(), Some("mid.123"));
        assert_eq!(msg.sender.unwrap().context_id.as_deref(), Some("ctx-1"));
    }

    #[test]
    fn test_echo_never_takes_direct_text() {
        let event = json!({
            "sender": {"id": "PAGE"},
            "recipient": {"id": "U1"},
            "timestamp": 1,
            "message": {"is_echo": true, "text": "sent by page"}
        });
        assert_eq!(decode(&event, &ctx()).text, None);
    }

    #[test]
    fn test_receipts_have_no_text() {
        let delivery = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": "R1"},
            "delivery": {"mids": ["mid.1"], "watermark": 1}
        });
        let read = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": "R1"},
            "read": {"watermark": 1}
        });

        assert_eq!(decode(&delivery, &ctx()).text, None);
        assert_eq!(decode(&read, &ctx()).text, None);
    }

    #[test]
    fn test_postback_payload() {
        let event = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": "R1"},
            "postback": {"title": "Start", "payload": "GET_STARTED"}
        });
        assert_eq!(decode(&event, &ctx()).text.as_deref(), Some("GET_STARTED"));
    }

    #[test]
    fn test_quick_reply_payload_wins_over_text() {
        let event = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": "R1"},
            "message": {"text": "Yes please", "quick_reply": {"payload": "YES"}}
        });
        assert_eq!(decode(&event, &ctx()).text.as_deref(), Some("YES"));
    }

    #[test]
    fn test_attachment_only_message_has_empty_text() {
        let event = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": "R1"},
            "message": {"attachments": [{"type": "fallback", "payload": {"url": "https://x"}}]}
        });
        let msg = decode(&event, &ctx());

        assert_eq!(msg.text.as_deref(), Some(""));
        assert_eq!(msg.attachments, Some(vec![]));
    }

    #[test]
    fn test_optin_uses_user_ref() {
        let event = json!({
            "recipient": {"id": "PAGE"},
            "timestamp": 5,
            "optin": {"ref": "landing", "user_ref": "UREF1"}
        });
        let msg = decode(&event, &ctx());
        let sender = msg.sender.unwrap();

        assert_eq!(sender.id.as_deref(), Some("UREF1"));
        assert_eq!(sender.conversation_id.as_deref(), Some("UREF1"));
        assert_eq!(msg.text.as_deref(), Some(""));
        assert_eq!(msg.message_id.as_deref(), Some("5-"));
    }

    #[test]
    fn test_optin_without_ref_leaves_sender_unset() {
        let event = json!({
            "recipient": {"id": "PAGE"},
            "optin": {"user_ref": "UREF1"}
        });
        let msg = decode(&event, &ctx());

        assert!(msg.sender.unwrap().id.is_none());
        assert!(msg.text.is_none());
    }

    #[test]
    fn test_reinterpret_attachments() {
        let event = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": "R1"},
            "message": {"attachments": [
                {"type": "location", "payload": {"coordinates": {"lat": 42.5, "long": 23.3}}},
                {"type": "image", "payload": {"url": "https://cdn.example/photos/cat.png?token=abc"}},
                {"type": "audio", "payload": {"url": "https://cdn.example/a.mp3"}}
            ]}
        });
        let attachments = decode(&event, &ctx()).attachments.unwrap();

        assert_eq!(attachments.len(), 2);
        let Attachment::Item(location) = &attachments[0] else {
            panic!("expected item");
        };
        assert_eq!(location.content_type.as_deref(), Some(CONTENT_TYPE_LOCATION));
        let details = location.details.as_ref().unwrap();
        assert_eq!(details.lat, Some(42.5));
        assert_eq!(details.lon, Some(23.3));

        let Attachment::Item(image) = &attachments[1] else {
            panic!("expected item");
        };
        assert_eq!(
            image.url.as_deref(),
            Some("https://cdn.example/photos/cat.png?token=abc")
        );
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
        assert_eq!(image.filename.as_deref(), Some("cat.png"));
    }

    #[test]
    fn test_malformed_event_is_best_effort() {
        let msg = decode(&json!({"sender": "not-an-object"}), &ctx());

        assert_eq!(msg.kind, Some(MessageType::Text));
        assert!(msg.sender.unwrap().id.is_none());
        assert_eq!(msg.message_id.as_deref(), Some("-"));
    }

    #[test]
    fn test_mistyped_field_stays_local() {
        let event = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": 123},
            "timestamp": 100,
            "message": {"text": "hello", "mid": 42}
        });
        let msg = decode(&event, &ctx());

        assert_eq!(msg.text.as_deref(), Some("hello"));
        assert_eq!(msg.sender.unwrap().id.as_deref(), Some("S1"));
        assert_eq!(msg.message_id.as_deref(), Some("100-S1"));
        assert_eq!(msg.timestamp, Some(100));
        assert_eq!(msg.receiver, Some(Party::default()));
    }

    #[test]
    fn test_mistyped_attachment_is_skipped() {
        let event = json!({
            "sender": {"id": "S1"},
            "recipient": {"id": "R1"},
            "message": {"attachments": [
                {"type": 7},
                {"type": "location", "payload": {"coordinates": {"lat": 1.5, "long": 2.5}}}
            ]}
        });
        let attachments = decode(&event, &ctx()).attachments.unwrap();

        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].content_type(), Some(CONTENT_TYPE_LOCATION));
    }

    #[test]
    fn test_decode_payload_flattens_entries() {
        let single: WebhookPayload = serde_json::from_value(json!({
            "object": "page",
            "entry": [{"id": "P1", "messaging": [
                {"sender": {"id": "S1"}, "recipient": {"id": "P1"}, "message": {"text": "a"}}
            ]}]
        }))
        .unwrap();
        assert!(matches!(decode_payload(&single, &ctx()), OneOrMany::One(_)));

        let many: WebhookPayload = serde_json::from_value(json!({
            "object": "page",
            "entry": [
                {"id": "P1", "messaging": [
                    {"sender": {"id": "S1"}, "recipient": {"id": "P1"}, "message": {"text": "a"}},
                    {"sender": {"id": "S2"}, "recipient": {"id": "P1"}, "message": {"text": "b"}}
                ]},
                {"id": "P1", "messaging": [
                    {"sender": {"id": "S3"}, "recipient": {"id": "P1"}, "message": {"text": "c"}}
                ]}
            ]
        }))
        .unwrap();
        let texts: Vec<_> = decode_payload(&many, &ctx())
            .into_vec()
            .into_iter()
            .map(|m| m.text.unwrap())
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }
}
