//! Event broker - fans emitted messages out to downstream consumers

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::platform::SendRequest;
use crate::types::NormalizedMessage;

/// Default buffered events per subscriber
const DEFAULT_CAPACITY: usize = 256;

/// Event emitted by the bridge
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "direction", content = "message", rename_all = "lowercase")]
pub enum BridgeEvent {
    /// Decoded webhook event
    Inbound(Box<NormalizedMessage>),
    /// Encoded Send API request
    Outbound(Box<SendRequest>),
}

/// Broadcast hub for bridge events
///
/// Publishing never blocks; with no subscribers events are dropped.
pub struct MessageBroker {
    tx: broadcast::Sender<BridgeEvent>,
}

impl MessageBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Publish a decoded inbound message
    pub fn publish_inbound(&self, message: NormalizedMessage) {
        debug!(
            "Publishing inbound message {}",
            message.message_id.as_deref().unwrap_or("-")
        );
        self.publish(BridgeEvent::Inbound(Box::new(message)));
    }

    /// Publish an encoded outbound request
    pub fn publish_outbound(&self, request: SendRequest) {
        debug!("Publishing outbound request to {}", request.body.recipient.id);
        self.publish(BridgeEvent::Outbound(Box::new(request)));
    }

    fn publish(&self, event: BridgeEvent) {
        if self.tx.send(event).is_err() {
            debug!("No subscribers, event dropped");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MessageBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{SendAuth, encode};
    use crate::platform::REDACTED;
    use crate::types::MessageType;

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let broker = MessageBroker::new();
        let mut rx = broker.subscribe();
        assert_eq!(broker.subscriber_count(), 1);

        let message = NormalizedMessage {
            kind: Some(MessageType::Text),
            message_id: Some("m1".to_string()),
            ..NormalizedMessage::default()
        };
        broker.publish_inbound(message.clone());

        match rx.recv().await.unwrap() {
            BridgeEvent::Inbound(received) => assert_eq!(*received, message),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_outbound_event_hides_access_token() {
        let msg = NormalizedMessage::outbound(MessageType::Text, "U1").with_text("hi");
        let request = encode(&msg, &SendAuth::new("SECRET_PAGE_TOKEN")).unwrap();
        let event = BridgeEvent::Outbound(Box::new(request));

        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("SECRET_PAGE_TOKEN"));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["direction"], "outbound");
        assert_eq!(value["message"]["qs"]["access_token"], REDACTED);
        assert_eq!(value["message"]["body"]["recipient"]["id"], "U1");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broker = MessageBroker::new();
        broker.publish_inbound(NormalizedMessage::default());
        assert_eq!(broker.subscriber_count(), 0);
    }
}
