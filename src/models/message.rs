use lapin::message::Delivery;
use uuid::Uuid;

/// One message handed over by the queue runtime.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Correlation only; never used for decisions.
    pub message_id: String,
    pub delivery_tag: u64,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(message_id: impl Into<String>, delivery_tag: u64, payload: Vec<u8>) -> Self {
        Self {
            message_id: message_id.into(),
            delivery_tag,
            payload,
        }
    }
}

impl From<Delivery> for InboundMessage {
    fn from(delivery: Delivery) -> Self {
        let message_id = delivery
            .properties
            .message_id()
            .as_ref()
            .map(|id| id.as_str().to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            message_id,
            delivery_tag: delivery.delivery_tag,
            payload: delivery.data,
        }
    }
}
