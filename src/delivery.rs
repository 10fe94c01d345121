use std::collections::HashMap;

use anyhow::{Error, Result};
use async_trait::async_trait;

use crate::models::{message::InboundMessage, notification::NotificationRequest};

/// Something that can put a validated notification in front of its recipient.
///
/// Implementations are shared across concurrently processed messages, so they
/// must be stateless or synchronize internally. A timeout is just another
/// error.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, request: &NotificationRequest) -> Result<(), Error>;

    fn name(&self) -> &'static str;
}

/// Terminal actions the queue runtime offers for a received message.
#[async_trait]
pub trait QueueActions: Send + Sync {
    async fn acknowledge(&self, message: &InboundMessage) -> Result<(), Error>;

    async fn dead_letter(
        &self,
        message: &InboundMessage,
        properties: HashMap<String, String>,
    ) -> Result<(), Error>;

    /// Hands the message back for redelivery when neither terminal action
    /// could be completed.
    async fn requeue(&self, message: &InboundMessage) -> Result<(), Error>;
}
