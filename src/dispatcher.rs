use anyhow::{Error, Result};
use tracing::{Instrument, error, info, info_span, warn};

use crate::{
    delivery::{DeliveryChannel, QueueActions},
    error::{DispatchError, UNKNOWN_ERROR},
    models::{
        message::InboundMessage, outcome::DeliveryOutcome, retry::RetryConfig,
        validation::validate,
    },
    utils::retry_with_backoff,
};

/// Drives one message to its terminal outcome.
///
/// Exactly one of `acknowledge` or `dead_letter` is invoked, as the last step.
/// Decode, validation and delivery failures all become a dead-letter; the only
/// error returned is a failure of that terminal queue action, in which case the
/// message stays unacknowledged and the broker will redeliver it.
pub async fn process_message(
    message: &InboundMessage,
    channel: &dyn DeliveryChannel,
    queue: &dyn QueueActions,
    retry_config: &RetryConfig,
) -> Result<DeliveryOutcome, Error> {
    let span = info_span!("dispatch", message_id = %message.message_id);

    async move {
        info!(payload_bytes = message.payload.len(), "Received message");

        match deliver(message, channel, retry_config).await {
            Ok(()) => {
                queue.acknowledge(message).await?;
                info!("Email sent successfully, message acknowledged");

                Ok(DeliveryOutcome::Acknowledged)
            }
            Err(e) => {
                if let DispatchError::Delivery { attempts, .. } = &e {
                    warn!(attempts, channel = channel.name(), "All delivery attempts failed");
                }

                let properties = e.dead_letter_properties();
                error!(
                    kind = e.kind(),
                    error = %e,
                    "Message could not be delivered, sending to DLQ"
                );
                queue.dead_letter(message, properties).await?;

                Ok(DeliveryOutcome::DeadLettered {
                    reason: e.reason(),
                })
            }
        }
    }
    .instrument(span)
    .await
}

async fn deliver(
    message: &InboundMessage,
    channel: &dyn DeliveryChannel,
    retry_config: &RetryConfig,
) -> Result<(), DispatchError> {
    let request = validate(&message.payload).map_err(DispatchError::from)?;

    retry_with_backoff(retry_config, || channel.send(&request))
        .await
        .map_err(|e| {
            let reason = match &e.last_error {
                Some(_) => e.to_string(),
                None => {
                    warn!(channel = channel.name(), "No delivery attempt was made");
                    UNKNOWN_ERROR.to_string()
                }
            };

            DispatchError::Delivery {
                attempts: e.attempts,
                reason,
            }
        })
}
