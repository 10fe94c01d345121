use std::sync::Arc;

use anyhow::{Error, Result};
use futures_util::{Stream, StreamExt};
use tokio::{
    sync::{Semaphore, watch},
    task::JoinSet,
};
use tracing::{debug, error, info, warn};

use crate::{
    delivery::{DeliveryChannel, QueueActions},
    dispatcher::process_message,
    models::{message::InboundMessage, retry::RetryConfig},
};

/// Feeds inbound messages to the dispatcher, at most `concurrency` at a time.
pub struct Worker<Q: QueueActions + 'static> {
    queue: Arc<Q>,
    channel: Arc<dyn DeliveryChannel>,
    retry_config: Arc<RetryConfig>,
    permits: Arc<Semaphore>,
}

impl<Q: QueueActions + 'static> Worker<Q> {
    pub fn new(
        queue: Arc<Q>,
        channel: Arc<dyn DeliveryChannel>,
        retry_config: RetryConfig,
        concurrency: usize,
    ) -> Self {
        Self {
            queue,
            channel,
            retry_config: Arc::new(retry_config),
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Runs until the stream ends or shutdown is signalled, then waits for
    /// every in-flight message to reach its outcome.
    pub async fn run<S>(
        &self,
        mut messages: S,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), Error>
    where
        S: Stream<Item = Result<InboundMessage, Error>> + Unpin,
    {
        info!(
            channel = self.channel.name(),
            max_attempts = self.retry_config.max_attempts,
            "Starting email worker"
        );

        let mut tasks = JoinSet::new();

        loop {
            while let Some(finished) = tasks.try_join_next() {
                if let Err(e) = finished {
                    error!(error = %e, "Dispatch task panicked");
                }
            }

            // Wait for a free slot before pulling the next message.
            let permit = tokio::select! {
                Ok(_) = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("Shutdown signal received, stopping worker");
                    break;
                }
                permit = self.permits.clone().acquire_owned() => permit?,
            };

            let next = tokio::select! {
                Ok(_) = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("Shutdown signal received, stopping worker");
                    break;
                }
                next = messages.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    warn!(error = %e, "Failed to receive message");
                    continue;
                }
                None => {
                    info!("Message stream closed");
                    break;
                }
            };

            let queue = Arc::clone(&self.queue);
            let channel = Arc::clone(&self.channel);
            let retry_config = Arc::clone(&self.retry_config);

            tasks.spawn(async move {
                let _permit = permit;
                handle_message(message, channel.as_ref(), queue.as_ref(), &retry_config).await;
            });
        }

        debug!(in_flight = tasks.len(), "Draining in-flight messages");

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                error!(error = %e, "Dispatch task panicked");
            }
        }

        info!("Email worker stopped");

        Ok(())
    }
}

async fn handle_message<Q: QueueActions>(
    message: InboundMessage,
    channel: &dyn DeliveryChannel,
    queue: &Q,
    retry_config: &RetryConfig,
) {
    match process_message(&message, channel, queue, retry_config).await {
        Ok(outcome) => {
            debug!(message_id = %message.message_id, %outcome, "Message resolved");
        }
        Err(e) => {
            error!(
                message_id = %message.message_id,
                error = %e,
                "Terminal queue action failed, requeueing message"
            );

            if let Err(e) = queue.requeue(&message).await {
                error!(message_id = %message.message_id, error = %e, "Failed to requeue message");
            }
        }
    }
}
