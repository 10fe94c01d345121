use std::collections::HashMap;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
        BasicRejectOptions, ConfirmSelectOptions, QueueDeclareOptions,
    },
    types::{AMQPValue, FieldTable, LongString, ShortString},
};
use tracing::{debug, info};

use crate::{config::Config, delivery::QueueActions, models::message::InboundMessage};

pub const FAILED_AT_HEADER: &str = "x-failed-at";
pub const ORIGINAL_QUEUE_HEADER: &str = "x-original-queue";

pub struct RabbitMqClient {
    connection: Connection,
    channel: Channel,
    email_queue_name: String,
    dead_letter_queue_name: String,
}

impl RabbitMqClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        info!("Connecting to RabbitMQ...");

        let connection = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        debug!("RabbitMQ connection established");

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to set up QoS"))?;

        debug!(prefetch_count = config.prefetch_count, "Prefetch count set");

        // Dead-letter publishes must be confirmed before the original is acked.
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to enable publisher confirms"))?;

        for queue_name in [&config.email_queue_name, &config.dead_letter_queue_name] {
            channel
                .queue_declare(
                    queue_name,
                    QueueDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|_| anyhow!("Failed to declare queue {}", queue_name))?;

            debug!(queue = %queue_name, "Queue declared");
        }

        info!(
            queue = %config.email_queue_name,
            dead_letter_queue = %config.dead_letter_queue_name,
            "RabbitMQ client ready"
        );

        Ok(Self {
            connection,
            channel,
            email_queue_name: config.email_queue_name.clone(),
            dead_letter_queue_name: config.dead_letter_queue_name.clone(),
        })
    }

    pub async fn create_consumer(&self) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                &self.email_queue_name,
                "email_worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|_| anyhow!("Failed to create consumer"))?;

        info!(queue = %self.email_queue_name, "Consumer created for queue");

        Ok(consumer)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    pub async fn close(&self) -> Result<(), Error> {
        self.connection
            .close(200, "worker shutting down")
            .await
            .map_err(|e| anyhow!("Failed to close RabbitMQ connection: {}", e))?;

        Ok(())
    }

    fn dead_letter_headers(&self, properties: HashMap<String, String>) -> FieldTable {
        let mut headers = FieldTable::default();

        for (key, value) in properties {
            headers.insert(
                ShortString::from(key),
                AMQPValue::LongString(LongString::from(value)),
            );
        }

        headers.insert(
            ShortString::from(FAILED_AT_HEADER),
            AMQPValue::LongString(LongString::from(
                Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            )),
        );
        headers.insert(
            ShortString::from(ORIGINAL_QUEUE_HEADER),
            AMQPValue::LongString(LongString::from(self.email_queue_name.clone())),
        );

        headers
    }
}

#[async_trait]
impl QueueActions for RabbitMqClient {
    async fn acknowledge(&self, message: &InboundMessage) -> Result<(), Error> {
        self.channel
            .basic_ack(message.delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|_| anyhow!("Failed to acknowledge message {}", message.message_id))?;

        Ok(())
    }

    async fn dead_letter(
        &self,
        message: &InboundMessage,
        properties: HashMap<String, String>,
    ) -> Result<(), Error> {
        let headers = self.dead_letter_headers(properties);

        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.dead_letter_queue_name,
                BasicPublishOptions::default(),
                &message.payload,
                BasicProperties::default()
                    .with_delivery_mode(2)
                    .with_message_id(ShortString::from(message.message_id.clone()))
                    .with_headers(headers),
            )
            .await
            .map_err(|_| anyhow!("Failed to publish message to dlq"))?
            .await
            .map_err(|_| anyhow!("Failed to confirm dlq publish"))?;

        if confirmation.is_nack() {
            return Err(anyhow!(
                "Broker refused dead-letter for message {}",
                message.message_id
            ));
        }

        // Only drop the original once the copy is safely in the DLQ.
        self.acknowledge(message).await
    }

    async fn requeue(&self, message: &InboundMessage) -> Result<(), Error> {
        self.channel
            .basic_reject(message.delivery_tag, BasicRejectOptions { requeue: true })
            .await
            .map_err(|_| anyhow!("Failed to requeue message {}", message.message_id))?;

        Ok(())
    }
}
