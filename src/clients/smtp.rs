use std::time::Duration;

use anyhow::{Context, Error, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, info};

use crate::{
    config::Config, delivery::DeliveryChannel, models::notification::NotificationRequest,
};

pub struct SmtpChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: String,
}

impl SmtpChannel {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let credentials =
            Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_endpoint)
            .context("Failed to create SMTP relay")?
            .credentials(credentials)
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.smtp_timeout_seconds)))
            .build();

        info!(
            endpoint = %config.smtp_endpoint,
            port = config.smtp_port,
            "SMTP channel initialized"
        );

        Ok(Self {
            transport,
            sender: config.smtp_sender.clone(),
        })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        let reachable = self
            .transport
            .test_connection()
            .await
            .context("SMTP health check failed")?;

        if !reachable {
            return Err(anyhow!("SMTP server did not accept the connection"));
        }

        Ok(())
    }

    fn build_message(&self, request: &NotificationRequest) -> Result<Message, Error> {
        let from: Mailbox = self.sender.parse().with_context(|| {
            format!(
                "SMTP_SENDER '{}' is not a valid email address. It must be a valid sender email.",
                self.sender
            )
        })?;

        let to = format!("{} <{}>", request.recipient_name(), request.recipient_email())
            .parse::<Mailbox>()
            .or_else(|_| request.recipient_email().parse::<Mailbox>())
            .with_context(|| {
                format!(
                    "RecipientEmail '{}' is not a valid email address.",
                    request.recipient_email()
                )
            })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(request.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(render_body(request))
            .context("Failed to build email message")
    }
}

/// Plain-text body listing the template id and its data, keys sorted.
pub fn render_body(request: &NotificationRequest) -> String {
    let mut body = format!(
        "Hello {},\n\nTemplate: {}\n",
        request.recipient_name(),
        request.template_id()
    );

    let mut entries: Vec<(&String, &String)> = request.template_data().iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

    for (key, value) in entries {
        body.push_str(&format!("{}: {}\n", key, value));
    }

    body
}

#[async_trait]
impl DeliveryChannel for SmtpChannel {
    async fn send(&self, request: &NotificationRequest) -> Result<(), Error> {
        let message = self.build_message(request)?;

        debug!(
            template_id = request.template_id(),
            "Sending email via SMTP"
        );

        self.transport
            .send(message)
            .await
            .with_context(|| format!("Failed to send email to {}", request.recipient_email()))?;

        info!(recipient = request.recipient_email(), "Email sent");

        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
