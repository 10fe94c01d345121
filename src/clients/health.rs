use std::{collections::HashMap, sync::Arc, time::Instant};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::{
    clients::{rbmq::RabbitMqClient, smtp::SmtpChannel},
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

pub const MESSAGE_BROKER: &str = "message_broker";
pub const SMTP: &str = "smtp";

pub struct HealthChecker {
    rabbitmq: Arc<RabbitMqClient>,
    smtp: Arc<SmtpChannel>,
}

impl HealthChecker {
    pub fn new(rabbitmq: Arc<RabbitMqClient>, smtp: Arc<SmtpChannel>) -> Self {
        Self { rabbitmq, smtp }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        checks.insert(MESSAGE_BROKER.to_string(), self.check_rabbitmq());
        checks.insert(SMTP.to_string(), self.check_smtp().await);

        HealthCheckResponse {
            status: determine_overall_status(&checks),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            checks,
        }
    }

    fn check_rabbitmq(&self) -> ServiceHealth {
        if self.rabbitmq.is_connected() {
            debug!("RabbitMQ health check passed");
            ServiceHealth::healthy(0)
        } else {
            warn!("RabbitMQ connection is not open");
            ServiceHealth::unhealthy("Connection is not open".to_string())
        }
    }

    async fn check_smtp(&self) -> ServiceHealth {
        let start = Instant::now();

        match self.smtp.health_check().await {
            Ok(()) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "SMTP health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                // Sends are retried and dead-lettered, so the worker keeps running.
                warn!(error = %e, "SMTP health check failed");
                ServiceHealth::degraded(format!("{:#}", e))
            }
        }
    }
}

/// The broker is critical; anything else can only degrade the service.
pub fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
    let has_unhealthy = checks
        .values()
        .any(|health| health.status == HealthStatus::Unhealthy);

    let has_degraded = checks
        .values()
        .any(|health| health.status == HealthStatus::Degraded);

    if has_unhealthy {
        HealthStatus::Unhealthy
    } else if has_degraded {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
