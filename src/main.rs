use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use email_service::{
    api::run_api_server,
    clients::{health::HealthChecker, rbmq::RabbitMqClient, smtp::SmtpChannel},
    config::Config,
    models::message::InboundMessage,
    worker::Worker,
};
use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Error> {
    fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let config = Config::load()?;

    info!("Configuration validated. Worker is starting.");

    let rabbitmq = Arc::new(RabbitMqClient::connect(&config).await?);
    let smtp = Arc::new(SmtpChannel::new(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let health_checker = HealthChecker::new(Arc::clone(&rabbitmq), Arc::clone(&smtp));
    let api = tokio::spawn(run_api_server(
        config.server_port,
        health_checker,
        shutdown_rx.clone(),
    ));

    let signal_tx = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        let _ = signal_tx.send(true);
    });

    let consumer = rabbitmq.create_consumer().await?;
    let messages = Box::pin(consumer.map(|delivery| {
        delivery
            .map(InboundMessage::from)
            .map_err(|e| anyhow!("Failed to receive delivery: {}", e))
    }));

    let worker = Worker::new(
        Arc::clone(&rabbitmq),
        smtp,
        config.retry_config(),
        config.worker_concurrency,
    );
    worker.run(messages, shutdown_rx).await?;

    // The consumer may also end on its own, so stop the health server too.
    let _ = shutdown_tx.send(true);

    match api.await {
        Ok(Err(e)) => warn!(error = %e, "Health check server exited with an error"),
        Err(e) => warn!(error = %e, "Health check server task failed"),
        Ok(Ok(())) => {}
    }

    rabbitmq.close().await?;

    Ok(())
}
