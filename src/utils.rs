use std::fmt::{Display, Formatter};

use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

use crate::models::retry::RetryConfig;

/// Returned when every attempt failed.
#[derive(Debug)]
pub struct RetryError<E> {
    pub attempts: u32,
    /// `None` only when the policy allowed zero attempts.
    pub last_error: Option<E>,
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.last_error {
            Some(e) => write!(f, "{:#}", e),
            None => write!(f, "no attempt was made"),
        }
    }
}

impl<E: std::fmt::Debug + Display> std::error::Error for RetryError<E> {}

pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    let mut delay_ms = config.initial_delay_ms;
    let mut last_error = None;

    while attempt < config.max_attempts {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        attempt,
                        max_attempts = config.max_attempts,
                        "Retry succeeded"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = config.max_attempts,
                    error = %format!("{:#}", e),
                    "Attempt failed"
                );
                last_error = Some(e);

                if attempt >= config.max_attempts {
                    break;
                }

                if delay_ms > 0 {
                    debug!(
                        attempt,
                        max_attempts = config.max_attempts,
                        delay_ms,
                        "Backing off before next attempt"
                    );

                    let jitter = rand::random_range(-0.1..=0.1);
                    let jittered_delay = (delay_ms as f64 * (1.0 + jitter)) as u64;

                    sleep(Duration::from_millis(jittered_delay)).await;

                    delay_ms = std::cmp::min(
                        delay_ms.saturating_mul(config.backoff_multiplier),
                        config.max_delay_ms.max(config.initial_delay_ms),
                    );
                }
            }
        }
    }

    warn!(
        attempts = attempt,
        max_attempts = config.max_attempts,
        "Retry failed after exhausting all attempts"
    );

    Err(RetryError {
        attempts: attempt,
        last_error,
    })
}
