use anyhow::{Result, anyhow};
use email_service::{models::retry::RetryConfig, utils::retry_with_backoff};
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use tokio::time::Instant;

/// Test: Successful operations complete without retry
#[tokio::test]
async fn test_successful_operation_no_retry() -> Result<()> {
    let config = RetryConfig::default();

    let attempt_count = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempt_count);

    let result = retry_with_backoff(&config, || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>("success")
        }
    })
    .await?;

    assert_eq!(result, "success");
    assert_eq!(
        attempt_count.load(Ordering::SeqCst),
        1,
        "Should only attempt once"
    );

    Ok(())
}

/// Test: Transient failures are retried until one succeeds
#[tokio::test]
async fn test_transient_failures_are_retried() -> Result<()> {
    let config = RetryConfig::default();

    let attempt_count = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempt_count);

    let result = retry_with_backoff(&config, || {
        let counter = Arc::clone(&counter);
        async move {
            let attempts = counter.fetch_add(1, Ordering::SeqCst);

            // Fail first 2 attempts, succeed on 3rd
            if attempts < 2 {
                Err(anyhow!("Transient error"))
            } else {
                Ok("success")
            }
        }
    })
    .await?;

    assert_eq!(result, "success");
    assert_eq!(
        attempt_count.load(Ordering::SeqCst),
        3,
        "Should retry 2 times then succeed"
    );

    Ok(())
}

/// Test: Permanent failures exhaust retries and keep the last error
#[tokio::test]
async fn test_permanent_failure_exhausts_retries() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 4,
        ..RetryConfig::default()
    };

    let attempt_count = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempt_count);

    let result = retry_with_backoff(&config, || {
        let counter = Arc::clone(&counter);
        async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<String, _>(anyhow!("Failure number {}", attempt))
        }
    })
    .await;

    let error = result.expect_err("Should fail after max attempts");
    assert_eq!(error.attempts, 4);
    assert_eq!(error.to_string(), "Failure number 4");
    assert_eq!(
        attempt_count.load(Ordering::SeqCst),
        4,
        "Should attempt exactly max_attempts times"
    );

    Ok(())
}

/// Test: The error chain of the last failure is preserved
#[tokio::test]
async fn test_error_context_is_kept() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 1,
        ..RetryConfig::default()
    };

    let result = retry_with_backoff(&config, || async {
        Err::<(), _>(anyhow!("connection refused").context("Failed to send email"))
    })
    .await;

    assert_eq!(
        result.unwrap_err().to_string(),
        "Failed to send email: connection refused"
    );

    Ok(())
}

/// Test: Zero attempts runs nothing and reports no error
#[tokio::test]
async fn test_zero_attempts_never_calls_operation() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 0,
        ..RetryConfig::default()
    };

    let attempt_count = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempt_count);

    let result = retry_with_backoff(&config, || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(())
        }
    })
    .await;

    let error = result.expect_err("Nothing was attempted");
    assert_eq!(error.attempts, 0);
    assert!(error.last_error.is_none());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 0);

    Ok(())
}

/// Test: Default policy retries immediately
#[tokio::test]
async fn test_default_policy_has_no_delay() -> Result<()> {
    let config = RetryConfig::default();

    let start = Instant::now();
    let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let times = Arc::clone(&attempt_times);

    let _ = retry_with_backoff(&config, || {
        let times = Arc::clone(&times);
        async move {
            times.lock().await.push(start.elapsed().as_millis());
            Err::<(), _>(anyhow!("Fail"))
        }
    })
    .await;

    let times = attempt_times.lock().await;

    assert_eq!(times.len(), 3);
    assert!(
        times[2] < 50,
        "Attempts should follow each other immediately (last at {}ms)",
        times[2]
    );

    Ok(())
}

/// Test: Retry delays follow exponential backoff
#[tokio::test]
async fn test_exponential_backoff_timing() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 4,
        initial_delay_ms: 100,
        max_delay_ms: 1000,
        backoff_multiplier: 2,
    };

    let start = Instant::now();
    let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let times = Arc::clone(&attempt_times);

    let _ = retry_with_backoff(&config, || {
        let times = Arc::clone(&times);
        async move {
            let elapsed = start.elapsed().as_millis();
            times.lock().await.push(elapsed);
            Err::<String, _>(anyhow!("Fail"))
        }
    })
    .await;

    let times = attempt_times.lock().await;

    assert_eq!(times.len(), 4);

    assert!(times[0] < 50, "First attempt should be immediate");

    for i in 1..times.len() {
        let delay = times[i] - times[i - 1];
        let expected_min =
            (config.initial_delay_ms * config.backoff_multiplier.pow(i as u32 - 1)) * 8 / 10;

        assert!(
            delay >= expected_min as u128,
            "Delay {} should be at least {} (actual: {})",
            i,
            expected_min,
            delay
        );
    }

    Ok(())
}

/// Test: Max delay cap is respected
#[tokio::test(start_paused = true)]
async fn test_max_delay_cap_respected() -> Result<()> {
    let config = RetryConfig {
        max_attempts: 6,
        initial_delay_ms: 100,
        max_delay_ms: 300,
        backoff_multiplier: 2,
    };

    let start = Instant::now();
    let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let times = Arc::clone(&attempt_times);

    let _ = retry_with_backoff(&config, || {
        let times = Arc::clone(&times);
        async move {
            let elapsed = start.elapsed().as_millis();
            times.lock().await.push(elapsed);
            Err::<String, _>(anyhow!("Fail"))
        }
    })
    .await;

    let times = attempt_times.lock().await;

    for i in 3..times.len() {
        let delay = times[i] - times[i - 1];
        assert!(
            delay <= (config.max_delay_ms * 12 / 10) as u128,
            "Delay should not exceed max_delay_ms cap"
        );
    }

    Ok(())
}

/// Test: Retry state is independent per operation
#[tokio::test]
async fn test_retry_state_independence() -> Result<()> {
    let config = Arc::new(RetryConfig {
        max_attempts: 5,
        initial_delay_ms: 10,
        max_delay_ms: 50,
        backoff_multiplier: 2,
    });

    // Operation 1: Fails permanently
    let config1 = Arc::clone(&config);
    let handle1 = tokio::spawn(async move {
        retry_with_backoff(&config1, || async {
            Err::<String, _>(anyhow!("Always fail"))
        })
        .await
        .is_err()
    });

    // Operation 2: Succeeds after 2 failures
    let config2 = Arc::clone(&config);
    let counter2 = Arc::new(AtomicU32::new(0));
    let counter2_clone = Arc::clone(&counter2);
    let handle2 = tokio::spawn(async move {
        retry_with_backoff(&config2, || {
            let counter = Arc::clone(&counter2_clone);
            async move {
                let attempts = counter.fetch_add(1, Ordering::SeqCst);
                if attempts < 2 {
                    Err(anyhow!("Fail"))
                } else {
                    Ok("success")
                }
            }
        })
        .await
        .is_ok()
    });

    let (failed, succeeded) = tokio::join!(handle1, handle2);

    assert!(failed?, "Operation 1 should fail");
    assert!(succeeded?, "Operation 2 should succeed");
    assert_eq!(
        counter2.load(Ordering::SeqCst),
        3,
        "Operation 2 should make 3 attempts"
    );

    Ok(())
}
