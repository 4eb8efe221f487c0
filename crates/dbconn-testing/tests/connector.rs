//! Retry loop behavior of the connector and `Client::connect`.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use dbconn_client::{
    CancelCause, Client, ClientBuilder, ClientOption, Context, FailureReason, Options, connect,
};
use dbconn_testing::{MockDriver, init_tracing, test_config};
use parking_lot::Mutex;
use tokio::time::Instant;

fn fast_options(max_retries: u32) -> Options {
    Options::from_overrides([
        ClientOption::MaxRetries(max_retries),
        ClientOption::RetryDelay(Duration::from_secs(1)),
    ])
}

// ============================================================================
// Exhaustion
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_always_failing_makes_exactly_max_attempts() {
    init_tracing();
    let driver = MockDriver::always_failing();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&observed);

    let err = Client::connect(
        &Context::background(),
        &driver,
        test_config(),
        [
            ClientOption::MaxRetries(4),
            ClientOption::on_retry(move |attempt, _| seen.lock().push(attempt)),
        ],
    )
    .await
    .unwrap_err();

    assert_eq!(driver.attempts(), 4);
    assert_eq!(
        err.reason(),
        Some(FailureReason::RetriesExhausted { attempts: 4 })
    );
    assert_eq!(err.attempts(), Some(4));
    assert_eq!(*observed.lock(), vec![1, 2, 3]);
    assert!(err.to_string().starts_with("connection failed: gave up after 4 attempts"));
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_never_notifies_observer() {
    let driver = MockDriver::always_failing();
    let calls = Arc::new(Mutex::new(0u32));
    let seen = Arc::clone(&calls);

    let options = fast_options(1).apply(ClientOption::on_retry(move |_, _| *seen.lock() += 1));

    let start = Instant::now();
    let err = connect(&Context::background(), &driver, &test_config(), &options)
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), Some(1));
    assert_eq!(*calls.lock(), 0);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_waits_between_attempts() {
    let driver = MockDriver::always_failing();

    let start = Instant::now();
    let err = connect(&Context::background(), &driver, &test_config(), &fast_options(3))
        .await
        .unwrap_err();

    // 1s after the first failure, 2s after the second, none after the last.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_millis(3100));
    assert_eq!(err.attempts(), Some(3));
}

// ============================================================================
// Success after transient failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_one_failure_then_success() {
    let driver = MockDriver::failing_first(1);

    let start = Instant::now();
    let client = Client::connect(
        &Context::background(),
        &driver,
        test_config(),
        [
            ClientOption::MaxRetries(3),
            ClientOption::RetryDelay(Duration::from_secs(1)),
        ],
    )
    .await
    .unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(3));
    assert_eq!(driver.attempts(), 2);
    assert_eq!(client.stats().in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn test_two_failures_then_success() {
    let driver = MockDriver::failing_first(2);
    let observed = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&observed);

    let start = Instant::now();
    let client = ClientBuilder::new(test_config())
        .max_retries(3)
        .retry_delay(Duration::from_secs(1))
        .on_retry(move |attempt, err| seen.lock().push((attempt, err.to_string())))
        .connect(&Context::background(), &driver)
        .await
        .unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_millis(3100));
    assert_eq!(driver.attempts(), 3);

    let observed = observed.lock();
    assert_eq!(observed.len(), 2);
    assert_eq!(observed[0].0, 1);
    assert!(observed[0].1.contains("connection refused (attempt 1)"));
    assert_eq!(observed[1].0, 2);

    let conn = client.db().get().await.unwrap();
    assert_eq!(conn.attempt, 3);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_cancel_after_first_failure_stops_retrying() {
    let driver = MockDriver::always_failing();
    let ctx = Context::background();
    let cancel = ctx.clone();

    let err = Client::connect(
        &ctx,
        &driver,
        test_config(),
        [
            ClientOption::MaxRetries(3),
            ClientOption::on_retry(move |_, _| cancel.cancel()),
        ],
    )
    .await
    .unwrap_err();

    assert_eq!(driver.attempts(), 1);
    assert_eq!(
        err.reason(),
        Some(FailureReason::Cancelled {
            attempts: 1,
            cause: CancelCause::Cancelled,
        })
    );
    assert_eq!(err.cancel_cause(), Some(CancelCause::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_shorter_than_backoff() {
    let driver = MockDriver::always_failing();
    let ctx = Context::background().with_timeout(Duration::from_millis(500));

    let start = Instant::now();
    let err = connect(&ctx, &driver, &test_config(), &fast_options(3))
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(driver.attempts(), 1);
    assert_eq!(err.cancel_cause(), Some(CancelCause::DeadlineExceeded));
    assert_eq!(err.attempts(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_context_does_not_stop_first_attempt() {
    let driver = MockDriver::new();
    let ctx = Context::background();
    ctx.cancel();

    let client = Client::connect(&ctx, &driver, test_config(), []).await;
    assert!(client.is_ok());
    assert_eq!(driver.attempts(), 1);
}

// ============================================================================
// Terminal errors
// ============================================================================

#[tokio::test]
async fn test_invalid_config_is_never_attempted() {
    let driver = MockDriver::new();
    let mut config = test_config();
    config.data_source.host = String::new();

    let err = Client::connect(&Context::background(), &driver, config, [])
        .await
        .unwrap_err();

    assert!(err.is_invalid_config());
    assert_eq!(driver.attempts(), 0);
}

#[tokio::test]
async fn test_driver_rejection_is_not_retried() {
    let driver = MockDriver::rejecting();

    let err = connect(&Context::background(), &driver, &test_config(), &fast_options(5))
        .await
        .unwrap_err();

    assert!(err.is_invalid_config());
    assert_eq!(driver.attempts(), 1);
}

// ============================================================================
// Driver requests
// ============================================================================

#[tokio::test]
async fn test_driver_receives_connection_string_and_timeout_hint() {
    let driver = MockDriver::new();
    let config = test_config();
    let expected = config.data_source.connection_string();

    let _client = Client::connect(
        &Context::background(),
        &driver,
        config,
        [ClientOption::ConnectTimeout(Duration::from_secs(4))],
    )
    .await
    .unwrap();

    let requests = driver.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].connection_string, expected);
    assert_eq!(requests[0].connect_timeout, Duration::from_secs(4));
}
