//! Client lifecycle: ping, stats and close.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use dbconn_client::{
    CancelCause, Client, ClientBuilder, ClientOption, Context, FailureReason, SnakeCaseNaming,
};
use dbconn_testing::{MockDriver, MockLifecycle, test_config};
use tokio_test::{assert_err, assert_ok};

async fn connected(driver: &MockDriver) -> Client<MockLifecycle> {
    Client::connect(&Context::background(), driver, test_config(), [])
        .await
        .unwrap()
}

// ============================================================================
// Stats
// ============================================================================

#[tokio::test]
async fn test_fresh_client_has_nothing_in_use() {
    let client = connected(&MockDriver::new()).await;

    let stats = client.stats();
    assert_eq!(stats.in_use, 0);
    assert_eq!(stats.open_connections, 1);
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.wait_count, 0);
}

#[tokio::test]
async fn test_zero_max_open_keeps_pool_default() {
    let client = connected(&MockDriver::new()).await;
    assert_eq!(client.stats().max_open_connections, 0);
}

#[tokio::test]
async fn test_limits_are_applied() {
    let config = test_config()
        .max_open_connections(5)
        .max_idle_connections(3);
    let client = Client::connect(
        &Context::background(),
        &MockDriver::new(),
        config,
        [ClientOption::ConnMaxLifetime(Duration::from_secs(90))],
    )
    .await
    .unwrap();

    assert_eq!(client.stats().max_open_connections, 5);

    let pool_config = client.db().config();
    assert_eq!(pool_config.max_open_connections, 5);
    assert_eq!(pool_config.max_idle_connections, 3);
    assert_eq!(pool_config.conn_max_lifetime, Some(Duration::from_secs(90)));
    assert_eq!(
        pool_config.conn_max_idle_time,
        Some(Duration::from_secs(600))
    );
}

#[tokio::test]
async fn test_stats_track_checkouts() {
    let driver = MockDriver::new();
    let client = connected(&driver).await;

    let conn = client.db().get().await.unwrap();
    // The connection verified during connect is reused.
    assert_eq!(driver.connections_opened(), 1);
    let stats = client.stats();
    assert_eq!(stats.in_use, 1);
    assert_eq!(stats.idle, 0);

    drop(conn);
    assert_eq!(client.stats().in_use, 0);
}

// ============================================================================
// Ping
// ============================================================================

#[tokio::test]
async fn test_ping_reachable() {
    let client = connected(&MockDriver::new()).await;
    assert_ok!(client.ping(&Context::background()).await);
}

#[tokio::test]
async fn test_ping_unreachable() {
    let driver = MockDriver::new();
    let client = connected(&driver).await;
    driver.set_reachable(false);

    let err = assert_err!(client.ping(&Context::background()).await);
    assert_eq!(err.reason(), Some(FailureReason::Unreachable));
    assert_eq!(err.cancel_cause(), None);

    driver.set_reachable(true);
    assert_ok!(client.ping(&Context::background()).await);
}

#[tokio::test]
async fn test_ping_with_ended_context() {
    let client = connected(&MockDriver::new()).await;
    let ctx = Context::background();
    ctx.cancel();

    let err = assert_err!(client.ping(&ctx).await);
    assert_eq!(err.reason(), Some(FailureReason::Unreachable));
    assert_eq!(err.cancel_cause(), Some(CancelCause::Cancelled));
}

// ============================================================================
// Close
// ============================================================================

#[tokio::test]
async fn test_ping_after_close_fails() {
    let client = connected(&MockDriver::new()).await;
    assert_ok!(client.close());

    let err = assert_err!(client.ping(&Context::background()).await);
    assert_eq!(err.reason(), Some(FailureReason::Unreachable));
    assert!(client.db().is_closed());
    assert_eq!(client.stats().open_connections, 0);
}

#[tokio::test]
async fn test_second_close_fails_with_release() {
    let client = connected(&MockDriver::new()).await;
    assert_ok!(client.close());

    let err = assert_err!(client.close());
    assert_eq!(err.reason(), Some(FailureReason::Release));
    assert!(err.to_string().contains("connection pool is closed"));
}

// ============================================================================
// Construction
// ============================================================================

#[tokio::test]
async fn test_builder_keeps_config() {
    let config = test_config()
        .enable_logging(true)
        .naming_strategy(SnakeCaseNaming::new());
    let client = ClientBuilder::new(config)
        .max_retries(2)
        .connect(&Context::background(), &MockDriver::new())
        .await
        .unwrap();

    assert!(client.config().enable_logging);
    assert!(client.config().naming_strategy.is_some());
    assert_eq!(client.config().data_source.dbname, "testdb");
    assert!(!format!("{client:?}").contains("secret"));
}
