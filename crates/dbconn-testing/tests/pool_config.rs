//! Applying configured limits to a pool.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use dbconn_client::{ClientOption, FailureReason, Options, configure_pool};
use dbconn_pool::{DEFAULT_MAX_IDLE_CONNECTIONS, PoolConfig};
use dbconn_testing::{mock_pool, test_config};

#[tokio::test]
async fn test_defaults_applied_when_unset() {
    let pool = mock_pool(PoolConfig::default()).unwrap();

    configure_pool(&pool, &test_config(), &Options::default()).unwrap();

    let applied = pool.config();
    assert_eq!(applied.max_open_connections, 0);
    assert_eq!(applied.max_idle_connections, DEFAULT_MAX_IDLE_CONNECTIONS);
    assert_eq!(applied.conn_max_lifetime, Some(Duration::from_secs(3600)));
    assert_eq!(applied.conn_max_idle_time, Some(Duration::from_secs(600)));
}

#[tokio::test]
async fn test_zero_lifetimes_fall_back_to_defaults() {
    let pool = mock_pool(PoolConfig::default()).unwrap();
    let options = Options::from_overrides([
        ClientOption::ConnMaxLifetime(Duration::ZERO),
        ClientOption::ConnMaxIdleTime(Duration::ZERO),
    ]);

    configure_pool(&pool, &test_config(), &options).unwrap();

    let applied = pool.config();
    assert_eq!(applied.conn_max_lifetime, Some(Duration::from_secs(3600)));
    assert_eq!(applied.conn_max_idle_time, Some(Duration::from_secs(600)));
}

#[tokio::test]
async fn test_configure_is_idempotent() {
    let pool = mock_pool(PoolConfig::default()).unwrap();
    let config = test_config()
        .max_open_connections(8)
        .max_idle_connections(4);
    let options = Options::default();

    configure_pool(&pool, &config, &options).unwrap();
    let first = pool.config();
    configure_pool(&pool, &config, &options).unwrap();

    assert_eq!(pool.config(), first);
    assert_eq!(first.max_open_connections, 8);
    assert_eq!(first.max_idle_connections, 4);
}

#[tokio::test]
async fn test_lower_idle_limit_closes_surplus() {
    let pool = mock_pool(PoolConfig::default()).unwrap();
    let held = vec![pool.get().await.unwrap(), pool.get().await.unwrap()];
    drop(held);
    assert_eq!(pool.stats().idle, 2);

    configure_pool(&pool, &test_config().max_idle_connections(1), &Options::default()).unwrap();

    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.max_idle_closed, 1);
}

#[tokio::test]
async fn test_closed_pool_is_rejected() {
    let pool = mock_pool(PoolConfig::default()).unwrap();
    pool.close().unwrap();

    let err = configure_pool(&pool, &test_config(), &Options::default()).unwrap_err();
    assert_eq!(err.reason(), Some(FailureReason::PoolConfiguration));
}
