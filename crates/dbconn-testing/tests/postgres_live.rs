//! Live PostgreSQL tests.
//!
//! These start a container and need Docker:
//!
//! ```text
//! cargo test -p dbconn-testing --features postgres -- --ignored
//! ```

#![cfg(feature = "postgres")]
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use dbconn_client::{
    Client, ClientOption, Config, Context, DataSource, FailureReason, PostgresDriver, SslMode,
};
use dbconn_testing::init_tracing;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

async fn start_postgres() -> (ContainerAsync<GenericImage>, u16) {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(5432.tcp())
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_startup_timeout(Duration::from_secs(120))
        .with_env_var("POSTGRES_HOST_AUTH_METHOD", "trust")
        .start()
        .await
        .expect("failed to start PostgreSQL container");

    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to resolve mapped port");
    (container, port)
}

fn live_config(port: u16) -> Config {
    Config::new()
        .data_source(
            DataSource::new()
                .host("127.0.0.1")
                .port(port)
                .user("postgres")
                .dbname("postgres")
                .sslmode(SslMode::Disable)
                .application_name("dbconn-live-test"),
        )
        .max_open_connections(4)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_connect_ping_close() {
    init_tracing();
    let (_container, port) = start_postgres().await;

    // The server may still be restarting after init; the retry loop covers it.
    let client = Client::connect(
        &Context::background().with_timeout(Duration::from_secs(60)),
        &PostgresDriver,
        live_config(port),
        [
            ClientOption::MaxRetries(6),
            ClientOption::RetryDelay(Duration::from_millis(500)),
        ],
    )
    .await
    .expect("client should connect");

    client.ping(&Context::background()).await.unwrap();

    let stats = client.stats();
    assert_eq!(stats.max_open_connections, 4);
    assert_eq!(stats.in_use, 0);
    assert!(stats.open_connections >= 1);

    let conn = client.db().get().await.unwrap();
    let rows = conn.simple_query("SELECT 1").await.unwrap();
    assert!(!rows.is_empty());
    drop(conn);

    client.close().unwrap();
    let err = client.ping(&Context::background()).await.unwrap_err();
    assert_eq!(err.reason(), Some(FailureReason::Unreachable));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_wrong_database_exhausts_retries() {
    let (_container, port) = start_postgres().await;
    let mut config = live_config(port);
    config.data_source.dbname = "does_not_exist".to_string();

    let err = Client::connect(
        &Context::background(),
        &PostgresDriver,
        config,
        [
            ClientOption::MaxRetries(2),
            ClientOption::RetryDelay(Duration::from_millis(100)),
        ],
    )
    .await
    .unwrap_err();

    assert_eq!(
        err.reason(),
        Some(FailureReason::RetriesExhausted { attempts: 2 })
    );
}
