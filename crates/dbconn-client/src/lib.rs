//! # dbconn-client
//!
//! Resilient async database client with bounded connect retry.
//!
//! Establishing a [`Client`] validates the configuration, opens a pool and
//! verifies it with a ping, retrying with exponential backoff until it
//! succeeds, the retry budget is spent or the caller's [`Context`] ends. The
//! pool is then tuned with the configured size and lifetime limits.
//!
//! ## Features
//!
//! - **Bounded retry**: at most `max_retries` attempts, delays doubling from
//!   `retry_delay` up to 30 seconds
//! - **Cancellation**: a [`Context`] (token plus optional deadline) stops the
//!   wait between attempts
//! - **Retry observer**: a callback invoked for every failed attempt that
//!   will be retried
//! - **Driver-agnostic**: any [`Driver`] producing a
//!   [`ConnectionLifecycle`](dbconn_pool::ConnectionLifecycle) works
//! - **PostgreSQL**: `tokio-postgres` driver behind the `postgres` feature
//! - **Telemetry**: OpenTelemetry spans and metrics behind the `otel` feature
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbconn_client::{Client, ClientOption, Config, Context, PostgresDriver};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_connection_string(
//!         "host=localhost user=app password=secret dbname=app"
//!     )?
//!     .max_open_connections(20);
//!
//!     let ctx = Context::background().with_timeout(Duration::from_secs(30));
//!     let client = Client::connect(&ctx, &PostgresDriver, config, [
//!         ClientOption::MaxRetries(5),
//!         ClientOption::on_retry(|attempt, err| eprintln!("attempt {attempt}: {err}")),
//!     ])
//!     .await?;
//!
//!     let stats = client.stats();
//!     println!("{} connections open", stats.open_connections);
//!
//!     client.close()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod client;
pub mod config;
pub mod connector;
pub mod context;
pub mod error;
pub mod instrumentation;
pub mod naming;
pub mod options;
pub mod pool_config;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod stats;

// Re-export commonly used types
pub use backoff::backoff;
pub use client::{Client, ClientBuilder};
pub use config::{Config, DataSource, SslMode};
pub use connector::{ConnectState, Driver, OpenRequest, connect};
pub use context::{CancelCause, Context};
pub use error::{Error, FailureReason, Result};
pub use naming::{NamingStrategy, SnakeCaseNaming};
pub use options::{ClientOption, Options, RetryObserver};
pub use pool_config::configure_pool;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresDriver, PostgresLifecycle};
pub use stats::ConnectionStats;

pub use dbconn_pool::{Pool, PoolError, PooledConnection};
