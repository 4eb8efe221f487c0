//! # dbconn-testing
//!
//! Test infrastructure for the dbconn workspace.
//!
//! [`MockDriver`] is a scripted driver: it can fail a fixed number of
//! connection attempts, reject connection strings outright, or report the
//! database as unreachable, and it records every request it sees. Tests that
//! need both the client and a driver live in this crate's `tests/` directory.
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbconn_client::{Client, Context};
//! use dbconn_testing::{MockDriver, test_config};
//!
//! let driver = MockDriver::failing_first(2);
//! let client = Client::connect(&Context::background(), &driver, test_config(), []).await?;
//! assert_eq!(driver.attempts(), 3);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dbconn_client::{Config, DataSource, Driver, OpenRequest};
use dbconn_pool::{BoxError, ConnectionLifecycle, Pool, PoolConfig, PoolError};
use parking_lot::Mutex;
use thiserror::Error;

/// Errors produced by the mock driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MockError {
    /// A scripted connection failure.
    #[error("connection refused (attempt {attempt})")]
    ConnectionRefused {
        /// The connector attempt that failed.
        attempt: u32,
    },

    /// The database was marked unreachable.
    #[error("database unreachable")]
    Unreachable,

    /// The driver was told to reject every connection string.
    #[error("connection string rejected")]
    Rejected,
}

/// A request the mock driver received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// The connection string.
    pub connection_string: String,
    /// The connect timeout hint.
    pub connect_timeout: Duration,
}

#[derive(Debug, Default)]
struct MockState {
    fail_first: AtomicU32,
    attempts: AtomicU32,
    connections_opened: AtomicU32,
    unreachable: AtomicBool,
    reject: AtomicBool,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Scripted driver for tests.
///
/// Each call to [`Driver::lifecycle`] is one connector attempt. Clones share
/// state, so a test can keep a handle while the client owns another.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    /// A driver whose connections always succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver that fails the first `failures` attempts.
    #[must_use]
    pub fn failing_first(failures: u32) -> Self {
        let driver = Self::new();
        driver.state.fail_first.store(failures, Ordering::SeqCst);
        driver
    }

    /// A driver that never connects.
    #[must_use]
    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    /// A driver that rejects every connection string.
    #[must_use]
    pub fn rejecting() -> Self {
        let driver = Self::new();
        driver.state.reject.store(true, Ordering::SeqCst);
        driver
    }

    /// Mark the database reachable or unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Connector attempts seen so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.state.attempts.load(Ordering::SeqCst)
    }

    /// Connections successfully opened so far.
    #[must_use]
    pub fn connections_opened(&self) -> u32 {
        self.state.connections_opened.load(Ordering::SeqCst)
    }

    /// Every request received, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }
}

impl Driver for MockDriver {
    type Lifecycle = MockLifecycle;

    fn name(&self) -> &str {
        "mock"
    }

    fn lifecycle(&self, request: &OpenRequest<'_>) -> Result<MockLifecycle, BoxError> {
        let attempt = self.state.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.requests.lock().push(RecordedRequest {
            connection_string: request.connection_string.to_string(),
            connect_timeout: request.connect_timeout,
        });

        if self.state.reject.load(Ordering::SeqCst) {
            return Err(Box::new(MockError::Rejected));
        }

        tracing::trace!(attempt, "mock driver building lifecycle");
        Ok(MockLifecycle {
            attempt,
            state: Arc::clone(&self.state),
        })
    }
}

/// Connection produced by [`MockLifecycle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockConnection {
    /// 1-based connection number across the driver.
    pub id: u32,
    /// The connector attempt that created the lifecycle.
    pub attempt: u32,
}

/// Lifecycle for a single connector attempt.
#[derive(Debug, Clone)]
pub struct MockLifecycle {
    attempt: u32,
    state: Arc<MockState>,
}

impl MockLifecycle {
    fn check_reachable(&self) -> Result<(), MockError> {
        if self.state.unreachable.load(Ordering::SeqCst) {
            return Err(MockError::Unreachable);
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectionLifecycle for MockLifecycle {
    type Connection = MockConnection;
    type Error = MockError;

    async fn connect(&self) -> Result<MockConnection, MockError> {
        if self.attempt <= self.state.fail_first.load(Ordering::SeqCst) {
            return Err(MockError::ConnectionRefused {
                attempt: self.attempt,
            });
        }
        self.check_reachable()?;

        let id = self.state.connections_opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockConnection {
            id,
            attempt: self.attempt,
        })
    }

    async fn health_check(&self, _conn: &mut MockConnection) -> Result<(), MockError> {
        self.check_reachable()
    }
}

/// A configuration that passes validation.
#[must_use]
pub fn test_config() -> Config {
    Config::new().data_source(
        DataSource::new()
            .host("db.test")
            .user("tester")
            .password("secret")
            .dbname("testdb"),
    )
}

/// A pool backed by a healthy mock driver.
pub fn mock_pool(config: PoolConfig) -> Result<Pool<MockLifecycle>, PoolError> {
    let settings = test_config();
    let connection_string = settings.data_source.connection_string();
    let request = OpenRequest {
        connection_string: &connection_string,
        config: &settings,
        connect_timeout: Duration::from_secs(1),
    };
    let lifecycle = MockDriver::new()
        .lifecycle(&request)
        .map_err(PoolError::Connect)?;
    Pool::new(lifecycle, config)
}

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(config: &Config) -> (String, Duration) {
        (config.data_source.connection_string(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_failing_first_counts_attempts() {
        let driver = MockDriver::failing_first(1);
        let config = test_config();
        let (conn_str, timeout) = request(&config);
        let open = OpenRequest {
            connection_string: &conn_str,
            config: &config,
            connect_timeout: timeout,
        };

        let first = driver.lifecycle(&open).unwrap();
        assert_eq!(
            first.connect().await.unwrap_err(),
            MockError::ConnectionRefused { attempt: 1 }
        );

        let second = driver.lifecycle(&open).unwrap();
        let conn = second.connect().await.unwrap();
        assert_eq!(conn, MockConnection { id: 1, attempt: 2 });
        assert_eq!(driver.attempts(), 2);
        assert_eq!(driver.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_fails_health_check() {
        let pool = mock_pool(PoolConfig::default()).unwrap();
        pool.ping().await.unwrap();

        let driver = MockDriver {
            state: Arc::clone(&pool.lifecycle().state),
        };
        driver.set_reachable(false);
        assert!(pool.ping().await.is_err());
    }
}
