//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Boxed error produced by a connection lifecycle.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while acquiring or managing pooled connections.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool has been closed.
    #[error("connection pool is closed")]
    PoolClosed,

    /// No connection became available within the acquire timeout.
    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(Duration),

    /// Opening a new connection failed.
    #[error("failed to open connection: {0}")]
    Connect(#[source] BoxError),

    /// A connection failed its health check.
    #[error("connection health check failed: {0}")]
    HealthCheck(#[source] BoxError),

    /// The pool configuration is invalid.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
}

impl PoolError {
    /// Whether retrying the operation later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connect(_) | Self::HealthCheck(_)
        )
    }
}
