//! Bounded retry loop for opening a verified pool.

use std::fmt;
use std::time::Duration;

use dbconn_pool::{BoxError, ConnectionLifecycle, Pool, PoolConfig, PoolError};

use crate::backoff::backoff;
use crate::config::Config;
use crate::context::Context;
use crate::error::{Error, FailureReason, Result};
use crate::options::Options;

/// A database driver that can produce connection lifecycles.
///
/// Producing a lifecycle must not touch the network; connections are only
/// opened when the pool asks for them.
pub trait Driver: Send + Sync {
    /// Lifecycle type handed to the pool.
    type Lifecycle: ConnectionLifecycle;

    /// Driver name, used as `db.system` in telemetry.
    fn name(&self) -> &str;

    /// Build a lifecycle for the request. An error here is a configuration
    /// error and is never retried.
    fn lifecycle(&self, request: &OpenRequest<'_>) -> std::result::Result<Self::Lifecycle, BoxError>;
}

/// Everything a driver needs to open connections.
#[derive(Debug, Clone, Copy)]
pub struct OpenRequest<'a> {
    /// Connection string rendered from the data source.
    pub connection_string: &'a str,
    /// The client configuration, for behavioral flags and naming.
    pub config: &'a Config,
    /// Connect timeout hint.
    pub connect_timeout: Duration,
}

/// Progress of the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    /// Running the given 1-based attempt.
    Attempting(u32),
    /// A pool was opened and verified.
    Succeeded,
    /// The context ended while waiting to retry.
    Cancelled,
    /// Every allowed attempt failed.
    Exhausted,
}

impl fmt::Display for ConnectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attempting(n) => write!(f, "attempting({n})"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// Open a pool for `config` and verify it with a ping, retrying with
/// exponential backoff.
///
/// At most `options.max_retries` attempts are made. The context is only
/// observed while waiting between attempts; an attempt in flight is not
/// interrupted.
pub async fn connect<D: Driver>(
    ctx: &Context,
    driver: &D,
    config: &Config,
    options: &Options,
) -> Result<Pool<D::Lifecycle>> {
    let connection_string = config.data_source.connection_string();
    let max_attempts = options.max_retries.max(1);
    let mut attempt = 1;

    loop {
        tracing::debug!(
            state = %ConnectState::Attempting(attempt),
            driver = driver.name(),
            target = %config.data_source,
            "opening database connection"
        );

        let request = OpenRequest {
            connection_string: &connection_string,
            config,
            connect_timeout: options.connect_timeout,
        };
        let lifecycle = driver
            .lifecycle(&request)
            .map_err(|e| Error::InvalidConfig(format!("driver rejected connection string: {e}")))?;

        let err = match open_verified(lifecycle).await {
            Ok(pool) => {
                tracing::info!(
                    state = %ConnectState::Succeeded,
                    attempts = attempt,
                    "database connection established"
                );
                return Ok(pool);
            }
            Err(e) => e,
        };

        if attempt >= max_attempts {
            tracing::error!(
                state = %ConnectState::Exhausted,
                attempts = attempt,
                error = %err,
                "giving up on database connection"
            );
            return Err(Error::connection_failed(
                FailureReason::RetriesExhausted { attempts: attempt },
                err,
            ));
        }

        if let Some(observer) = &options.on_retry {
            observer(attempt, &err);
        }

        let delay = backoff(attempt, options.retry_delay);
        tracing::warn!(
            attempt,
            max_attempts,
            delay = ?delay,
            error = %err,
            "database connection attempt failed, retrying"
        );

        tokio::select! {
            biased;
            cause = ctx.done() => {
                tracing::warn!(
                    state = %ConnectState::Cancelled,
                    attempts = attempt,
                    %cause,
                    "database connection cancelled"
                );
                return Err(Error::connection_failed(
                    FailureReason::Cancelled { attempts: attempt, cause },
                    err,
                ));
            }
            () = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}

/// Create a pool with default limits and check one connection.
async fn open_verified<L: ConnectionLifecycle>(lifecycle: L) -> std::result::Result<Pool<L>, PoolError> {
    let pool = Pool::new(lifecycle, PoolConfig::default())?;
    pool.ping().await?;
    Ok(pool)
}
