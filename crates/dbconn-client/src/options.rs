//! Connection retry, timeout and pool-lifetime options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dbconn_pool::PoolError;

/// Default connect timeout handed to the driver.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of connection attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on any single retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Default maximum connection lifetime.
pub const DEFAULT_CONN_MAX_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Default maximum connection idle time.
pub const DEFAULT_CONN_MAX_IDLE_TIME: Duration = Duration::from_secs(10 * 60);

/// Observer called after each failed attempt that will be retried.
///
/// Receives the 1-based attempt number and the error of that attempt.
pub type RetryObserver = Arc<dyn Fn(u32, &PoolError) + Send + Sync>;

/// A single override applied on top of [`Options::default`].
#[derive(Clone)]
pub enum ClientOption {
    /// Connect timeout hint for the driver. Zero is ignored.
    ConnectTimeout(Duration),
    /// Maximum connection attempts. Zero is ignored.
    MaxRetries(u32),
    /// Delay before the first retry. Zero is ignored.
    RetryDelay(Duration),
    /// Maximum connection lifetime. Zero selects the default.
    ConnMaxLifetime(Duration),
    /// Maximum connection idle time. Zero selects the default.
    ConnMaxIdleTime(Duration),
    /// Observer for failed attempts.
    OnRetry(RetryObserver),
}

impl ClientOption {
    /// Build an [`ClientOption::OnRetry`] from a closure.
    pub fn on_retry<F>(observer: F) -> Self
    where
        F: Fn(u32, &PoolError) + Send + Sync + 'static,
    {
        Self::OnRetry(Arc::new(observer))
    }
}

impl fmt::Debug for ClientOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectTimeout(d) => f.debug_tuple("ConnectTimeout").field(d).finish(),
            Self::MaxRetries(n) => f.debug_tuple("MaxRetries").field(n).finish(),
            Self::RetryDelay(d) => f.debug_tuple("RetryDelay").field(d).finish(),
            Self::ConnMaxLifetime(d) => f.debug_tuple("ConnMaxLifetime").field(d).finish(),
            Self::ConnMaxIdleTime(d) => f.debug_tuple("ConnMaxIdleTime").field(d).finish(),
            Self::OnRetry(_) => f.write_str("OnRetry(..)"),
        }
    }
}

/// Retry and pool-lifetime behavior for establishing a client.
#[derive(Clone)]
pub struct Options {
    /// Connect timeout handed to the driver. The connector does not enforce it.
    pub connect_timeout: Duration,

    /// Maximum connection attempts (at least 1).
    pub max_retries: u32,

    /// Base delay for the exponential backoff.
    pub retry_delay: Duration,

    /// Maximum connection lifetime; zero selects [`DEFAULT_CONN_MAX_LIFETIME`].
    pub conn_max_lifetime: Duration,

    /// Maximum connection idle time; zero selects [`DEFAULT_CONN_MAX_IDLE_TIME`].
    pub conn_max_idle_time: Duration,

    /// Observer for failed attempts that will be retried.
    pub on_retry: Option<RetryObserver>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            conn_max_lifetime: DEFAULT_CONN_MAX_LIFETIME,
            conn_max_idle_time: DEFAULT_CONN_MAX_IDLE_TIME,
            on_retry: None,
        }
    }
}

impl Options {
    /// Apply overrides in order to the defaults. Later overrides win.
    pub fn from_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = ClientOption>,
    {
        overrides
            .into_iter()
            .fold(Self::default(), |options, option| options.apply(option))
    }

    /// Apply a single override.
    ///
    /// Invalid values are ignored and the previous value is kept.
    #[must_use]
    pub fn apply(mut self, option: ClientOption) -> Self {
        match option {
            ClientOption::ConnectTimeout(timeout) if timeout.is_zero() => {
                tracing::debug!("ignoring zero connect timeout");
            }
            ClientOption::ConnectTimeout(timeout) => self.connect_timeout = timeout,
            ClientOption::MaxRetries(0) => {
                tracing::debug!("ignoring zero max retries");
            }
            ClientOption::MaxRetries(retries) => self.max_retries = retries,
            ClientOption::RetryDelay(delay) if delay.is_zero() => {
                tracing::debug!("ignoring zero retry delay");
            }
            ClientOption::RetryDelay(delay) => self.retry_delay = delay,
            ClientOption::ConnMaxLifetime(lifetime) => self.conn_max_lifetime = lifetime,
            ClientOption::ConnMaxIdleTime(idle_time) => self.conn_max_idle_time = idle_time,
            ClientOption::OnRetry(observer) => self.on_retry = Some(observer),
        }
        self
    }

    /// Lifetime to apply to the pool.
    #[must_use]
    pub fn effective_conn_max_lifetime(&self) -> Duration {
        if self.conn_max_lifetime.is_zero() {
            DEFAULT_CONN_MAX_LIFETIME
        } else {
            self.conn_max_lifetime
        }
    }

    /// Idle time to apply to the pool.
    #[must_use]
    pub fn effective_conn_max_idle_time(&self) -> Duration {
        if self.conn_max_idle_time.is_zero() {
            DEFAULT_CONN_MAX_IDLE_TIME
        } else {
            self.conn_max_idle_time
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("connect_timeout", &self.connect_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("conn_max_lifetime", &self.conn_max_lifetime)
            .field("conn_max_idle_time", &self.conn_max_idle_time)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_delay, Duration::from_secs(1));
        assert_eq!(options.conn_max_lifetime, Duration::from_secs(3600));
        assert_eq!(options.conn_max_idle_time, Duration::from_secs(600));
        assert!(options.on_retry.is_none());
    }

    #[test]
    fn test_later_overrides_win() {
        let options = Options::from_overrides([
            ClientOption::MaxRetries(5),
            ClientOption::RetryDelay(Duration::from_millis(200)),
            ClientOption::MaxRetries(7),
        ]);
        assert_eq!(options.max_retries, 7);
        assert_eq!(options.retry_delay, Duration::from_millis(200));
    }

    #[test]
    fn test_invalid_overrides_keep_previous_value() {
        let options = Options::from_overrides([
            ClientOption::MaxRetries(4),
            ClientOption::MaxRetries(0),
            ClientOption::ConnectTimeout(Duration::ZERO),
            ClientOption::RetryDelay(Duration::ZERO),
        ]);
        assert_eq!(options.max_retries, 4);
        assert_eq!(options.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(options.retry_delay, DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_zero_lifetimes_select_defaults() {
        let options = Options::from_overrides([
            ClientOption::ConnMaxLifetime(Duration::ZERO),
            ClientOption::ConnMaxIdleTime(Duration::ZERO),
        ]);
        assert_eq!(options.effective_conn_max_lifetime(), DEFAULT_CONN_MAX_LIFETIME);
        assert_eq!(
            options.effective_conn_max_idle_time(),
            DEFAULT_CONN_MAX_IDLE_TIME
        );

        let custom = Options::from_overrides([ClientOption::ConnMaxLifetime(
            Duration::from_secs(90),
        )]);
        assert_eq!(custom.effective_conn_max_lifetime(), Duration::from_secs(90));
    }

    #[test]
    fn test_on_retry_observer() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let options = Options::from_overrides([ClientOption::on_retry(move |attempt, _| {
            seen.store(attempt, Ordering::SeqCst);
        })]);

        let observer = options.on_retry.as_ref().map(Arc::clone);
        assert!(observer.is_some());
        if let Some(observer) = observer {
            observer(2, &PoolError::PoolClosed);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(format!("{options:?}").contains("on_retry: true"));
    }
}
