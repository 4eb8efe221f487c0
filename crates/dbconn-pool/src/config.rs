//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Idle connections kept when no explicit limit is set.
pub const DEFAULT_MAX_IDLE_CONNECTIONS: u32 = 2;

/// Default time a checkout waits for a free connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Limits applied by a [`Pool`](crate::Pool).
///
/// Every limit can also be changed on a live pool through the
/// `Pool::set_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of open connections. `0` means unlimited.
    pub max_open_connections: u32,

    /// Maximum number of idle connections retained.
    pub max_idle_connections: u32,

    /// Maximum age of a connection before it is closed.
    pub conn_max_lifetime: Option<Duration>,

    /// Maximum time a connection may sit idle before it is closed.
    pub conn_max_idle_time: Option<Duration>,

    /// How long a checkout waits when the pool is at capacity.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open_connections: 0,
            max_idle_connections: DEFAULT_MAX_IDLE_CONNECTIONS,
            conn_max_lifetime: None,
            conn_max_idle_time: None,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of open connections (`0` = unlimited).
    #[must_use]
    pub fn max_open_connections(mut self, count: u32) -> Self {
        self.max_open_connections = count;
        self
    }

    /// Set the maximum number of idle connections.
    #[must_use]
    pub fn max_idle_connections(mut self, count: u32) -> Self {
        self.max_idle_connections = count;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn conn_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.conn_max_lifetime = non_zero(lifetime);
        self
    }

    /// Set the maximum connection idle time.
    #[must_use]
    pub fn conn_max_idle_time(mut self, idle_time: Duration) -> Self {
        self.conn_max_idle_time = non_zero(idle_time);
        self
    }

    /// Set the acquire timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.acquire_timeout.is_zero() {
            return Err(PoolError::InvalidConfig(
                "acquire_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Idle limit after clamping to the open limit.
    #[must_use]
    pub fn effective_max_idle(&self) -> u32 {
        if self.max_open_connections > 0 {
            self.max_idle_connections.min(self.max_open_connections)
        } else {
            self.max_idle_connections
        }
    }
}

/// Zero durations mean "no limit".
pub(crate) fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}
