//! Connection lifecycle hooks and per-connection metadata.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Driver hooks the pool uses to create and check connections.
///
/// # Example
///
/// ```rust,ignore
/// struct Lifecycle { config: tokio_postgres::Config }
///
/// #[async_trait]
/// impl ConnectionLifecycle for Lifecycle {
///     type Connection = tokio_postgres::Client;
///     type Error = tokio_postgres::Error;
///
///     async fn connect(&self) -> Result<Self::Connection, Self::Error> { ... }
///     async fn health_check(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
///         conn.simple_query("SELECT 1").await.map(|_| ())
///     }
/// }
/// ```
#[async_trait]
pub trait ConnectionLifecycle: Send + Sync + 'static {
    /// The connection type managed by the pool.
    type Connection: Send + 'static;

    /// Error produced by the driver.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new connection.
    async fn connect(&self) -> Result<Self::Connection, Self::Error>;

    /// Verify that a connection is still usable.
    async fn health_check(&self, conn: &mut Self::Connection) -> Result<(), Self::Error>;

    /// Cheap synchronous check run when a connection is returned.
    ///
    /// Broken connections are closed instead of going back to the idle set.
    fn is_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Metadata tracked for every pooled connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Pool-unique connection ID.
    pub id: u64,
    /// When the connection was opened.
    pub created_at: Instant,
    /// When the connection was last returned to the pool.
    pub last_used_at: Instant,
    /// How many times the connection has been checked out.
    pub checkout_count: u64,
}

impl ConnectionMetadata {
    /// Metadata for a freshly opened connection.
    #[must_use]
    pub fn new(id: u64) -> Self {
        let now = Instant::now();
        Self {
            id,
            created_at: now,
            last_used_at: now,
            checkout_count: 0,
        }
    }

    /// Time since the connection was opened.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Time since the connection was last returned.
    #[must_use]
    pub fn idle_time(&self) -> Duration {
        self.last_used_at.elapsed()
    }

    pub(crate) fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }

    /// Which limit, if any, this connection has exceeded.
    pub(crate) fn expiry(
        &self,
        max_lifetime: Option<Duration>,
        max_idle_time: Option<Duration>,
        now: Instant,
    ) -> Option<Expiry> {
        if max_lifetime.is_some_and(|limit| now.duration_since(self.created_at) >= limit) {
            return Some(Expiry::Lifetime);
        }
        if max_idle_time.is_some_and(|limit| now.duration_since(self.last_used_at) >= limit) {
            return Some(Expiry::IdleTime);
        }
        None
    }
}

/// Reason a connection was retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    Lifetime,
    IdleTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_lifetime_wins() {
        let meta = ConnectionMetadata::new(1);
        tokio::time::advance(Duration::from_secs(60)).await;

        let now = Instant::now();
        assert_eq!(
            meta.expiry(Some(Duration::from_secs(30)), Some(Duration::from_secs(30)), now),
            Some(Expiry::Lifetime)
        );
        assert_eq!(
            meta.expiry(None, Some(Duration::from_secs(30)), now),
            Some(Expiry::IdleTime)
        );
        assert_eq!(meta.expiry(None, None, now), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_resets_idle_time() {
        let mut meta = ConnectionMetadata::new(7);
        tokio::time::advance(Duration::from_secs(10)).await;
        meta.touch();

        assert_eq!(meta.idle_time(), Duration::ZERO);
        assert_eq!(meta.age(), Duration::from_secs(10));
        assert_eq!(
            meta.expiry(None, Some(Duration::from_secs(5)), Instant::now()),
            None
        );
    }
}
