//! Connection statistics snapshot.

use std::time::Duration;

use dbconn_pool::PoolStats;

/// Point-in-time view of a client's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionStats {
    /// Maximum allowed open connections (`0` = unlimited).
    pub max_open_connections: u32,
    /// Open connections, in use or idle.
    pub open_connections: u32,
    /// Connections currently in use.
    pub in_use: u32,
    /// Idle connections.
    pub idle: u32,
    /// Total checkouts that waited for a connection.
    pub wait_count: u64,
    /// Total time spent waiting.
    pub wait_duration: Duration,
    /// Connections closed because of the idle limit.
    pub max_idle_closed: u64,
    /// Connections closed because of the idle time limit.
    pub max_idle_time_closed: u64,
    /// Connections closed because of the lifetime limit.
    pub max_lifetime_closed: u64,
}

impl From<PoolStats> for ConnectionStats {
    fn from(stats: PoolStats) -> Self {
        Self {
            max_open_connections: stats.max_open_connections,
            open_connections: stats.open_connections,
            in_use: stats.in_use,
            idle: stats.idle,
            wait_count: stats.wait_count,
            wait_duration: stats.wait_duration,
            max_idle_closed: stats.max_idle_closed,
            max_idle_time_closed: stats.max_idle_time_closed,
            max_lifetime_closed: stats.max_lifetime_closed,
        }
    }
}
