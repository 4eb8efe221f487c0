//! Applies configured limits to an opened pool.

use dbconn_pool::{ConnectionLifecycle, Pool, PoolError};

use crate::config::Config;
use crate::error::{Error, FailureReason, Result};
use crate::options::Options;

/// Apply size and lifetime limits to `pool`.
///
/// Size limits of `0` leave the pool's defaults alone. Lifetime limits of
/// zero fall back to the defaults in [`options`](crate::options). Applying
/// the same limits twice has no further effect.
pub fn configure_pool<L: ConnectionLifecycle>(
    pool: &Pool<L>,
    config: &Config,
    options: &Options,
) -> Result<()> {
    let rejected = |e: PoolError| Error::connection_failed(FailureReason::PoolConfiguration, e);

    if config.max_open_connections > 0 {
        pool.set_max_open_connections(config.max_open_connections)
            .map_err(rejected)?;
    }
    if config.max_idle_connections > 0 {
        pool.set_max_idle_connections(config.max_idle_connections)
            .map_err(rejected)?;
    }

    let lifetime = options.effective_conn_max_lifetime();
    let idle_time = options.effective_conn_max_idle_time();
    pool.set_conn_max_lifetime(lifetime).map_err(rejected)?;
    pool.set_conn_max_idle_time(idle_time).map_err(rejected)?;

    tracing::debug!(
        max_open = config.max_open_connections,
        max_idle = config.max_idle_connections,
        conn_max_lifetime = ?lifetime,
        conn_max_idle_time = ?idle_time,
        "connection pool configured"
    );
    Ok(())
}
