//! # dbconn-pool
//!
//! Async connection pool with limits that can be adjusted at runtime.
//!
//! The pool is driver-agnostic: a [`ConnectionLifecycle`] implementation
//! tells it how to open and health-check connections.
//!
//! ## Features
//!
//! - Open-connection limit (`0` = unlimited) and idle-connection limit
//! - Maximum connection lifetime and idle time, enforced on checkout, on
//!   return and by a background cleaner
//! - Bounded wait for a free connection, with wait statistics
//! - Health checks through [`Pool::ping`]
//! - Counters for observability ([`PoolStats`], [`PoolMetrics`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use dbconn_pool::{Pool, PoolBuilder, PoolConfig};
//! use std::time::Duration;
//!
//! // Using the builder pattern
//! let pool = PoolBuilder::new()
//!     .max_open_connections(20)
//!     .max_idle_connections(5)
//!     .conn_max_idle_time(Duration::from_secs(300))
//!     .build(lifecycle)?;
//!
//! // Or using PoolConfig directly
//! let config = PoolConfig::new().max_open_connections(20);
//! let pool = Pool::new(lifecycle, config)?;
//!
//! // Limits can change while the pool is live
//! pool.set_conn_max_lifetime(Duration::from_secs(3600))?;
//!
//! // Get a connection from the pool
//! let conn = pool.get().await?;
//! // Use connection...
//! // Connection automatically returned to pool on drop
//!
//! let stats = pool.stats();
//! println!("Waited {} times", stats.wait_count);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod pool;

// Configuration
pub use config::{DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_IDLE_CONNECTIONS, PoolConfig};

// Error types
pub use error::{BoxError, PoolError};

// Pool types
pub use pool::{Pool, PoolBuilder, PoolMetrics, PoolStats, PooledConnection};

// Lifecycle management
pub use lifecycle::{ConnectionLifecycle, ConnectionMetadata};
