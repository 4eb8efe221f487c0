//! Connection pool implementation.
//!
//! Limits can be changed while the pool is live. Checkouts prefer the most
//! recently returned idle connection, open a new one while under the open
//! limit, and otherwise queue until a connection is returned, a slot frees
//! up, or the acquire timeout fires.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::{PoolConfig, non_zero};
use crate::error::PoolError;
use crate::lifecycle::{ConnectionLifecycle, ConnectionMetadata, Expiry};

/// Lower bound for the background cleaner interval.
const MIN_CLEANER_INTERVAL: Duration = Duration::from_secs(1);

/// A pool of database connections.
///
/// Cloning a `Pool` is cheap and yields another handle to the same pool.
///
/// # Example
///
/// ```rust,ignore
/// use dbconn_pool::Pool;
///
/// let pool = PoolBuilder::new()
///     .max_open_connections(20)
///     .max_idle_connections(5)
///     .build(lifecycle)?;
///
/// pool.ping().await?;
/// let conn = pool.get().await?;
/// // Use connection...
/// // Connection automatically returned to pool on drop
///
/// let stats = pool.stats();
/// println!("Pool utilization: {:.1}%", stats.utilization());
/// ```
pub struct Pool<L: ConnectionLifecycle> {
    inner: Arc<PoolInner<L>>,
}

struct PoolInner<L: ConnectionLifecycle> {
    lifecycle: L,

    /// Whether the pool is closed.
    closed: AtomicBool,

    /// Counter for generating connection IDs.
    next_connection_id: AtomicU64,

    /// When the pool was created.
    created_at: Instant,

    /// Whether a background cleaner task is alive.
    cleaner_running: AtomicBool,

    state: Mutex<PoolState<L::Connection>>,
}

struct PoolState<C> {
    /// Live limits.
    config: PoolConfig,
    /// Idle connections, most recently returned last.
    idle: Vec<Entry<C>>,
    /// Connections open or being opened.
    num_open: u32,
    /// Checkouts waiting for a connection or a free slot.
    waiters: VecDeque<oneshot::Sender<Handoff<C>>>,
    counters: Counters,
}

/// Internal statistics tracking.
#[derive(Debug, Default)]
struct Counters {
    wait_count: u64,
    wait_duration: Duration,
    max_idle_closed: u64,
    max_idle_time_closed: u64,
    max_lifetime_closed: u64,
    connections_created: u64,
    connections_closed: u64,
    checkouts_successful: u64,
    checkouts_failed: u64,
    health_checks_performed: u64,
    health_checks_failed: u64,
}

struct Entry<C> {
    conn: C,
    meta: ConnectionMetadata,
}

/// What a waiting checkout receives.
enum Handoff<C> {
    /// A returned connection.
    Connection(Entry<C>),
    /// A reserved slot; the waiter opens its own connection.
    Permit,
}

enum Checkout<C> {
    Idle(Entry<C>),
    Open,
    Wait(oneshot::Receiver<Handoff<C>>, Duration),
}

impl<C> PoolState<C> {
    fn can_open(&self) -> bool {
        self.config.max_open_connections == 0 || self.num_open < self.config.max_open_connections
    }

    fn over_capacity(&self) -> bool {
        self.config.max_open_connections > 0 && self.num_open > self.config.max_open_connections
    }

    /// Free a slot that never produced a connection.
    fn release_slot(&mut self) {
        self.num_open = self.num_open.saturating_sub(1);
        self.grant_permits();
    }

    /// Free the slot of a connection that is being closed.
    fn retire(&mut self) {
        self.counters.connections_closed += 1;
        self.release_slot();
    }

    /// Hand free slots to waiting checkouts.
    fn grant_permits(&mut self) {
        while self.can_open() {
            let Some(waiter) = self.waiters.pop_front() else {
                return;
            };
            self.num_open += 1;
            if waiter.send(Handoff::Permit).is_err() {
                self.num_open -= 1;
            }
        }
    }

    /// Give a returned connection to the oldest live waiter.
    fn offer_to_waiter(&mut self, mut entry: Entry<C>) -> Option<Entry<C>> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.send(Handoff::Connection(entry)) {
                Err(Handoff::Connection(returned)) => entry = returned,
                _ => return None,
            }
        }
        Some(entry)
    }

    fn record_expiry(&mut self, expiry: Expiry) {
        match expiry {
            Expiry::Lifetime => self.counters.max_lifetime_closed += 1,
            Expiry::IdleTime => self.counters.max_idle_time_closed += 1,
        }
    }

    /// Remove idle connections past their lifetime or idle time.
    fn take_expired(&mut self, now: Instant) -> Vec<Entry<C>> {
        let (lifetime, idle_time) = (self.config.conn_max_lifetime, self.config.conn_max_idle_time);
        if lifetime.is_none() && idle_time.is_none() {
            return Vec::new();
        }

        let mut expired = Vec::new();
        let mut kept = Vec::with_capacity(self.idle.len());
        for entry in std::mem::take(&mut self.idle) {
            match entry.meta.expiry(lifetime, idle_time, now) {
                Some(reason) => {
                    self.record_expiry(reason);
                    expired.push(entry);
                }
                None => kept.push(entry),
            }
        }
        self.idle = kept;

        for _ in &expired {
            self.retire();
        }
        expired
    }

    /// Close the oldest idle connections beyond the idle limit.
    fn trim_idle(&mut self) -> Vec<Entry<C>> {
        let max = self.config.effective_max_idle() as usize;
        if self.idle.len() <= max {
            return Vec::new();
        }

        let surplus: Vec<_> = self.idle.drain(..self.idle.len() - max).collect();
        for _ in &surplus {
            self.counters.max_idle_closed += 1;
            self.retire();
        }
        surplus
    }
}

impl<L: ConnectionLifecycle> PoolInner<L> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Return a checked-out connection.
    fn release(&self, mut entry: Entry<L::Connection>, broken: bool) {
        let mut state = self.state.lock();
        entry.meta.touch();

        if broken || self.is_closed() || state.over_capacity() {
            state.retire();
            drop(state);
            drop(entry);
            return;
        }

        let expiry = entry.meta.expiry(
            state.config.conn_max_lifetime,
            state.config.conn_max_idle_time,
            Instant::now(),
        );
        if let Some(reason) = expiry {
            state.record_expiry(reason);
            state.retire();
            drop(state);
            drop(entry);
            return;
        }

        let Some(entry) = state.offer_to_waiter(entry) else {
            return;
        };

        if (state.idle.len() as u32) < state.config.effective_max_idle() {
            state.idle.push(entry);
        } else {
            state.counters.max_idle_closed += 1;
            state.retire();
            drop(state);
            drop(entry);
        }
    }

    /// Take back a handoff that a departed waiter never consumed.
    fn reclaim(&self, handoff: Handoff<L::Connection>) {
        match handoff {
            Handoff::Connection(entry) => self.release(entry, false),
            Handoff::Permit => self.state.lock().release_slot(),
        }
    }

    fn cleaner_interval(&self) -> Option<Duration> {
        let state = self.state.lock();
        let interval = match (state.config.conn_max_lifetime, state.config.conn_max_idle_time) {
            (Some(lifetime), Some(idle_time)) => lifetime.min(idle_time),
            (Some(limit), None) | (None, Some(limit)) => limit,
            (None, None) => return None,
        };
        Some(interval.max(MIN_CLEANER_INTERVAL))
    }

    /// Start the background cleaner if a limit needs it and none is running.
    fn ensure_cleaner(self: &Arc<Self>) {
        if self.cleaner_interval().is_none() || self.cleaner_running.swap(true, Ordering::AcqRel) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.cleaner_running.store(false, Ordering::Release);
            tracing::debug!("no tokio runtime, expired connections are reaped on checkout only");
            return;
        };

        runtime.spawn(run_cleaner(Arc::downgrade(self)));
    }
}

/// Periodically reap expired idle connections.
///
/// Holds only a weak reference so an abandoned pool can be dropped.
async fn run_cleaner<L: ConnectionLifecycle>(pool: Weak<PoolInner<L>>) {
    loop {
        let interval = match pool.upgrade() {
            Some(inner) if !inner.is_closed() => match inner.cleaner_interval() {
                Some(interval) => interval,
                None => {
                    inner.cleaner_running.store(false, Ordering::Release);
                    return;
                }
            },
            _ => return,
        };

        tokio::time::sleep(interval).await;

        let Some(inner) = pool.upgrade() else {
            return;
        };
        if inner.is_closed() {
            return;
        }

        let expired = inner.state.lock().take_expired(Instant::now());
        if !expired.is_empty() {
            tracing::trace!(count = expired.len(), "reaped expired idle connections");
        }
    }
}

impl<L: ConnectionLifecycle> Pool<L> {
    /// Create a new pool. No connection is opened until the first checkout.
    pub fn new(lifecycle: L, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        tracing::debug!(
            max_open = config.max_open_connections,
            max_idle = config.max_idle_connections,
            "connection pool created"
        );

        let inner = Arc::new(PoolInner {
            lifecycle,
            closed: AtomicBool::new(false),
            next_connection_id: AtomicU64::new(1),
            created_at: Instant::now(),
            cleaner_running: AtomicBool::new(false),
            state: Mutex::new(PoolState {
                config,
                idle: Vec::new(),
                num_open: 0,
                waiters: VecDeque::new(),
                counters: Counters::default(),
            }),
        });
        inner.ensure_cleaner();

        Ok(Self { inner })
    }

    /// Get a connection from the pool.
    ///
    /// Reuses an idle connection when one is available, opens a new one if
    /// the pool is under its open limit, and otherwise waits until a
    /// connection is returned or the acquire timeout is reached.
    pub async fn get(&self) -> Result<PooledConnection<L>, PoolError> {
        let (checkout, expired) = {
            let mut state = self.inner.state.lock();
            if self.inner.is_closed() {
                state.counters.checkouts_failed += 1;
                return Err(PoolError::PoolClosed);
            }

            let expired = state.take_expired(Instant::now());
            let checkout = if let Some(entry) = state.idle.pop() {
                state.counters.checkouts_successful += 1;
                Checkout::Idle(entry)
            } else if state.can_open() {
                state.num_open += 1;
                Checkout::Open
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.retain(|waiter| !waiter.is_closed());
                state.waiters.push_back(tx);
                state.counters.wait_count += 1;
                Checkout::Wait(rx, state.config.acquire_timeout)
            };
            (checkout, expired)
        };
        drop(expired);

        match checkout {
            Checkout::Idle(entry) => {
                tracing::trace!(connection_id = entry.meta.id, "reusing idle connection");
                Ok(PooledConnection::new(entry, Arc::clone(&self.inner)))
            }
            Checkout::Open => self.open_connection().await,
            Checkout::Wait(rx, timeout) => self.wait_for_connection(rx, timeout).await,
        }
    }

    /// Open a connection into a slot already reserved by the caller.
    async fn open_connection(&self) -> Result<PooledConnection<L>, PoolError> {
        let mut slot = SlotGuard {
            inner: &self.inner,
            armed: true,
        };

        let conn = match self.inner.lifecycle.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                drop(slot);
                self.inner.state.lock().counters.checkouts_failed += 1;
                tracing::debug!(error = %e, "failed to open connection");
                return Err(PoolError::Connect(Box::new(e)));
            }
        };
        slot.armed = false;

        let id = self.inner.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            conn,
            meta: ConnectionMetadata::new(id),
        };

        let mut state = self.inner.state.lock();
        state.counters.connections_created += 1;
        if self.inner.is_closed() {
            state.counters.checkouts_failed += 1;
            state.retire();
            drop(state);
            drop(entry);
            return Err(PoolError::PoolClosed);
        }
        state.counters.checkouts_successful += 1;
        drop(state);

        tracing::trace!(connection_id = id, "opened new connection");
        Ok(PooledConnection::new(entry, Arc::clone(&self.inner)))
    }

    async fn wait_for_connection(
        &self,
        rx: oneshot::Receiver<Handoff<L::Connection>>,
        acquire_timeout: Duration,
    ) -> Result<PooledConnection<L>, PoolError> {
        tracing::trace!("pool at capacity, waiting for a connection");

        let started = Instant::now();
        let mut waiter = Waiter {
            rx,
            inner: &self.inner,
        };
        let outcome = tokio::time::timeout(acquire_timeout, &mut waiter.rx).await;
        self.inner.state.lock().counters.wait_duration += started.elapsed();

        match outcome {
            Ok(Ok(Handoff::Connection(entry))) => {
                self.inner.state.lock().counters.checkouts_successful += 1;
                Ok(PooledConnection::new(entry, Arc::clone(&self.inner)))
            }
            Ok(Ok(Handoff::Permit)) => self.open_connection().await,
            Ok(Err(_)) => Err(PoolError::PoolClosed),
            Err(_) => {
                self.inner.state.lock().counters.checkouts_failed += 1;
                Err(PoolError::Timeout(acquire_timeout))
            }
        }
    }

    /// Check out a connection and run the driver's health check on it.
    ///
    /// A connection that fails the check is closed rather than returned.
    pub async fn ping(&self) -> Result<(), PoolError> {
        let mut conn = self.get().await?;
        let result = self.inner.lifecycle.health_check(&mut conn).await;

        {
            let mut state = self.inner.state.lock();
            state.counters.health_checks_performed += 1;
            if result.is_err() {
                state.counters.health_checks_failed += 1;
            }
        }

        result.map_err(|e| {
            conn.mark_broken();
            PoolError::HealthCheck(Box::new(e))
        })
    }

    /// Set the maximum number of open connections (`0` = unlimited).
    ///
    /// Connections above a lowered limit are closed as they are returned.
    pub fn set_max_open_connections(&self, count: u32) -> Result<(), PoolError> {
        let surplus = {
            let mut state = self.inner.state.lock();
            if self.inner.is_closed() {
                return Err(PoolError::PoolClosed);
            }
            state.config.max_open_connections = count;
            state.grant_permits();
            state.trim_idle()
        };
        drop(surplus);

        tracing::debug!(max_open = count, "max open connections updated");
        Ok(())
    }

    /// Set the maximum number of idle connections retained.
    pub fn set_max_idle_connections(&self, count: u32) -> Result<(), PoolError> {
        let surplus = {
            let mut state = self.inner.state.lock();
            if self.inner.is_closed() {
                return Err(PoolError::PoolClosed);
            }
            state.config.max_idle_connections = count;
            state.trim_idle()
        };
        drop(surplus);

        tracing::debug!(max_idle = count, "max idle connections updated");
        Ok(())
    }

    /// Set the maximum connection lifetime (`Duration::ZERO` = unlimited).
    pub fn set_conn_max_lifetime(&self, lifetime: Duration) -> Result<(), PoolError> {
        let expired = {
            let mut state = self.inner.state.lock();
            if self.inner.is_closed() {
                return Err(PoolError::PoolClosed);
            }
            state.config.conn_max_lifetime = non_zero(lifetime);
            state.take_expired(Instant::now())
        };
        drop(expired);
        self.inner.ensure_cleaner();

        tracing::debug!(?lifetime, "connection max lifetime updated");
        Ok(())
    }

    /// Set the maximum connection idle time (`Duration::ZERO` = unlimited).
    pub fn set_conn_max_idle_time(&self, idle_time: Duration) -> Result<(), PoolError> {
        let expired = {
            let mut state = self.inner.state.lock();
            if self.inner.is_closed() {
                return Err(PoolError::PoolClosed);
            }
            state.config.conn_max_idle_time = non_zero(idle_time);
            state.take_expired(Instant::now())
        };
        drop(expired);
        self.inner.ensure_cleaner();

        tracing::debug!(?idle_time, "connection max idle time updated");
        Ok(())
    }

    /// Get a snapshot of the pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        let idle = state.idle.len() as u32;
        PoolStats {
            max_open_connections: state.config.max_open_connections,
            open_connections: state.num_open,
            in_use: state.num_open.saturating_sub(idle),
            idle,
            wait_count: state.counters.wait_count,
            wait_duration: state.counters.wait_duration,
            max_idle_closed: state.counters.max_idle_closed,
            max_idle_time_closed: state.counters.max_idle_time_closed,
            max_lifetime_closed: state.counters.max_lifetime_closed,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.inner.state.lock();
        let counters = &state.counters;
        PoolMetrics {
            connections_created: counters.connections_created,
            connections_closed: counters.connections_closed,
            checkouts_successful: counters.checkouts_successful,
            checkouts_failed: counters.checkouts_failed,
            health_checks_performed: counters.health_checks_performed,
            health_checks_failed: counters.health_checks_failed,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Get the current limits.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.inner.state.lock().config.clone()
    }

    /// Get the connection lifecycle the pool was built with.
    #[must_use]
    pub fn lifecycle(&self) -> &L {
        &self.inner.lifecycle
    }

    /// Close the pool.
    ///
    /// Idle connections are dropped immediately, waiting checkouts fail with
    /// [`PoolError::PoolClosed`], and connections still in use are closed when
    /// they are returned. Closing an already closed pool returns
    /// [`PoolError::PoolClosed`].
    pub fn close(&self) -> Result<(), PoolError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Err(PoolError::PoolClosed);
        }

        let (idle, waiters) = {
            let mut state = self.inner.state.lock();
            let waiters = std::mem::take(&mut state.waiters);
            let idle = std::mem::take(&mut state.idle);
            for _ in &idle {
                state.retire();
            }
            (idle, waiters)
        };
        drop(waiters);
        drop(idle);

        tracing::info!("connection pool closed");
        Ok(())
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl<L: ConnectionLifecycle> Clone for Pool<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ConnectionLifecycle> fmt::Debug for Pool<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Releases a reserved slot if opening the connection is abandoned.
struct SlotGuard<'a, L: ConnectionLifecycle> {
    inner: &'a PoolInner<L>,
    armed: bool,
}

impl<L: ConnectionLifecycle> Drop for SlotGuard<'_, L> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.state.lock().release_slot();
        }
    }
}

/// Reclaims a handoff delivered to a checkout that stopped waiting.
struct Waiter<'a, L: ConnectionLifecycle> {
    rx: oneshot::Receiver<Handoff<L::Connection>>,
    inner: &'a PoolInner<L>,
}

impl<L: ConnectionLifecycle> Drop for Waiter<'_, L> {
    fn drop(&mut self) {
        self.rx.close();
        if let Ok(handoff) = self.rx.try_recv() {
            self.inner.reclaim(handoff);
        }
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = PoolBuilder::new()
///     .max_open_connections(10)
///     .conn_max_lifetime(Duration::from_secs(3600))
///     .build(lifecycle)?;
/// ```
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    pool_config: PoolConfig,
}

impl PoolBuilder {
    /// Create a new pool builder with default settings.
    pub fn new() -> Self {
        Self {
            pool_config: PoolConfig::default(),
        }
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the maximum number of open connections.
    #[must_use]
    pub fn max_open_connections(mut self, count: u32) -> Self {
        self.pool_config.max_open_connections = count;
        self
    }

    /// Set the maximum number of idle connections.
    #[must_use]
    pub fn max_idle_connections(mut self, count: u32) -> Self {
        self.pool_config.max_idle_connections = count;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn conn_max_lifetime(mut self, lifetime: Duration) -> Self {
        self.pool_config.conn_max_lifetime = non_zero(lifetime);
        self
    }

    /// Set the maximum connection idle time.
    #[must_use]
    pub fn conn_max_idle_time(mut self, idle_time: Duration) -> Self {
        self.pool_config.conn_max_idle_time = non_zero(idle_time);
        self
    }

    /// Set the connection acquisition timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.acquire_timeout = timeout;
        self
    }

    /// Build the pool.
    pub fn build<L: ConnectionLifecycle>(self, lifecycle: L) -> Result<Pool<L>, PoolError> {
        Pool::new(lifecycle, self.pool_config)
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pool state and cumulative wait/expiry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Maximum allowed open connections (`0` = unlimited).
    pub max_open_connections: u32,
    /// Connections open or being opened.
    pub open_connections: u32,
    /// Connections currently checked out.
    pub in_use: u32,
    /// Idle connections available.
    pub idle: u32,
    /// Total checkouts that had to wait.
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

impl PoolStats {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max_open_connections == 0 {
            return 0.0;
        }
        (f64::from(self.in_use) / f64::from(self.max_open_connections)) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.max_open_connections > 0 && self.open_connections >= self.max_open_connections
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections created since pool start.
    pub connections_created: u64,
    /// Total connections closed since pool start.
    pub connections_closed: u64,
    /// Successful connection checkouts.
    pub checkouts_successful: u64,
    /// Failed connection checkouts (timeouts, pool closed, etc.).
    pub checkouts_failed: u64,
    /// Health checks performed.
    pub health_checks_performed: u64,
    /// Health checks that failed.
    pub health_checks_failed: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }

    /// Calculate health check success rate (0.0 to 1.0).
    #[must_use]
    pub fn health_check_success_rate(&self) -> f64 {
        if self.health_checks_performed == 0 {
            return 1.0;
        }
        let successful = self.health_checks_performed - self.health_checks_failed;
        successful as f64 / self.health_checks_performed as f64
    }
}

/// A connection retrieved from the pool.
///
/// When dropped, the connection is automatically returned to the pool.
/// Use [`detach()`](PooledConnection::detach) to take it out of the pool.
pub struct PooledConnection<L: ConnectionLifecycle> {
    entry: Option<Entry<L::Connection>>,
    broken: bool,
    pool: Arc<PoolInner<L>>,
}

impl<L: ConnectionLifecycle> PooledConnection<L> {
    fn new(mut entry: Entry<L::Connection>, pool: Arc<PoolInner<L>>) -> Self {
        entry.meta.checkout_count += 1;
        Self {
            entry: Some(entry),
            broken: false,
            pool,
        }
    }

    fn entry(&self) -> &Entry<L::Connection> {
        match &self.entry {
            Some(entry) => entry,
            None => unreachable!("pooled connection used after release"),
        }
    }

    fn entry_mut(&mut self) -> &mut Entry<L::Connection> {
        match &mut self.entry {
            Some(entry) => entry,
            None => unreachable!("pooled connection used after release"),
        }
    }

    /// Get the connection metadata.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.entry().meta
    }

    /// Close the connection instead of returning it to the pool.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Detach the connection from the pool.
    ///
    /// The pool frees its slot and no longer tracks the connection.
    pub fn detach(mut self) -> L::Connection {
        let entry = self.take_entry();
        self.pool.state.lock().retire();
        entry.conn
    }

    fn take_entry(&mut self) -> Entry<L::Connection> {
        match self.entry.take() {
            Some(entry) => entry,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl<L: ConnectionLifecycle> Deref for PooledConnection<L> {
    type Target = L::Connection;

    fn deref(&self) -> &Self::Target {
        &self.entry().conn
    }
}

impl<L: ConnectionLifecycle> DerefMut for PooledConnection<L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entry_mut().conn
    }
}

impl<L: ConnectionLifecycle> fmt::Debug for PooledConnection<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("metadata", &self.entry.as_ref().map(|entry| &entry.meta))
            .field("broken", &self.broken)
            .finish()
    }
}

impl<L: ConnectionLifecycle> Drop for PooledConnection<L> {
    fn drop(&mut self) {
        let Some(mut entry) = self.entry.take() else {
            return;
        };
        let broken = self.broken || self.pool.lifecycle.is_broken(&mut entry.conn);
        tracing::trace!(
            connection_id = entry.meta.id,
            broken,
            "returning connection to pool"
        );
        self.pool.release(entry, broken);
    }
}
