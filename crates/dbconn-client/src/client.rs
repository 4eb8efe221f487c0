//! Database client owning a configured pool.

use std::fmt;
use std::time::Duration;

use dbconn_pool::{ConnectionLifecycle, Pool, PoolError};

use crate::config::Config;
use crate::connector::{self, Driver};
use crate::context::Context;
use crate::error::{Error, FailureReason, Result};
use crate::instrumentation::{
    DatabaseMetrics, InstrumentationContext, OperationSpan, OperationTimer, span_names,
};
use crate::options::{ClientOption, Options};
use crate::pool_config::configure_pool;
use crate::stats::ConnectionStats;

/// A connected database client.
///
/// Owns exactly one open pool and the configuration it was built from. The
/// only way to obtain a client is a successful [`Client::connect`] or
/// [`ClientBuilder::connect`].
///
/// # Example
///
/// ```rust,ignore
/// use dbconn_client::{Client, ClientOption, Config, Context};
///
/// let config = Config::from_connection_string("host=db user=app dbname=app")?
///     .max_open_connections(20);
///
/// let client = Client::connect(
///     &Context::background(),
///     &PostgresDriver,
///     config,
///     [ClientOption::MaxRetries(5)],
/// )
/// .await?;
///
/// client.ping(&Context::background()).await?;
/// let conn = client.db().get().await?;
/// ```
pub struct Client<L: ConnectionLifecycle> {
    pool: Pool<L>,
    config: Config,
    instrumentation: InstrumentationContext,
    metrics: DatabaseMetrics,
}

impl<L: ConnectionLifecycle> Client<L> {
    /// Validate `config`, open a pool with retries, apply the pool limits and
    /// wrap the result.
    ///
    /// `overrides` are applied in order on top of [`Options::default`].
    pub async fn connect<D, I>(ctx: &Context, driver: &D, config: Config, overrides: I) -> Result<Self>
    where
        D: Driver<Lifecycle = L>,
        I: IntoIterator<Item = ClientOption>,
    {
        Self::connect_with_options(ctx, driver, config, Options::from_overrides(overrides)).await
    }

    async fn connect_with_options<D>(
        ctx: &Context,
        driver: &D,
        config: Config,
        options: Options,
    ) -> Result<Self>
    where
        D: Driver<Lifecycle = L>,
    {
        config.validate()?;

        let instrumentation = InstrumentationContext::new(driver.name(), &config.data_source);
        let metrics = DatabaseMetrics::new(driver.name(), &config.data_source);

        tracing::info!(
            driver = driver.name(),
            host = %config.data_source.host,
            port = config.data_source.port,
            dbname = %config.data_source.dbname,
            max_retries = options.max_retries,
            "connecting to database"
        );

        let timer = OperationTimer::start(span_names::CONNECT);
        let mut span = instrumentation.start(span_names::CONNECT);

        let result = async {
            let pool = connector::connect(ctx, driver, &config, &options).await?;
            configure_pool(&pool, &config, &options)?;
            Ok::<_, Error>(pool)
        }
        .await;

        if let Some(attempts) = result.as_ref().err().and_then(Error::attempts) {
            span.record_attempts(attempts);
        }
        finish(span, timer, &metrics, result.as_ref().err());

        Ok(Self {
            pool: result?,
            config,
            instrumentation,
            metrics,
        })
    }

    /// The pool, for running work against the database.
    #[must_use]
    pub fn db(&self) -> &Pool<L> {
        &self.pool
    }

    /// The configuration the client was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check that the database is reachable.
    ///
    /// Fails with [`FailureReason::Unreachable`] when the pool is closed, the
    /// database cannot be reached, or `ctx` ends first.
    pub async fn ping(&self, ctx: &Context) -> Result<()> {
        let timer = OperationTimer::start(span_names::PING);
        let span = self.instrumentation.start(span_names::PING);

        let result = tokio::select! {
            biased;
            cause = ctx.done() => Err(Error::connection_failed(FailureReason::Unreachable, cause)),
            result = self.pool.ping() => {
                result.map_err(|e| Error::connection_failed(FailureReason::Unreachable, e))
            }
        };

        finish(span, timer, &self.metrics, result.as_ref().err());
        result
    }

    /// Close the pool.
    ///
    /// Idle connections are closed right away and connections in use are
    /// closed when returned. Closing twice fails with
    /// [`FailureReason::Release`].
    pub fn close(&self) -> Result<()> {
        let timer = OperationTimer::start(span_names::CLOSE);
        let span = self.instrumentation.start(span_names::CLOSE);

        let result = self
            .pool
            .close()
            .map_err(|e: PoolError| Error::connection_failed(FailureReason::Release, e));

        finish(span, timer, &self.metrics, result.as_ref().err());
        if result.is_ok() {
            tracing::info!("database client closed");
        }
        result
    }

    /// Snapshot of the pool statistics.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        let stats = ConnectionStats::from(self.pool.stats());
        self.metrics.record_pool_status(&stats);
        stats
    }
}

fn finish(span: OperationSpan, timer: OperationTimer, metrics: &DatabaseMetrics, error: Option<&Error>) {
    if let Some(error) = error {
        tracing::debug!(operation = timer.operation(), %error, "database operation failed");
    }
    span.finish(error);
    timer.finish(metrics, error.is_none());
}

impl<L: ConnectionLifecycle> fmt::Debug for Client<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.config.data_source.host)
            .field("port", &self.config.data_source.port)
            .field("dbname", &self.config.data_source.dbname)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Fluent builder for a [`Client`].
///
/// # Example
///
/// ```rust,ignore
/// let client = ClientBuilder::new(config)
///     .max_retries(5)
///     .retry_delay(Duration::from_millis(500))
///     .on_retry(|attempt, err| eprintln!("attempt {attempt} failed: {err}"))
///     .connect(&ctx, &driver)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    config: Config,
    options: Options,
}

impl ClientBuilder {
    /// Create a builder with default options.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            options: Options::default(),
        }
    }

    /// Apply a [`ClientOption`].
    #[must_use]
    pub fn option(mut self, option: ClientOption) -> Self {
        self.options = self.options.apply(option);
        self
    }

    /// Set the connect timeout hint for the driver.
    #[must_use]
    pub fn connect_timeout(self, timeout: Duration) -> Self {
        self.option(ClientOption::ConnectTimeout(timeout))
    }

    /// Set the maximum number of connection attempts.
    #[must_use]
    pub fn max_retries(self, retries: u32) -> Self {
        self.option(ClientOption::MaxRetries(retries))
    }

    /// Set the base retry delay.
    #[must_use]
    pub fn retry_delay(self, delay: Duration) -> Self {
        self.option(ClientOption::RetryDelay(delay))
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn conn_max_lifetime(self, lifetime: Duration) -> Self {
        self.option(ClientOption::ConnMaxLifetime(lifetime))
    }

    /// Set the maximum connection idle time.
    #[must_use]
    pub fn conn_max_idle_time(self, idle_time: Duration) -> Self {
        self.option(ClientOption::ConnMaxIdleTime(idle_time))
    }

    /// Observe failed attempts that will be retried.
    #[must_use]
    pub fn on_retry<F>(self, observer: F) -> Self
    where
        F: Fn(u32, &PoolError) + Send + Sync + 'static,
    {
        self.option(ClientOption::on_retry(observer))
    }

    /// The options collected so far.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Connect using the collected options.
    pub async fn connect<D: Driver>(self, ctx: &Context, driver: &D) -> Result<Client<D::Lifecycle>> {
        Client::connect_with_options(ctx, driver, self.config, self.options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_applies_options_in_order() {
        let builder = ClientBuilder::new(Config::new())
            .max_retries(5)
            .max_retries(0)
            .retry_delay(Duration::from_millis(250))
            .connect_timeout(Duration::from_secs(3));

        let options = builder.options();
        assert_eq!(options.max_retries, 5);
        assert_eq!(options.retry_delay, Duration::from_millis(250));
        assert_eq!(options.connect_timeout, Duration::from_secs(3));
    }
}
