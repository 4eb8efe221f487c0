//! PostgreSQL driver built on `tokio-postgres`.

use async_trait::async_trait;
use dbconn_pool::{BoxError, ConnectionLifecycle};
use tokio_postgres::NoTls;

use crate::connector::{Driver, OpenRequest};

/// Driver for PostgreSQL servers.
///
/// Connections are made without TLS; `sslmode=require` therefore fails at
/// connect time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

impl Driver for PostgresDriver {
    type Lifecycle = PostgresLifecycle;

    fn name(&self) -> &str {
        "postgresql"
    }

    fn lifecycle(&self, request: &OpenRequest<'_>) -> Result<PostgresLifecycle, BoxError> {
        let mut config: tokio_postgres::Config = request.connection_string.parse()?;
        if config.get_connect_timeout().is_none() {
            config.connect_timeout(request.connect_timeout);
        }
        Ok(PostgresLifecycle { config })
    }
}

/// Opens and checks `tokio-postgres` connections for the pool.
#[derive(Debug, Clone)]
pub struct PostgresLifecycle {
    config: tokio_postgres::Config,
}

impl PostgresLifecycle {
    /// The parsed connection settings.
    #[must_use]
    pub fn config(&self) -> &tokio_postgres::Config {
        &self.config
    }
}

#[async_trait]
impl ConnectionLifecycle for PostgresLifecycle {
    type Connection = tokio_postgres::Client;
    type Error = tokio_postgres::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let (client, connection) = self.config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "postgres connection terminated");
            }
        });
        Ok(client)
    }

    async fn health_check(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await.map(|_| ())
    }

    fn is_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}
