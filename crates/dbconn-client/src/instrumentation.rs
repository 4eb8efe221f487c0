//! OpenTelemetry instrumentation for client operations.
//!
//! With the `otel` feature enabled, connect, ping and close emit client spans
//! and operation metrics, and every [`Client::stats`](crate::Client::stats)
//! call records the pool gauges. Without the feature every type here is a
//! no-op with the same API.
//!
//! ## Semantic Conventions
//!
//! Follows OpenTelemetry database semantic conventions:
//! - `db.system`: driver name (e.g. "postgresql")
//! - `db.name`: Database name
//! - `db.operation`: Client operation (connect, ping, close)
//! - `server.address`: Server hostname
//! - `server.port`: Server port

#[cfg(feature = "otel")]
use opentelemetry::{
    KeyValue, global,
    trace::{Span, SpanKind, Status, Tracer},
};

use crate::config::DataSource;

/// Instrumentation scope name.
pub const INSTRUMENTATION_NAME: &str = "dbconn-client";

/// Span names for client operations.
pub mod span_names {
    /// Span name for establishing a client.
    pub const CONNECT: &str = "dbconn.connect";
    /// Span name for pinging the database.
    pub const PING: &str = "dbconn.ping";
    /// Span name for closing the pool.
    pub const CLOSE: &str = "dbconn.close";
}

/// Attribute keys following OpenTelemetry semantic conventions.
pub mod attributes {
    /// Database system type.
    pub const DB_SYSTEM: &str = "db.system";
    /// Database name.
    pub const DB_NAME: &str = "db.name";
    /// Database operation type.
    pub const DB_OPERATION: &str = "db.operation";
    /// Server hostname.
    pub const SERVER_ADDRESS: &str = "server.address";
    /// Server port.
    pub const SERVER_PORT: &str = "server.port";
    /// Connection attempts made.
    pub const DB_CONNECT_ATTEMPTS: &str = "db.client.connect.attempts";
    /// Error type.
    pub const ERROR_TYPE: &str = "error.type";
}

/// Instrumentation context for client operations.
#[cfg(feature = "otel")]
#[derive(Debug, Clone)]
pub struct InstrumentationContext {
    /// Database system (driver name).
    pub db_system: String,
    /// Server address.
    pub server_address: String,
    /// Server port.
    pub server_port: u16,
    /// Database name.
    pub database: String,
}

#[cfg(feature = "otel")]
impl InstrumentationContext {
    /// Create a new instrumentation context.
    #[must_use]
    pub fn new(db_system: &str, data_source: &DataSource) -> Self {
        Self {
            db_system: db_system.to_string(),
            server_address: data_source.host.clone(),
            server_port: data_source.port,
            database: data_source.dbname.clone(),
        }
    }

    /// Get base attributes for spans.
    pub fn base_attributes(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new(attributes::DB_SYSTEM, self.db_system.clone()),
            KeyValue::new(attributes::DB_NAME, self.database.clone()),
            KeyValue::new(attributes::SERVER_ADDRESS, self.server_address.clone()),
            KeyValue::new(attributes::SERVER_PORT, i64::from(self.server_port)),
        ]
    }

    /// Start a span for a client operation.
    #[must_use]
    pub fn start(&self, operation: &'static str) -> OperationSpan {
        let tracer = global::tracer(INSTRUMENTATION_NAME);
        let mut attrs = self.base_attributes();
        attrs.push(KeyValue::new(attributes::DB_OPERATION, operation));

        let span = tracer
            .span_builder(operation)
            .with_kind(SpanKind::Client)
            .with_attributes(attrs)
            .start(&tracer);
        OperationSpan { span }
    }
}

/// A span covering one client operation.
#[cfg(feature = "otel")]
pub struct OperationSpan {
    span: global::BoxedSpan,
}

#[cfg(feature = "otel")]
impl OperationSpan {
    /// Record the number of connection attempts.
    pub fn record_attempts(&mut self, attempts: u32) {
        self.span.set_attribute(KeyValue::new(
            attributes::DB_CONNECT_ATTEMPTS,
            i64::from(attempts),
        ));
    }

    /// End the span with the operation's outcome.
    pub fn finish(mut self, error: Option<&crate::error::Error>) {
        match error {
            Some(error) => {
                self.span.set_status(Status::error(error.to_string()));
                self.span.record_error(error);
            }
            None => self.span.set_status(Status::Ok),
        }
        self.span.end();
    }
}

/// No-op instrumentation context when otel feature is disabled.
#[cfg(not(feature = "otel"))]
#[derive(Debug, Clone, Default)]
pub struct InstrumentationContext;

#[cfg(not(feature = "otel"))]
impl InstrumentationContext {
    /// Create a new instrumentation context (no-op).
    #[must_use]
    pub fn new(_db_system: &str, _data_source: &DataSource) -> Self {
        Self
    }

    /// Start a span (no-op).
    #[must_use]
    pub fn start(&self, _operation: &'static str) -> OperationSpan {
        OperationSpan
    }
}

/// No-op span when otel feature is disabled.
#[cfg(not(feature = "otel"))]
#[derive(Debug)]
pub struct OperationSpan;

#[cfg(not(feature = "otel"))]
impl OperationSpan {
    /// Record the number of connection attempts (no-op).
    pub fn record_attempts(&mut self, _attempts: u32) {}

    /// End the span (no-op).
    pub fn finish(self, _error: Option<&crate::error::Error>) {}
}

// =============================================================================
// OpenTelemetry Metrics Support
// =============================================================================

/// Metric names following OpenTelemetry semantic conventions.
pub mod metric_names {
    /// Gauge: Number of connections currently in use.
    pub const DB_CLIENT_CONNECTIONS_USAGE: &str = "db.client.connections.usage";
    /// Gauge: Number of idle connections in the pool.
    pub const DB_CLIENT_CONNECTIONS_IDLE: &str = "db.client.connections.idle";
    /// Gauge: Maximum connections allowed in the pool.
    pub const DB_CLIENT_CONNECTIONS_MAX: &str = "db.client.connections.max";
    /// Gauge: Total checkouts that waited for a connection.
    pub const DB_CLIENT_CONNECTIONS_WAIT_COUNT: &str = "db.client.connections.wait_count";
    /// Histogram: Duration of client operations.
    pub const DB_CLIENT_OPERATION_DURATION: &str = "db.client.operation.duration";
    /// Counter: Total number of operations performed.
    pub const DB_CLIENT_OPERATIONS_TOTAL: &str = "db.client.operations.total";
    /// Counter: Total number of operation errors.
    pub const DB_CLIENT_ERRORS_TOTAL: &str = "db.client.errors.total";
}

/// Database metrics collector using OpenTelemetry.
#[cfg(feature = "otel")]
pub struct DatabaseMetrics {
    /// Connection usage gauge.
    connections_usage: opentelemetry::metrics::Gauge<u64>,
    /// Idle connections gauge.
    connections_idle: opentelemetry::metrics::Gauge<u64>,
    /// Max connections gauge.
    connections_max: opentelemetry::metrics::Gauge<u64>,
    /// Wait count gauge.
    connections_wait_count: opentelemetry::metrics::Gauge<u64>,
    /// Operation duration histogram.
    operation_duration: opentelemetry::metrics::Histogram<f64>,
    /// Total operations counter.
    operations_total: opentelemetry::metrics::Counter<u64>,
    /// Error counter.
    errors_total: opentelemetry::metrics::Counter<u64>,
    /// Base attributes for all metrics.
    base_attributes: Vec<KeyValue>,
}

#[cfg(feature = "otel")]
impl DatabaseMetrics {
    /// Create a new metrics collector.
    pub fn new(db_system: &str, data_source: &DataSource) -> Self {
        let meter = global::meter(INSTRUMENTATION_NAME);

        let connections_usage = meter
            .u64_gauge(metric_names::DB_CLIENT_CONNECTIONS_USAGE)
            .with_description("Number of connections currently in use")
            .with_unit("connections")
            .build();

        let connections_idle = meter
            .u64_gauge(metric_names::DB_CLIENT_CONNECTIONS_IDLE)
            .with_description("Number of idle connections available")
            .with_unit("connections")
            .build();

        let connections_max = meter
            .u64_gauge(metric_names::DB_CLIENT_CONNECTIONS_MAX)
            .with_description("Maximum number of connections allowed")
            .with_unit("connections")
            .build();

        let connections_wait_count = meter
            .u64_gauge(metric_names::DB_CLIENT_CONNECTIONS_WAIT_COUNT)
            .with_description("Total number of checkouts that waited for a connection")
            .with_unit("waits")
            .build();

        let operation_duration = meter
            .f64_histogram(metric_names::DB_CLIENT_OPERATION_DURATION)
            .with_description("Duration of client operations")
            .with_unit("s")
            .build();

        let operations_total = meter
            .u64_counter(metric_names::DB_CLIENT_OPERATIONS_TOTAL)
            .with_description("Total number of client operations")
            .with_unit("operations")
            .build();

        let errors_total = meter
            .u64_counter(metric_names::DB_CLIENT_ERRORS_TOTAL)
            .with_description("Total number of operation errors")
            .with_unit("errors")
            .build();

        let base_attributes = vec![
            KeyValue::new(attributes::DB_SYSTEM, db_system.to_string()),
            KeyValue::new(attributes::SERVER_ADDRESS, data_source.host.clone()),
            KeyValue::new(attributes::SERVER_PORT, i64::from(data_source.port)),
        ];

        Self {
            connections_usage,
            connections_idle,
            connections_max,
            connections_wait_count,
            operation_duration,
            operations_total,
            errors_total,
            base_attributes,
        }
    }

    /// Record pool connection status.
    pub fn record_pool_status(&self, stats: &crate::stats::ConnectionStats) {
        self.connections_usage
            .record(u64::from(stats.in_use), &self.base_attributes);
        self.connections_idle
            .record(u64::from(stats.idle), &self.base_attributes);
        self.connections_max
            .record(u64::from(stats.max_open_connections), &self.base_attributes);
        self.connections_wait_count
            .record(stats.wait_count, &self.base_attributes);
    }

    /// Record an operation duration.
    pub fn record_operation(&self, operation: &str, duration_seconds: f64, success: bool) {
        let mut attrs = self.base_attributes.clone();
        attrs.push(KeyValue::new(
            attributes::DB_OPERATION,
            operation.to_string(),
        ));
        attrs.push(KeyValue::new("db.operation.success", success));

        self.operations_total.add(1, &attrs);
        self.operation_duration.record(duration_seconds, &attrs);

        if !success {
            self.errors_total.add(1, &attrs);
        }
    }
}

/// No-op metrics collector when otel feature is disabled.
#[cfg(not(feature = "otel"))]
#[derive(Debug, Clone, Default)]
pub struct DatabaseMetrics;

#[cfg(not(feature = "otel"))]
impl DatabaseMetrics {
    /// Create a new no-op metrics collector.
    #[must_use]
    pub fn new(_db_system: &str, _data_source: &DataSource) -> Self {
        Self
    }

    /// Record pool status (no-op).
    pub fn record_pool_status(&self, _stats: &crate::stats::ConnectionStats) {}

    /// Record operation (no-op).
    pub fn record_operation(&self, _operation: &str, _duration_seconds: f64, _success: bool) {}
}

/// Helper for timing operations.
#[derive(Debug, Clone)]
pub struct OperationTimer {
    start: std::time::Instant,
    operation: &'static str,
}

impl OperationTimer {
    /// Start timing an operation.
    #[must_use]
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Get the elapsed time in seconds.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Get the operation name.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Finish timing and record the metric.
    pub fn finish(self, metrics: &DatabaseMetrics, success: bool) {
        metrics.record_operation(self.operation, self.elapsed_seconds(), success);
    }
}
