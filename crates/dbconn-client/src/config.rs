//! Client configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::naming::NamingStrategy;

/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;

const MASK: &str = "********";

/// TLS negotiation mode requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Never use TLS.
    Disable,
    /// Use TLS if the server supports it.
    #[default]
    Prefer,
    /// Fail unless TLS is available.
    Require,
}

impl SslMode {
    /// The connection-string value for this mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            other => Err(Error::InvalidConfig(format!("invalid sslmode: {other}"))),
        }
    }
}

/// Where and as whom to connect.
///
/// Renders to and parses from a libpq-style `key=value` connection string.
/// Keys naming a field (`host`, `password`, `pwd`, ...) always land in that
/// field, whether they come from a parsed string, [`DataSource::param`] or a
/// deserialized `params` map.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "DataSourceFields")]
pub struct DataSource {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port (default: 5432).
    pub port: u16,

    /// Login user.
    pub user: String,

    /// Login password.
    pub password: String,

    /// Database name.
    pub dbname: String,

    /// TLS mode.
    pub sslmode: SslMode,

    /// Application name reported to the server.
    pub application_name: Option<String>,

    /// Server-side connect timeout in seconds.
    pub connect_timeout: Option<u64>,

    /// Additional driver parameters.
    pub params: BTreeMap<String, String>,
}

impl Default for DataSource {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
            dbname: String::new(),
            sslmode: SslMode::default(),
            application_name: None,
            connect_timeout: None,
            params: BTreeMap::new(),
        }
    }
}

impl DataSource {
    /// Create a descriptor with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the login user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the login password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = dbname.into();
        self
    }

    /// Set the TLS mode.
    #[must_use]
    pub fn sslmode(mut self, mode: SslMode) -> Self {
        self.sslmode = mode;
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Add a driver parameter.
    ///
    /// A key naming one of the fields above sets that field. If its value
    /// does not parse, it is kept as a parameter and reported by
    /// [`validate`](Self::validate).
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        if self.set(&key, value.clone()).is_err() {
            self.params.insert(key, value);
        }
        self
    }

    /// Route one `key=value` pair to its field, or to `params`.
    fn set(&mut self, key: &str, value: String) -> Result<()> {
        match key.to_ascii_lowercase().as_str() {
            "host" | "server" => self.host = value,
            "port" => {
                self.port = value
                    .parse()
                    .map_err(|_| Error::InvalidConfig(format!("invalid port: {value}")))?;
            }
            "user" | "username" => self.user = value,
            "password" | "pwd" => self.password = value,
            "dbname" | "database" => self.dbname = value,
            "sslmode" => self.sslmode = value.parse()?,
            "application_name" => self.application_name = Some(value),
            "connect_timeout" => {
                let secs = value
                    .parse()
                    .map_err(|_| Error::InvalidConfig(format!("invalid timeout: {value}")))?;
                self.connect_timeout = Some(secs);
            }
            _ => {
                self.params.insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    /// Check that the descriptor names a reachable target.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidConfig("host is required".into()));
        }
        if self.port == 0 {
            return Err(Error::InvalidConfig("port must be non-zero".into()));
        }
        if self.user.trim().is_empty() {
            return Err(Error::InvalidConfig("user is required".into()));
        }
        if self.dbname.trim().is_empty() {
            return Err(Error::InvalidConfig("dbname is required".into()));
        }
        for (key, value) in &self.params {
            if key.is_empty() || key.chars().any(|c| c.is_whitespace() || c == '=') {
                return Err(Error::InvalidConfig(format!("invalid parameter name: {key:?}")));
            }
            if is_field_key(key) {
                Self::default().set(key, value.clone())?;
                return Err(Error::InvalidConfig(format!(
                    "parameter {key} must be set through its field"
                )));
            }
        }
        Ok(())
    }

    /// Render the connection string, password included.
    #[must_use]
    pub fn connection_string(&self) -> String {
        self.render(false)
    }

    /// Render the connection string with the password masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        self.render(true)
    }

    fn render(&self, redact: bool) -> String {
        let mut out = String::new();
        let mut push = |key: &str, value: &str| {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(key);
            out.push('=');
            push_value(&mut out, value);
        };

        push("host", &self.host);
        push("port", &self.port.to_string());
        push("user", &self.user);
        if !self.password.is_empty() {
            push("password", if redact { MASK } else { self.password.as_str() });
        }
        push("dbname", &self.dbname);
        push("sslmode", self.sslmode.as_str());
        if let Some(name) = &self.application_name {
            push("application_name", name);
        }
        if let Some(secs) = self.connect_timeout {
            push("connect_timeout", &secs.to_string());
        }
        for (key, value) in &self.params {
            push(key, if redact && is_secret_key(key) { MASK } else { value });
        }

        out
    }
}

/// Append a connection-string value, quoting it when needed.
fn push_value(out: &mut String, value: &str) {
    let needs_quotes =
        value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        out.push_str(value);
        return;
    }

    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("params", &RedactedParams(&self.params))
            .finish()
    }
}

struct RedactedParams<'a>(&'a BTreeMap<String, String>);

impl fmt::Debug for RedactedParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(key, value)| {
                let value = if is_secret_key(key) { "<redacted>" } else { value.as_str() };
                (key, value)
            }))
            .finish()
    }
}

fn is_field_key(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "host"
            | "server"
            | "port"
            | "user"
            | "username"
            | "password"
            | "pwd"
            | "dbname"
            | "database"
            | "sslmode"
            | "application_name"
            | "connect_timeout"
    )
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key == "pwd" || key.contains("password")
}

/// Serialized form of [`DataSource`].
#[derive(Deserialize)]
#[serde(default)]
struct DataSourceFields {
    host: String,
    port: u16,
    user: String,
    password: String,
    dbname: String,
    sslmode: SslMode,
    application_name: Option<String>,
    connect_timeout: Option<u64>,
    params: BTreeMap<String, String>,
}

impl Default for DataSourceFields {
    fn default() -> Self {
        let DataSource {
            host,
            port,
            user,
            password,
            dbname,
            sslmode,
            application_name,
            connect_timeout,
            params,
        } = DataSource::default();
        Self {
            host,
            port,
            user,
            password,
            dbname,
            sslmode,
            application_name,
            connect_timeout,
            params,
        }
    }
}

impl TryFrom<DataSourceFields> for DataSource {
    type Error = Error;

    fn try_from(fields: DataSourceFields) -> Result<Self> {
        let mut source = Self {
            host: fields.host,
            port: fields.port,
            user: fields.user,
            password: fields.password,
            dbname: fields.dbname,
            sslmode: fields.sslmode,
            application_name: fields.application_name,
            connect_timeout: fields.connect_timeout,
            params: BTreeMap::new(),
        };
        for (key, value) in fields.params {
            source.set(&key, value)?;
        }
        Ok(source)
    }
}

impl FromStr for DataSource {
    type Err = Error;

    /// Parse a libpq-style connection string:
    ///
    /// ```text
    /// host=localhost port=5432 user=app password='s3cr et' dbname=app
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        let mut source = Self::default();

        for (key, value) in parse_pairs(s)? {
            source.set(&key, value)?;
        }

        Ok(source)
    }
}

/// Split a connection string into `(key, value)` pairs.
fn parse_pairs(s: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = s.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Ok(pairs);
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') {
            return Err(Error::InvalidConfig(format!(
                "missing \"=\" after \"{key}\" in connection string"
            )));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\'') => break,
                    Some('\\') => match chars.next() {
                        Some(escaped) => value.push(escaped),
                        None => {
                            return Err(Error::InvalidConfig(
                                "unterminated quoted value in connection string".into(),
                            ));
                        }
                    },
                    Some(c) => value.push(c),
                    None => {
                        return Err(Error::InvalidConfig(
                            "unterminated quoted value in connection string".into(),
                        ));
                    }
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }

        pairs.push((key.to_ascii_lowercase(), value));
    }
}

/// Configuration for establishing a client.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection target and credentials.
    pub data_source: DataSource,

    /// Maximum open connections; `0` keeps the pool default (unlimited).
    pub max_open_connections: u32,

    /// Maximum idle connections; `0` keeps the pool default.
    pub max_idle_connections: u32,

    /// Ask the driver to prepare statements.
    pub prepare_statements: bool,

    /// Ask the driver to enforce foreign keys.
    pub enforce_foreign_keys: bool,

    /// Ask the driver not to wrap single writes in a transaction.
    pub skip_default_transaction: bool,

    /// Ask the driver to log statements.
    pub enable_logging: bool,

    /// Naming hook handed to the driver.
    #[serde(skip)]
    pub naming_strategy: Option<Arc<dyn NamingStrategy>>,
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration from a connection string.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        Ok(Self {
            data_source: conn_str.parse()?,
            ..Self::default()
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.data_source.validate()
    }

    /// Set the data source.
    #[must_use]
    pub fn data_source(mut self, data_source: DataSource) -> Self {
        self.data_source = data_source;
        self
    }

    /// Set the maximum number of open connections.
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

    /// Enable prepared statements.
    #[must_use]
    pub fn prepare_statements(mut self, enabled: bool) -> Self {
        self.prepare_statements = enabled;
        self
    }

    /// Enforce foreign keys.
    #[must_use]
    pub fn enforce_foreign_keys(mut self, enabled: bool) -> Self {
        self.enforce_foreign_keys = enabled;
        self
    }

    /// Skip the default transaction around writes.
    #[must_use]
    pub fn skip_default_transaction(mut self, enabled: bool) -> Self {
        self.skip_default_transaction = enabled;
        self
    }

    /// Enable statement logging.
    #[must_use]
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Set the naming strategy.
    #[must_use]
    pub fn naming_strategy(mut self, strategy: impl NamingStrategy + 'static) -> Self {
        self.naming_strategy = Some(Arc::new(strategy));
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("data_source", &self.data_source)
            .field("max_open_connections", &self.max_open_connections)
            .field("max_idle_connections", &self.max_idle_connections)
            .field("prepare_statements", &self.prepare_statements)
            .field("enforce_foreign_keys", &self.enforce_foreign_keys)
            .field("skip_default_transaction", &self.skip_default_transaction)
            .field("enable_logging", &self.enable_logging)
            .field("naming_strategy", &self.naming_strategy)
            .finish()
    }
}
