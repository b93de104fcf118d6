use crate::connection::Connector;
use crate::dialect::{
    Dialect, IsolationLevel, MsSqlDialect, MySqlDialect, PostgresDialect, SqliteDialect,
};
use crate::error::{OrmError, OrmResult};
use std::sync::Arc;
use std::time::Duration;

/// Default absolute lifetime of a cached read.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Default cap on SQL text length in log events.
pub const DEFAULT_MAX_LOGGED_SQL_LEN: usize = 2000;

/// Where the connection string comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Literal connection string (file path for SQLite).
    pub connection_string: Option<String>,
    /// Environment variable holding the connection string.
    pub connection_string_name: Option<String>,
}

impl ConnectionSettings {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            connection_string_name: None,
        }
    }

    pub fn from_env_name(name: impl Into<String>) -> Self {
        Self {
            connection_string: None,
            connection_string_name: Some(name.into()),
        }
    }

    /// The effective connection string. A literal string wins over the
    /// environment variable.
    pub fn resolve(&self) -> OrmResult<String> {
        if let Some(s) = &self.connection_string {
            return Ok(s.clone());
        }
        match &self.connection_string_name {
            Some(name) => std::env::var(name).map_err(|_| {
                OrmError::configuration(format!("environment variable '{name}' is not set"))
            }),
            None => Err(OrmError::configuration("no connection string configured")),
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Absolute time-to-live of each entry.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// Configuration for a [`MapperContext`](crate::MapperContext).
#[derive(Clone)]
pub struct MapperOptions {
    /// Initially selected dialect.
    pub dialect: Option<Arc<dyn Dialect>>,
    pub connection: ConnectionSettings,
    /// Run validators before inserts and updates.
    pub enable_model_validation: bool,
    /// Isolation level for explicit units of work.
    pub transaction_isolation: Option<IsolationLevel>,
    pub cache: CacheConfig,
    /// Operations slower than this are logged at `warn`.
    pub slow_threshold: Option<Duration>,
    pub max_logged_sql_len: usize,
    /// Overrides the dialect's own connection factory.
    pub connector: Option<Arc<dyn Connector>>,
}

impl std::fmt::Debug for MapperOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperOptions")
            .field("dialect", &self.dialect.as_ref().map(|d| d.name()))
            .field("connection", &self.connection)
            .field("enable_model_validation", &self.enable_model_validation)
            .field("transaction_isolation", &self.transaction_isolation)
            .field("cache", &self.cache)
            .field("slow_threshold", &self.slow_threshold)
            .field("max_logged_sql_len", &self.max_logged_sql_len)
            .field("connector", &self.connector.is_some())
            .finish()
    }
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            dialect: None,
            connection: ConnectionSettings::default(),
            enable_model_validation: true,
            transaction_isolation: None,
            cache: CacheConfig::default(),
            slow_threshold: None,
            max_logged_sql_len: DEFAULT_MAX_LOGGED_SQL_LEN,
            connector: None,
        }
    }
}

impl MapperOptions {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn use_mysql(self) -> Self {
        self.dialect(Arc::new(MySqlDialect::new()))
    }

    pub fn use_mssql(self) -> Self {
        self.dialect(Arc::new(MsSqlDialect::new()))
    }

    pub fn use_sqlite(self) -> Self {
        self.dialect(Arc::new(SqliteDialect::new()))
    }

    pub fn use_postgres(self) -> Self {
        self.dialect(Arc::new(PostgresDialect::new()))
    }

    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection = ConnectionSettings::new(connection_string);
        self
    }

    /// Read the connection string from the named environment variable.
    pub fn connection_string_name(mut self, name: impl Into<String>) -> Self {
        self.connection = ConnectionSettings::from_env_name(name);
        self
    }

    pub fn enable_model_validation(mut self, enabled: bool) -> Self {
        self.enable_model_validation = enabled;
        self
    }

    pub fn transaction_isolation(mut self, level: IsolationLevel) -> Self {
        self.transaction_isolation = Some(level);
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }

    /// Disable the result cache.
    pub fn no_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    /// Set slow operation threshold.
    pub fn slow_threshold(mut self, duration: Duration) -> Self {
        self.slow_threshold = Some(duration);
        self
    }

    pub fn max_logged_sql_len(mut self, len: usize) -> Self {
        self.max_logged_sql_len = len;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }
}
