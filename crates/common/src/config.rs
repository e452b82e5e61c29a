use crate::models::DataSourceKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use validator::Validate;

// Default constants
pub const DEFAULT_ROWS_PER_PAGE: u64 = 0;
pub const DEFAULT_BYTES_PER_PAGE: u64 = 4 * 1024 * 1024;
pub const DEFAULT_PREFETCH_QUEUE_CAPACITY: usize = 2;

pub const DEFAULT_INITIAL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_MAX_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.25;
pub const DEFAULT_MAX_ELAPSED_TIME_MS: u64 = 60_000;

pub const DEFAULT_OPEN_CONNECTION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SPLITTING_THRESHOLD_BYTES: u64 = 1024 * 1024 * 1024;

pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Deserialize, Clone, Default, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub paging: PagingConfig,
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pushdown: PushdownConfig,
    #[serde(default)]
    #[validate(nested)]
    pub postgresql: PostgreSqlConfig,
    #[serde(default)]
    #[validate(nested)]
    pub clickhouse: ClickHouseConfig,
    #[serde(default)]
    #[validate(nested)]
    pub mysql: MySqlConfig,
    /// Row ceilings keyed by data source kind (`postgresql`, `clickhouse`, ...).
    #[serde(default)]
    pub read_limits: HashMap<String, u64>,
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,
}

/// Page budgets. Zero disables the corresponding axis.
#[derive(Debug, Deserialize, Clone, Copy, Validate)]
pub struct PagingConfig {
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: u64,
    #[serde(default = "default_bytes_per_page")]
    pub bytes_per_page: u64,
    #[serde(default = "default_prefetch_queue_capacity")]
    #[validate(range(min = 1))]
    pub prefetch_queue_capacity: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            rows_per_page: default_rows_per_page(),
            bytes_per_page: default_bytes_per_page(),
            prefetch_queue_capacity: default_prefetch_queue_capacity(),
        }
    }
}

fn default_rows_per_page() -> u64 {
    DEFAULT_ROWS_PER_PAGE
}
fn default_bytes_per_page() -> u64 {
    DEFAULT_BYTES_PER_PAGE
}
fn default_prefetch_queue_capacity() -> usize {
    DEFAULT_PREFETCH_QUEUE_CAPACITY
}

/// Exponential backoff parameters.
///
/// `max_elapsed_time_ms = 0` disables retries: the operation runs exactly once.
#[derive(Debug, Deserialize, Clone, Copy, Validate)]
pub struct BackoffSettings {
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    #[serde(default = "default_multiplier")]
    #[validate(range(min = 1.0))]
    pub multiplier: f64,
    #[serde(default = "default_randomization_factor")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub randomization_factor: f64,
    #[serde(default = "default_max_elapsed_time_ms")]
    pub max_elapsed_time_ms: u64,
}

impl BackoffSettings {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn max_elapsed_time(&self) -> Duration {
        Duration::from_millis(self.max_elapsed_time_ms)
    }

    /// Settings that never retry.
    pub fn disabled() -> Self {
        Self {
            max_elapsed_time_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            multiplier: default_multiplier(),
            randomization_factor: default_randomization_factor(),
            max_elapsed_time_ms: default_max_elapsed_time_ms(),
        }
    }
}

fn default_initial_interval_ms() -> u64 {
    DEFAULT_INITIAL_INTERVAL_MS
}
fn default_max_interval_ms() -> u64 {
    DEFAULT_MAX_INTERVAL_MS
}
fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}
fn default_randomization_factor() -> f64 {
    DEFAULT_RANDOMIZATION_FACTOR
}
fn default_max_elapsed_time_ms() -> u64 {
    DEFAULT_MAX_ELAPSED_TIME_MS
}

/// Separate policies for opening connections and for issuing queries.
#[derive(Debug, Deserialize, Clone, Copy, Default, Validate)]
pub struct RetryConfig {
    #[serde(default)]
    #[validate(nested)]
    pub make_connection: BackoffSettings,
    #[serde(default)]
    #[validate(nested)]
    pub query: BackoffSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, Default)]
pub struct PushdownConfig {
    #[serde(default)]
    pub enable_timestamp_pushdown: bool,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct PostgreSqlConfig {
    #[serde(default = "default_open_connection_timeout_ms")]
    #[validate(range(min = 1))]
    pub open_connection_timeout_ms: u64,
    /// Overrides the global retry policy for this backend.
    #[serde(default)]
    #[validate(nested)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub splitting: SplittingConfig,
}

impl Default for PostgreSqlConfig {
    fn default() -> Self {
        Self {
            open_connection_timeout_ms: default_open_connection_timeout_ms(),
            retry: None,
            splitting: SplittingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SplittingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_splitting_threshold_bytes")]
    pub table_physical_size_threshold_bytes: u64,
}

impl Default for SplittingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            table_physical_size_threshold_bytes: default_splitting_threshold_bytes(),
        }
    }
}

fn default_splitting_threshold_bytes() -> u64 {
    DEFAULT_SPLITTING_THRESHOLD_BYTES
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ClickHouseConfig {
    #[serde(default = "default_open_connection_timeout_ms")]
    #[validate(range(min = 1))]
    pub open_connection_timeout_ms: u64,
    #[serde(default)]
    #[validate(nested)]
    pub retry: Option<RetryConfig>,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            open_connection_timeout_ms: default_open_connection_timeout_ms(),
            retry: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct MySqlConfig {
    #[serde(default = "default_open_connection_timeout_ms")]
    #[validate(range(min = 1))]
    pub open_connection_timeout_ms: u64,
    #[serde(default)]
    #[validate(nested)]
    pub retry: Option<RetryConfig>,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            open_connection_timeout_ms: default_open_connection_timeout_ms(),
            retry: None,
        }
    }
}

fn default_open_connection_timeout_ms() -> u64 {
    DEFAULT_OPEN_CONNECTION_TIMEOUT_MS
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Log every generated query together with its (redacted) arguments.
    #[serde(default)]
    pub enable_sql_query_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            enable_sql_query_logging: false,
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn validate_log_level(level: &str) -> Result<(), validator::ValidationError> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("unknown_log_level"))
    }
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        // CONFLUX_PAGING__BYTES_PER_PAGE maps to paging.bytes_per_page, etc.
        let builder = builder.add_source(
            config::Environment::with_prefix("CONFLUX")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(app_config)
    }

    /// Retry policy for a backend: its own override, or the global one.
    pub fn retry_for(&self, kind: DataSourceKind) -> RetryConfig {
        let own = match kind {
            DataSourceKind::PostgreSql => self.postgresql.retry,
            DataSourceKind::ClickHouse => self.clickhouse.retry,
            DataSourceKind::MySql => self.mysql.retry,
            DataSourceKind::MongoDb => None,
        };
        own.unwrap_or(self.retry)
    }

    /// Row ceiling for a backend, `None` when reads are unlimited.
    pub fn read_limit_for(&self, kind: DataSourceKind) -> Option<u64> {
        self.read_limits.get(kind.as_str()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_app_config_defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.paging.bytes_per_page, DEFAULT_BYTES_PER_PAGE);
        assert_eq!(config.paging.prefetch_queue_capacity, 2);
    }

    #[test]
    fn test_backoff_validation() {
        let settings = BackoffSettings {
            multiplier: 0.5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = BackoffSettings {
            randomization_factor: 1.5,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let logging = LoggingConfig {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(logging.validate().is_err());
    }

    #[test]
    fn test_retry_override() {
        let mut config = AppConfig::default();
        let custom = RetryConfig {
            query: BackoffSettings::disabled(),
            ..Default::default()
        };
        config.postgresql.retry = Some(custom);

        assert_eq!(
            config
                .retry_for(DataSourceKind::PostgreSql)
                .query
                .max_elapsed_time_ms,
            0
        );
        assert_eq!(
            config
                .retry_for(DataSourceKind::ClickHouse)
                .query
                .max_elapsed_time_ms,
            DEFAULT_MAX_ELAPSED_TIME_MS
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "paging:\n  rows_per_page: 100\n  bytes_per_page: 0\nread_limits:\n  postgresql: 500\n"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.paging.rows_per_page, 100);
        assert_eq!(config.paging.bytes_per_page, 0);
        assert_eq!(config.read_limit_for(DataSourceKind::PostgreSql), Some(500));
        assert_eq!(config.read_limit_for(DataSourceKind::MySql), None);
    }
}
