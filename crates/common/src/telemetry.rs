//! Logging initialization for connector processes.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from `logging.level`.
//! Generated queries are logged under the `queries` target so they can be
//! routed or silenced separately.

use crate::config::LoggingConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Target used for generated query text and its redacted arguments.
pub const QUERY_LOG_TARGET: &str = "queries";

pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber. Fails if one is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let stdout_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_filter(build_filter(config))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_filter(build_filter(config))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_fails() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
