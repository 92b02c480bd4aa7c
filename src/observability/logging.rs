//! # Structured Logging
//!
//! `tracing` subscriber setup. `RUST_LOG`, when set, overrides the
//! configured level; JSON output is available for log shippers.

use crate::config::{AppConfig, ObservabilityConfig};
use crate::errors::{BurnitError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Create a tracing span for a store operation.
///
/// ```rust,ignore
/// let span = store_span!("delete_expired", backend = "postgres");
/// ```
#[macro_export]
macro_rules! store_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "store_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Build the level filter, preferring `RUST_LOG` over `log_level`
pub fn env_filter(log_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(log_level).map_err(|e| {
            BurnitError::config_with_source(format!("Invalid log level '{}'", log_level), Box::new(e))
        }),
    }
}

/// Install the global subscriber.
///
/// A subscriber that is already installed (integration tests, embedding
/// applications) is left in place.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = env_filter(&config.log_level)?;

    let installed = if config.json_logging {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).try_init()
    };

    if installed.is_err() {
        // Subscriber already set elsewhere; ignore.
        tracing::debug!("Global tracing subscriber already installed");
    }
    Ok(())
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        backend = %config.store.kind(),
        timeout_seconds = config.service.timeout_seconds,
        cleanup_interval_seconds = config.service.cleanup_interval_seconds,
        max_value_characters = config.service.max_value_characters,
        min_ttl_seconds = config.service.min_ttl_seconds,
        max_ttl_seconds = config.service.max_ttl_seconds,
        json_logging = config.observability.json_logging,
        "Burnit configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_macro_compiles() {
        let _span = store_span!("get");
        let _span = store_span!("delete_expired", backend = "sqlite");
    }

    #[test]
    fn test_env_filter_accepts_directives() {
        assert!(env_filter("info").is_ok());
        assert!(env_filter("burnit=debug,sqlx=warn").is_ok());
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        let config = ObservabilityConfig::default();
        init_logging(&config).unwrap();
        init_logging(&config).unwrap();
    }
}
