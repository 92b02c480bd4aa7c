//! # Configuration Management
//!
//! Loads [`AppConfig`] from an optional TOML file layered under
//! `BURNIT__`-prefixed environment variables, e.g.
//!
//! ```text
//! BURNIT__STORE__BACKEND=redis
//! BURNIT__STORE__URL=redis://cache:6379
//! BURNIT__SERVICE__TIMEOUT_SECONDS=5
//! ```

pub mod settings;

pub use settings::{
    AppConfig, MongoConfig, MssqlConfig, ObservabilityConfig, PostgresConfig, RedisConfig,
    ServiceConfig, SqliteConfig, StoreConfig,
};

use crate::errors::{BurnitError, Result};
use std::path::Path;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "BURNIT";

impl AppConfig {
    /// Load configuration from the environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration from `path` (if given) and the environment, then
    /// validate it.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(BurnitError::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        let loaded: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreKind;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[service]
timeout_seconds = 5
cleanup_interval_seconds = 60

[store]
backend = "sqlite"
url = "sqlite::memory:"
table = "burn"

[observability]
json_logging = true
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.service.timeout_seconds, 5);
        assert_eq!(config.service.cleanup_interval_seconds, 60);
        assert_eq!(config.service.max_value_characters, 4000);
        assert_eq!(config.store.kind(), StoreKind::Sqlite);
        match config.store {
            StoreConfig::Sqlite(sqlite) => {
                assert_eq!(sqlite.table.as_deref(), Some("burn"));
                assert_eq!(sqlite.max_connections, 5);
            }
            other => panic!("unexpected store config: {:?}", other),
        }
        assert!(config.observability.json_logging);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/burnit.toml")));
        assert!(matches!(result, Err(BurnitError::Config { .. })));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[service]\ntimeout_seconds = 0").unwrap();

        assert!(AppConfig::load(Some(file.path())).is_err());
    }
}
