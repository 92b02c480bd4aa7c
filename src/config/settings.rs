//! # Configuration Settings
//!
//! Defines the configuration structure for the burnit secret service.

use crate::errors::{BurnitError, Result};
use crate::storage::StoreKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Secret service limits and timings
    #[validate(nested)]
    pub service: ServiceConfig,

    /// Storage backend selection and connection settings
    pub store: StoreConfig,

    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(BurnitError::from)?;
        self.store.validate()?;
        self.validate_custom()?;
        Ok(())
    }

    /// Checks that span more than one field
    fn validate_custom(&self) -> Result<()> {
        if self.service.min_ttl_seconds >= self.service.max_ttl_seconds {
            return Err(BurnitError::config("min_ttl_seconds must be less than max_ttl_seconds"));
        }

        if self.service.min_passphrase_characters > self.service.max_passphrase_characters {
            return Err(BurnitError::config(
                "min_passphrase_characters cannot be greater than max_passphrase_characters",
            ));
        }

        Ok(())
    }
}

/// Secret service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upper bound for a single create/get/delete, in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub timeout_seconds: u64,

    /// How often expired secrets are swept, in seconds
    #[validate(range(
        min = 1,
        max = 86400,
        message = "Cleanup interval must be between 1 second and 1 day"
    ))]
    pub cleanup_interval_seconds: u64,

    /// Maximum number of characters in a secret value
    #[validate(range(min = 1, max = 1000000, message = "Max value characters must be positive"))]
    pub max_value_characters: usize,

    #[validate(range(min = 1, message = "Passphrases need at least one character"))]
    pub min_passphrase_characters: usize,

    #[validate(range(min = 1, max = 1024, message = "Max passphrase characters must be 1-1024"))]
    pub max_passphrase_characters: usize,

    /// Shortest allowed lifetime of a secret, in seconds
    #[validate(range(min = 1, message = "Minimum TTL must be at least one second"))]
    pub min_ttl_seconds: u64,

    /// Longest allowed lifetime of a secret, in seconds
    #[validate(range(min = 1, message = "Maximum TTL must be at least one second"))]
    pub max_ttl_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            cleanup_interval_seconds: 30,
            max_value_characters: 4000,
            min_passphrase_characters: 1,
            max_passphrase_characters: 64,
            min_ttl_seconds: 55, // 1m - 5s
            max_ttl_seconds: 7 * 86400 + 5, // 7d + 5s
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

/// Storage backend configuration, tagged by `backend`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    Postgres(PostgresConfig),
    Sqlite(SqliteConfig),
    Mssql(MssqlConfig),
    #[serde(rename = "mongodb")]
    MongoDb(MongoConfig),
    Redis(RedisConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl StoreConfig {
    pub fn kind(&self) -> StoreKind {
        match self {
            Self::Memory => StoreKind::Memory,
            Self::Postgres(_) => StoreKind::Postgres,
            Self::Sqlite(_) => StoreKind::Sqlite,
            Self::Mssql(_) => StoreKind::Mssql,
            Self::MongoDb(_) => StoreKind::MongoDb,
            Self::Redis(_) => StoreKind::Redis,
        }
    }

    /// Validate the selected backend's settings
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Memory => Ok(()),
            Self::Postgres(config) => Ok(Validate::validate(config)?),
            Self::Sqlite(config) => Ok(Validate::validate(config)?),
            Self::Mssql(config) => Ok(Validate::validate(config)?),
            Self::MongoDb(config) => Ok(Validate::validate(config)?),
            Self::Redis(config) => Ok(Validate::validate(config)?),
        }
    }
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PostgresConfig {
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Table name; defaults to `secrets`
    pub table: Option<String>,

    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    #[validate(range(max = 50, message = "Min connections must be between 0 and 50"))]
    pub min_connections: u32,

    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost:5432/burnit".to_string(),
            table: None,
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
        }
    }
}

impl PostgresConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// SQLite settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SqliteConfig {
    /// `sqlite://path/to/file.db` or `sqlite::memory:`
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Table name; defaults to `secrets`
    pub table: Option<String>,

    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self { url: "sqlite://./data/burnit.db".to_string(), table: None, max_connections: 5 }
    }
}

impl SqliteConfig {
    /// In-memory databases live in a single connection
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// MSSQL settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MssqlConfig {
    /// ADO.NET style connection string,
    /// e.g. `server=tcp:localhost,1433;user=sa;password=...;TrustServerCertificate=true`
    #[validate(length(min = 1, message = "Connection string cannot be empty"))]
    pub connection_string: String,

    /// Table name; defaults to `Secrets`
    pub table: Option<String>,

    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,
}

impl Default for MssqlConfig {
    fn default() -> Self {
        Self {
            connection_string: "server=tcp:localhost,1433;TrustServerCertificate=true".to_string(),
            table: None,
            connect_timeout_seconds: 10,
        }
    }
}

impl MssqlConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// MongoDB settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MongoConfig {
    #[validate(length(min = 1, message = "MongoDB URI cannot be empty"))]
    pub uri: String,

    #[validate(length(min = 1, message = "Database name cannot be empty"))]
    pub database: String,

    #[validate(length(min = 1, message = "Collection name cannot be empty"))]
    pub collection: String,

    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "burnit".to_string(),
            collection: "secrets".to_string(),
            connect_timeout_seconds: 10,
        }
    }
}

impl MongoConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Redis settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RedisConfig {
    #[validate(length(min = 1, message = "Redis URL cannot be empty"))]
    pub url: String,

    #[validate(range(min = 1, max = 256, message = "Pool size must be between 1 and 256"))]
    pub pool_size: usize,

    /// Keys are stored as `<key_prefix>:<id>`
    #[validate(length(min = 1, message = "Key prefix cannot be empty"))]
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            key_prefix: "secret".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}
