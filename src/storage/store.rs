//! Secret store trait and types
//!
//! Defines the persistence contract every backend implements.

use super::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A secret as persisted by a store.
///
/// `value` is always ciphertext; the passphrase never reaches a store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSecret {
    pub id: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredSecret {
    pub fn new<I: Into<String>, V: Into<String>>(id: I, value: V, expires_at: DateTime<Utc>) -> Self {
        Self { id: id.into(), value: value.into(), expires_at }
    }

    /// Whether the secret is past its expiry at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

impl fmt::Debug for StoredSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredSecret")
            .field("id", &self.id)
            .field("value", &"[ENCRYPTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Which backend a store talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Memory,
    Postgres,
    Mssql,
    Sqlite,
    #[serde(rename = "mongodb")]
    MongoDb,
    Redis,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
            Self::Mssql => "mssql",
            Self::Sqlite => "sqlite",
            Self::MongoDb => "mongodb",
            Self::Redis => "redis",
        }
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "inmem" | "in-memory" => Ok(Self::Memory),
            "postgres" | "postgresql" | "pgx" => Ok(Self::Postgres),
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            "redis" => Ok(Self::Redis),
            other => Err(format!("Unknown store backend: {}", other)),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persistence contract for secrets.
///
/// - `get` and `delete` return [`StoreError::NotFound`] for unknown ids.
/// - `create` is atomic and returns the record exactly as stored.
/// - `delete_expired` returns how many secrets were removed; zero is not an
///   error.
/// - `close` is idempotent; any other call after it fails with
///   [`StoreError::Closed`].
#[async_trait]
pub trait SecretStore: Send + Sync + fmt::Debug {
    /// Backend this store talks to
    fn kind(&self) -> StoreKind;

    async fn get(&self, id: &str) -> Result<StoredSecret, StoreError>;

    async fn create(&self, secret: StoredSecret) -> Result<StoredSecret, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn delete_expired(&self) -> Result<u64, StoreError>;

    async fn close(&self) -> Result<(), StoreError>;
}
