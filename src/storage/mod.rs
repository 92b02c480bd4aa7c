//! # Storage and Persistence
//!
//! Backends that persist encrypted secrets behind the [`SecretStore`]
//! contract:
//!
//! - [`MemoryStore`]: process-local map, for development and tests
//! - [`SqlStore`]: PostgreSQL, SQLite and MSSQL
//! - [`MongoStore`]: a MongoDB collection
//! - [`RedisStore`]: Redis hashes with native key expiry
//!
//! Exactly one backend is built at startup, via [`create_store`].

pub mod error;
pub mod memory;
pub mod mongo;
pub mod redis_store;
pub mod sql;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use redis_store::RedisStore;
pub use sql::{Dialect, SqlStore};
pub use store::{SecretStore, StoreKind, StoredSecret};

use crate::config::StoreConfig;
use crate::utils::SharedClock;
use std::sync::Arc;

/// Build the store selected by `config`.
///
/// Persistent backends connect (and create their table where needed) before
/// this returns, so a bad URL fails at startup rather than on first use.
pub async fn create_store(
    config: &StoreConfig,
    clock: SharedClock,
) -> Result<Arc<dyn SecretStore>, StoreError> {
    tracing::info!(backend = %config.kind(), "Creating secret store");

    let store: Arc<dyn SecretStore> = match config {
        StoreConfig::Memory => Arc::new(MemoryStore::new(clock)),
        StoreConfig::Postgres(postgres) => Arc::new(SqlStore::postgres(postgres, clock).await?),
        StoreConfig::Sqlite(sqlite) => Arc::new(SqlStore::sqlite(sqlite, clock).await?),
        StoreConfig::Mssql(mssql) => Arc::new(SqlStore::mssql(mssql, clock).await?),
        StoreConfig::MongoDb(mongo) => Arc::new(MongoStore::connect(mongo, clock).await?),
        StoreConfig::Redis(redis) => Arc::new(RedisStore::connect(redis, clock).await?),
    };

    Ok(store)
}
