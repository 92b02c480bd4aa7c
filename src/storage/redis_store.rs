//! Redis secret store
//!
//! Each secret is a hash under `<prefix>:<id>` with the fields `id`, `value`
//! and `expiresAt` (RFC 3339). The key carries a TTL for the secret's
//! remaining lifetime, so Redis evicts expired secrets itself and
//! `delete_expired` has nothing to do.

use super::{SecretStore, StoreError, StoreKind, StoredSecret};
use crate::config::RedisConfig;
use crate::utils::{sanitize_url, SharedClock};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use deadpool_redis::{Config, Pool, PoolError, Runtime};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

const FIELD_ID: &str = "id";
const FIELD_VALUE: &str = "value";
const FIELD_EXPIRES_AT: &str = "expiresAt";

#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    key_prefix: String,
    clock: SharedClock,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("key_prefix", &self.key_prefix).finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Build the pool and check the server answers `PING`
    pub async fn connect(config: &RedisConfig, clock: SharedClock) -> Result<Self, StoreError> {
        let pool = Config::from_url(&config.url)
            .builder()
            .map_err(|e| StoreError::connection_with_source("invalid Redis configuration", e))?
            .max_size(config.pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StoreError::connection_with_source("failed to build Redis pool", e))?;

        let mut conn = pool.get().await.map_err(|e| {
            error!(error = %e, url = %sanitize_url(&config.url), "Failed to connect to Redis");
            map_pool_error(e)
        })?;
        redis::cmd("PING").query_async::<String>(&mut *conn).await.map_err(map_error)?;

        info!(
            url = %sanitize_url(&config.url),
            pool_size = config.pool_size,
            key_prefix = %config.key_prefix,
            "Redis secret store connected"
        );

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            clock,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.key_prefix, id)
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        self.pool.get().await.map_err(map_pool_error)
    }
}

#[async_trait]
impl SecretStore for RedisStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Redis
    }

    #[instrument(skip(self), fields(secret_id = %id), name = "redis_get_secret")]
    async fn get(&self, id: &str) -> Result<StoredSecret, StoreError> {
        let mut conn = self.connection().await?;
        let fields: HashMap<String, String> =
            conn.hgetall(self.key(id)).await.map_err(map_error)?;
        decode_fields(fields)
    }

    /// HSET, PEXPIRE and HGETALL run in one MULTI/EXEC
    #[instrument(skip(self, secret), fields(secret_id = %secret.id), name = "redis_create_secret")]
    async fn create(&self, secret: StoredSecret) -> Result<StoredSecret, StoreError> {
        let mut conn = self.connection().await?;
        let key = self.key(&secret.id);
        let ttl_ms = (secret.expires_at - self.clock.now()).num_milliseconds().max(1);
        let expires_at = secret.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true);

        let (fields,): (HashMap<String, String>,) = redis::pipe()
            .atomic()
            .hset_multiple(
                &key,
                &[
                    (FIELD_ID, secret.id.as_str()),
                    (FIELD_VALUE, secret.value.as_str()),
                    (FIELD_EXPIRES_AT, expires_at.as_str()),
                ],
            )
            .ignore()
            .pexpire(&key, ttl_ms)
            .ignore()
            .hgetall(&key)
            .query_async(&mut *conn)
            .await
            .map_err(map_error)?;

        decode_fields(fields)
    }

    #[instrument(skip(self), fields(secret_id = %id), name = "redis_delete_secret")]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let deleted: i64 = conn.del(self.key(id)).await.map_err(map_error)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        debug!("Redis expires secrets natively; nothing to sweep");
        Ok(0)
    }

    async fn close(&self) -> Result<(), StoreError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.pool.close();
            info!("Redis secret store closed");
        }
        Ok(())
    }
}

/// Turn a `HGETALL` reply into a secret. An empty reply means the key is
/// gone, either deleted or evicted.
fn decode_fields(mut fields: HashMap<String, String>) -> Result<StoredSecret, StoreError> {
    if fields.is_empty() {
        return Err(StoreError::NotFound);
    }

    let mut take = |name: &str| {
        fields.remove(name).ok_or_else(|| StoreError::data(format!("missing field '{}'", name)))
    };
    let id = take(FIELD_ID)?;
    let value = take(FIELD_VALUE)?;
    let expires_at = take(FIELD_EXPIRES_AT)?;

    let expires_at = DateTime::parse_from_rfc3339(&expires_at)
        .map_err(|e| StoreError::data(format!("invalid expiresAt '{}': {}", expires_at, e)))?
        .with_timezone(&Utc);

    Ok(StoredSecret::new(id, value, expires_at))
}

fn map_pool_error(error: PoolError) -> StoreError {
    match error {
        PoolError::Closed => StoreError::Closed,
        PoolError::Backend(e) => map_error(e),
        other => StoreError::connection_with_source("failed to get a Redis connection", other),
    }
}

fn map_error(error: redis::RedisError) -> StoreError {
    if error.is_io_error()
        || error.is_connection_refusal()
        || error.is_connection_dropped()
        || error.is_timeout()
    {
        StoreError::connection_with_source("Redis connection failed", error)
    } else {
        StoreError::query_with_source("Redis command failed", error)
    }
}
