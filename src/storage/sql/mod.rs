//! # SQL Secret Store
//!
//! One store for PostgreSQL, SQLite and MSSQL. All three share the table
//! layout and statements from [`queries`]; Postgres and SQLite go through
//! sqlx pools, MSSQL through a TDS connection in [`mssql`].
//!
//! The table is created on connect. Expiry comparisons bind the store's
//! clock rather than the database's `NOW()`, so tests can move time.

pub mod mssql;
pub mod queries;

pub use mssql::MssqlConnection;
pub use queries::{Dialect, Queries};

use super::{SecretStore, StoreError, StoreKind, StoredSecret};
use crate::config::{MssqlConfig, PostgresConfig, SqliteConfig};
use crate::utils::{sanitize_connection_string, sanitize_url, SharedClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, sqlx::FromRow)]
struct SecretRow {
    id: String,
    value: String,
    expires_at: DateTime<Utc>,
}

impl From<SecretRow> for StoredSecret {
    fn from(row: SecretRow) -> Self {
        StoredSecret::new(row.id, row.value, row.expires_at)
    }
}

#[derive(Debug)]
enum SqlBackend {
    Postgres(PgPool),
    Sqlite(SqlitePool),
    Mssql(MssqlConnection),
}

/// Run `$body` against whichever sqlx pool backs the store, or `$mssql`
/// for SQL Server.
macro_rules! dispatch {
    ($backend:expr, $pool:ident => $body:expr, $conn:ident => $mssql:expr) => {
        match $backend {
            SqlBackend::Postgres($pool) => $body,
            SqlBackend::Sqlite($pool) => $body,
            SqlBackend::Mssql($conn) => $mssql,
        }
    };
}

#[derive(Debug)]
pub struct SqlStore {
    backend: SqlBackend,
    queries: Queries,
    clock: SharedClock,
    closed: AtomicBool,
}

impl SqlStore {
    /// Connect to PostgreSQL and create the table if needed
    pub async fn postgres(config: &PostgresConfig, clock: SharedClock) -> Result<Self, StoreError> {
        let queries = Queries::new(Dialect::Postgres, config.table.as_deref())?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| {
                error!(error = %e, url = %sanitize_url(&config.url), "Failed to create PostgreSQL pool");
                StoreError::connection_with_source(
                    format!("failed to connect to {}", sanitize_url(&config.url)),
                    e,
                )
            })?;

        info!(
            url = %sanitize_url(&config.url),
            table = %queries.table,
            max_connections = config.max_connections,
            "PostgreSQL secret store connected"
        );

        Self::init(SqlBackend::Postgres(pool), queries, clock).await
    }

    /// Open (or create) a SQLite database and create the table if needed
    pub async fn sqlite(config: &SqliteConfig, clock: SharedClock) -> Result<Self, StoreError> {
        let queries = Queries::new(Dialect::Sqlite, config.table.as_deref())?;

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| {
                StoreError::connection_with_source(format!("invalid SQLite URL: {}", config.url), e)
            })?
            .create_if_missing(true)
            .busy_timeout(SQLITE_BUSY_TIMEOUT);

        // An in-memory database vanishes with its last connection
        let connected = if config.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            if let Some(parent) = options.get_filename().parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        StoreError::connection_with_source(
                            format!("failed to create directory {}", parent.display()),
                            e,
                        )
                    })?;
                }
            }
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await
        };

        let pool = connected.map_err(|e| {
            error!(
                error = %e,
                url = %config.url,
                busy_timeout_ms = SQLITE_BUSY_TIMEOUT.as_millis() as u64,
                "Failed to create SQLite pool"
            );
            StoreError::connection_with_source(format!("failed to open {}", config.url), e)
        })?;

        info!(url = %config.url, table = %queries.table, "SQLite secret store opened");

        Self::init(SqlBackend::Sqlite(pool), queries, clock).await
    }

    /// Connect to SQL Server and create the table if needed
    pub async fn mssql(config: &MssqlConfig, clock: SharedClock) -> Result<Self, StoreError> {
        let queries = Queries::new(Dialect::Mssql, config.table.as_deref())?;
        let target = sanitize_connection_string(&config.connection_string);
        let connection = MssqlConnection::connect(config).await.map_err(|e| {
            error!(error = %e, connection = %target, "Failed to connect to MSSQL");
            e
        })?;

        info!(connection = %target, table = %queries.table, "MSSQL secret store connected");

        Self::init(SqlBackend::Mssql(connection), queries, clock).await
    }

    async fn init(
        backend: SqlBackend,
        queries: Queries,
        clock: SharedClock,
    ) -> Result<Self, StoreError> {
        let store = Self { backend, queries, clock, closed: AtomicBool::new(false) };
        store.create_table().await?;
        Ok(store)
    }

    pub fn dialect(&self) -> Dialect {
        self.queries.dialect
    }

    pub fn table(&self) -> &str {
        &self.queries.table
    }

    async fn create_table(&self) -> Result<(), StoreError> {
        let q = &self.queries;
        dispatch!(&self.backend,
            pool => {
                sqlx::query(&q.create_table).execute(pool).await.map_err(map_sqlx_error)?;
            },
            conn => conn.create_table(q).await?
        );
        debug!(dialect = %q.dialect, table = %q.table, "Ensured secrets table exists");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for SqlStore {
    fn kind(&self) -> StoreKind {
        match self.queries.dialect {
            Dialect::Postgres => StoreKind::Postgres,
            Dialect::Mssql => StoreKind::Mssql,
            Dialect::Sqlite => StoreKind::Sqlite,
        }
    }

    #[instrument(skip(self), fields(secret_id = %id, dialect = %self.queries.dialect), name = "db_get_secret")]
    async fn get(&self, id: &str) -> Result<StoredSecret, StoreError> {
        self.ensure_open()?;
        let q = &self.queries;
        dispatch!(&self.backend,
            pool => {
                let row = sqlx::query_as::<_, SecretRow>(&q.select)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .map_err(map_sqlx_error)?;
                row.map(StoredSecret::from).ok_or(StoreError::NotFound)
            },
            conn => conn.get(q, id).await
        )
    }

    #[instrument(skip(self, secret), fields(secret_id = %secret.id, dialect = %self.queries.dialect), name = "db_create_secret")]
    async fn create(&self, secret: StoredSecret) -> Result<StoredSecret, StoreError> {
        self.ensure_open()?;
        let q = &self.queries;
        let stored = dispatch!(&self.backend,
            pool => {
                let mut tx = pool.begin().await.map_err(map_sqlx_error)?;
                sqlx::query(&q.insert)
                    .bind(secret.id.as_str())
                    .bind(secret.value.as_str())
                    .bind(secret.expires_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_insert_error(e, &secret.id))?;
                let row = sqlx::query_as::<_, SecretRow>(&q.select)
                    .bind(secret.id.as_str())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                tx.commit().await.map_err(map_sqlx_error)?;
                StoredSecret::from(row)
            },
            conn => conn.create(q, &secret).await?
        );
        Ok(stored)
    }

    #[instrument(skip(self), fields(secret_id = %id, dialect = %self.queries.dialect), name = "db_delete_secret")]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let q = &self.queries;
        dispatch!(&self.backend,
            pool => {
                let result =
                    sqlx::query(&q.delete).bind(id).execute(pool).await.map_err(map_sqlx_error)?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound);
                }
                Ok(())
            },
            conn => conn.delete(q, id).await
        )
    }

    #[instrument(skip(self), fields(dialect = %self.queries.dialect), name = "db_delete_expired")]
    async fn delete_expired(&self) -> Result<u64, StoreError> {
        self.ensure_open()?;
        let q = &self.queries;
        let now = self.clock.now();
        let removed = dispatch!(&self.backend,
            pool => {
                sqlx::query(&q.delete_expired)
                    .bind(now)
                    .execute(pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected()
            },
            conn => conn.delete_expired(q, now).await?
        );
        debug!(removed, "Swept expired secrets");
        Ok(removed)
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        dispatch!(&self.backend,
            pool => pool.close().await,
            conn => conn.close().await?
        );
        info!(dialect = %self.queries.dialect, "SQL secret store closed");
        Ok(())
    }
}

fn map_insert_error(error: sqlx::Error, id: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_unique_violation() {
            return StoreError::conflict(id);
        }
    }
    map_sqlx_error(error)
}

fn map_sqlx_error(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => StoreError::Closed,
        sqlx::Error::PoolTimedOut => StoreError::connection("timed out acquiring a connection"),
        e @ (sqlx::Error::Io(_) | sqlx::Error::Tls(_)) => {
            StoreError::connection_with_source("database connection failed", e)
        }
        e => StoreError::query_with_source("database query failed", e),
    }
}
