//! MSSQL connection over TDS.
//!
//! sqlx has no SQL Server driver, so this side of the SQL store talks to
//! the server through `tiberius`. A single connection is shared behind a
//! mutex. Each exchange runs on its own task that holds the lock until the
//! server has answered in full, so a caller giving up (timeout, dropped
//! future) never leaves a transaction open or a response half read.

use super::queries::Queries;
use crate::config::MssqlConfig;
use crate::storage::{StoreError, StoredSecret};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tiberius::{Client, Config, Row};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

type MssqlClient = Client<Compat<TcpStream>>;

type Shared<C> = Arc<Mutex<Option<C>>>;

type Exchange<'c, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'c>>;

/// Primary key violation
const ERR_PRIMARY_KEY: u32 = 2627;
/// Unique index violation
const ERR_UNIQUE_INDEX: u32 = 2601;

pub struct MssqlConnection {
    client: Shared<MssqlClient>,
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection").finish_non_exhaustive()
    }
}

impl MssqlConnection {
    /// Open a connection using an ADO.NET connection string
    pub async fn connect(config: &MssqlConfig) -> Result<Self, StoreError> {
        let tds = Config::from_ado_string(&config.connection_string)
            .map_err(|e| StoreError::connection_with_source("invalid MSSQL connection string", e))?;

        let tcp = tokio::time::timeout(config.connect_timeout(), TcpStream::connect(tds.get_addr()))
            .await
            .map_err(|_| {
                StoreError::connection(format!(
                    "timed out connecting to MSSQL after {}s",
                    config.connect_timeout_seconds
                ))
            })?
            .map_err(|e| StoreError::connection_with_source("failed to connect to MSSQL", e))?;
        tcp.set_nodelay(true)
            .map_err(|e| StoreError::connection_with_source("failed to configure MSSQL socket", e))?;

        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| StoreError::connection_with_source("MSSQL handshake failed", e))?;

        Ok(Self { client: Arc::new(Mutex::new(Some(client))) })
    }

    pub async fn create_table(&self, queries: &Queries) -> Result<(), StoreError> {
        let sql = queries.create_table.clone();
        run_detached(&self.client, move |client| {
            Box::pin(async move { run_simple(client, &sql).await })
        })
        .await
    }

    pub async fn get(&self, queries: &Queries, id: &str) -> Result<StoredSecret, StoreError> {
        let queries = queries.clone();
        let id = id.to_string();
        run_detached(&self.client, move |client| {
            Box::pin(async move { select(client, &queries, &id).await })
        })
        .await
    }

    /// Insert then read back inside one transaction
    pub async fn create(
        &self,
        queries: &Queries,
        secret: &StoredSecret,
    ) -> Result<StoredSecret, StoreError> {
        let queries = queries.clone();
        let secret = secret.clone();
        run_detached(&self.client, move |client| {
            Box::pin(async move { insert_in_transaction(client, &queries, &secret).await })
        })
        .await
    }

    pub async fn delete(&self, queries: &Queries, id: &str) -> Result<(), StoreError> {
        let sql = queries.delete.clone();
        let id = id.to_string();
        let affected = run_detached(&self.client, move |client| {
            Box::pin(async move {
                let done = client.execute(sql.as_str(), &[&id.as_str()]).await.map_err(map_error)?;
                Ok::<_, StoreError>(done.total())
            })
        })
        .await?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub async fn delete_expired(
        &self,
        queries: &Queries,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let sql = queries.delete_expired.clone();
        run_detached(&self.client, move |client| {
            Box::pin(async move {
                let done = client.execute(sql.as_str(), &[&now]).await.map_err(map_error)?;
                Ok::<_, StoreError>(done.total())
            })
        })
        .await
    }

    /// Waits for any exchange still in flight, then closes the connection
    pub async fn close(&self) -> Result<(), StoreError> {
        if let Some(client) = self.client.lock().await.take() {
            client
                .close()
                .await
                .map_err(|e| StoreError::connection_with_source("failed to close MSSQL connection", e))?;
            debug!("MSSQL connection closed");
        }
        Ok(())
    }
}

/// Run `exchange` on a spawned task that owns the connection lock until the
/// exchange completes. Dropping the returned future detaches the task
/// instead of cancelling it.
async fn run_detached<C, T, F>(client: &Shared<C>, exchange: F) -> Result<T, StoreError>
where
    C: Send + 'static,
    T: Send + 'static,
    F: for<'c> FnOnce(&'c mut C) -> Exchange<'c, T> + Send + 'static,
{
    let client = Arc::clone(client);
    tokio::spawn(async move {
        let mut guard = client.lock_owned().await;
        let connection = guard.as_mut().ok_or(StoreError::Closed)?;
        exchange(connection).await
    })
    .await
    .map_err(|e| StoreError::query_with_source("MSSQL exchange task failed", e))?
}

async fn insert_in_transaction(
    client: &mut MssqlClient,
    queries: &Queries,
    secret: &StoredSecret,
) -> Result<StoredSecret, StoreError> {
    run_simple(client, "BEGIN TRANSACTION").await?;

    let result = async {
        client
            .execute(
                queries.insert.as_str(),
                &[&secret.id.as_str(), &secret.value.as_str(), &secret.expires_at],
            )
            .await
            .map_err(|e| map_insert_error(e, &secret.id))?;
        select(client, queries, &secret.id).await
    }
    .await;

    match result {
        Ok(stored) => {
            run_simple(client, "COMMIT TRANSACTION").await?;
            Ok(stored)
        }
        Err(e) => {
            if let Err(rollback) = run_simple(client, "ROLLBACK TRANSACTION").await {
                warn!(error = %rollback, "Failed to roll back MSSQL transaction");
            }
            Err(e)
        }
    }
}

async fn select(
    client: &mut MssqlClient,
    queries: &Queries,
    id: &str,
) -> Result<StoredSecret, StoreError> {
    let row = client
        .query(queries.select.as_str(), &[&id])
        .await
        .map_err(map_error)?
        .into_row()
        .await
        .map_err(map_error)?
        .ok_or(StoreError::NotFound)?;
    decode_row(&row)
}

async fn run_simple(client: &mut MssqlClient, sql: &str) -> Result<(), StoreError> {
    client.simple_query(sql).await.map_err(map_error)?.into_results().await.map_err(map_error)?;
    Ok(())
}

fn decode_row(row: &Row) -> Result<StoredSecret, StoreError> {
    let id: &str = row
        .try_get(0)
        .map_err(|e| StoreError::data(format!("bad ID column: {}", e)))?
        .ok_or_else(|| StoreError::data("ID is NULL"))?;
    let value: &str = row
        .try_get(1)
        .map_err(|e| StoreError::data(format!("bad Value column: {}", e)))?
        .ok_or_else(|| StoreError::data("Value is NULL"))?;
    let expires_at: DateTime<Utc> = row
        .try_get(2)
        .map_err(|e| StoreError::data(format!("bad ExpiresAt column: {}", e)))?
        .ok_or_else(|| StoreError::data("ExpiresAt is NULL"))?;
    Ok(StoredSecret::new(id, value, expires_at))
}

fn map_insert_error(error: tiberius::error::Error, id: &str) -> StoreError {
    match &error {
        tiberius::error::Error::Server(token)
            if token.code() == ERR_PRIMARY_KEY || token.code() == ERR_UNIQUE_INDEX =>
        {
            StoreError::conflict(id)
        }
        _ => map_error(error),
    }
}

fn map_error(error: tiberius::error::Error) -> StoreError {
    match error {
        tiberius::error::Error::Io { .. } => {
            StoreError::connection_with_source("MSSQL connection failed", error)
        }
        other => StoreError::query_with_source("MSSQL query failed", other),
    }
}
