//! MongoDB secret store
//!
//! One document per secret in a single collection, keyed by `_id`:
//!
//! ```json
//! { "_id": "<uuid>", "value": "<ciphertext>", "expiresAt": ISODate(...) }
//! ```
//!
//! BSON dates carry millisecond precision.

use super::{SecretStore, StoreError, StoreKind, StoredSecret};
use crate::config::MongoConfig;
use crate::utils::{sanitize_url, SharedClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, instrument};

/// Server code for a duplicate `_id`
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecretDocument {
    #[serde(rename = "_id")]
    id: String,
    value: String,
    #[serde(
        rename = "expiresAt",
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime"
    )]
    expires_at: DateTime<Utc>,
}

impl From<&StoredSecret> for SecretDocument {
    fn from(secret: &StoredSecret) -> Self {
        Self { id: secret.id.clone(), value: secret.value.clone(), expires_at: secret.expires_at }
    }
}

impl From<SecretDocument> for StoredSecret {
    fn from(document: SecretDocument) -> Self {
        StoredSecret::new(document.id, document.value, document.expires_at)
    }
}

#[derive(Debug)]
pub struct MongoStore {
    client: Client,
    secrets: Collection<SecretDocument>,
    clock: SharedClock,
    closed: AtomicBool,
}

impl MongoStore {
    /// Connect and verify the deployment answers a ping
    pub async fn connect(config: &MongoConfig, clock: SharedClock) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.uri).await.map_err(|e| {
            StoreError::connection_with_source(
                format!("invalid MongoDB URI: {}", sanitize_url(&config.uri)),
                e,
            )
        })?;
        options.connect_timeout = Some(config.connect_timeout());
        options.server_selection_timeout = Some(config.connect_timeout());
        options.app_name.get_or_insert_with(|| crate::APP_NAME.to_string());

        let client = Client::with_options(options)
            .map_err(|e| StoreError::connection_with_source("failed to create MongoDB client", e))?;

        client.database(&config.database).run_command(doc! { "ping": 1 }).await.map_err(|e| {
            error!(error = %e, uri = %sanitize_url(&config.uri), "MongoDB ping failed");
            map_error(e)
        })?;

        let secrets = client.database(&config.database).collection(&config.collection);

        info!(
            uri = %sanitize_url(&config.uri),
            database = %config.database,
            collection = %config.collection,
            "MongoDB secret store connected"
        );

        Ok(Self { client, secrets, clock, closed: AtomicBool::new(false) })
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MongoStore {
    fn kind(&self) -> StoreKind {
        StoreKind::MongoDb
    }

    #[instrument(skip(self), fields(secret_id = %id), name = "mongo_get_secret")]
    async fn get(&self, id: &str) -> Result<StoredSecret, StoreError> {
        self.ensure_open()?;
        self.secrets
            .find_one(doc! { "_id": id })
            .await
            .map_err(map_error)?
            .map(StoredSecret::from)
            .ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self, secret), fields(secret_id = %secret.id), name = "mongo_create_secret")]
    async fn create(&self, secret: StoredSecret) -> Result<StoredSecret, StoreError> {
        self.ensure_open()?;
        let result = self.secrets.insert_one(SecretDocument::from(&secret)).await.map_err(|e| {
            if is_duplicate_key(&e) {
                StoreError::conflict(&secret.id)
            } else {
                map_error(e)
            }
        })?;

        self.secrets
            .find_one(doc! { "_id": result.inserted_id })
            .await
            .map_err(map_error)?
            .map(StoredSecret::from)
            .ok_or_else(|| StoreError::data("inserted secret could not be read back"))
    }

    #[instrument(skip(self), fields(secret_id = %id), name = "mongo_delete_secret")]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let result = self.secrets.delete_one(doc! { "_id": id }).await.map_err(map_error)?;
        if result.deleted_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), name = "mongo_delete_expired")]
    async fn delete_expired(&self) -> Result<u64, StoreError> {
        self.ensure_open()?;
        let now = bson::DateTime::from_chrono(self.clock.now());
        let result = self
            .secrets
            .delete_many(doc! { "expiresAt": { "$lt": now } })
            .await
            .map_err(map_error)?;
        debug!(removed = result.deleted_count, "Swept expired secrets");
        Ok(result.deleted_count)
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.client.clone().shutdown().await;
        info!("MongoDB secret store closed");
        Ok(())
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

fn map_error(error: mongodb::error::Error) -> StoreError {
    match error.kind.as_ref() {
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } => {
            StoreError::connection_with_source("MongoDB connection failed", error)
        }
        ErrorKind::BsonDeserialization(_) => {
            StoreError::data(format!("malformed secret document: {}", error))
        }
        _ => StoreError::query_with_source("MongoDB operation failed", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound};

    #[test]
    fn test_document_shape() {
        let expires_at = Utc::now().trunc_subsecs(3) + Duration::hours(1);
        let secret = StoredSecret::new("abc", "c2VjcmV0", expires_at);

        let document = bson::to_document(&SecretDocument::from(&secret)).unwrap();
        assert_eq!(document.get_str("_id").unwrap(), "abc");
        assert_eq!(document.get_str("value").unwrap(), "c2VjcmV0");
        assert_eq!(document.get_datetime("expiresAt").unwrap().to_chrono(), expires_at);
    }

    #[test]
    fn test_document_roundtrip() {
        let expires_at = Utc::now().trunc_subsecs(3);
        let secret = StoredSecret::new("abc", "c2VjcmV0", expires_at);

        let document = bson::to_document(&SecretDocument::from(&secret)).unwrap();
        let decoded: SecretDocument = bson::from_document(document).unwrap();
        assert_eq!(StoredSecret::from(decoded), secret);
    }
}
