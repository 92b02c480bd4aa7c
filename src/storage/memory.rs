//! In-memory secret store
//!
//! Keeps secrets in a `HashMap` behind an async reader/writer lock. Expired
//! secrets are removed with a full scan, which is fine for development and
//! single-process deployments but does not scale.

use super::{SecretStore, StoreError, StoreKind, StoredSecret};
use crate::utils::SharedClock;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct MemoryStore {
    secrets: Arc<RwLock<HashMap<String, StoredSecret>>>,
    clock: SharedClock,
    closed: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            secrets: Arc::new(RwLock::new(HashMap::new())),
            clock,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of secrets currently held, expired or not
    pub async fn len(&self) -> usize {
        self.secrets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.secrets.read().await.is_empty()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    #[instrument(skip(self), fields(secret_id = %id), name = "store_get")]
    async fn get(&self, id: &str) -> Result<StoredSecret, StoreError> {
        self.ensure_open()?;
        let secrets = self.secrets.read().await;
        secrets.get(id).cloned().ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self, secret), fields(secret_id = %secret.id), name = "store_create")]
    async fn create(&self, secret: StoredSecret) -> Result<StoredSecret, StoreError> {
        self.ensure_open()?;
        let mut secrets = self.secrets.write().await;
        if secrets.contains_key(&secret.id) {
            return Err(StoreError::conflict(secret.id));
        }
        secrets.insert(secret.id.clone(), secret.clone());
        Ok(secret)
    }

    #[instrument(skip(self), fields(secret_id = %id), name = "store_delete")]
    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut secrets = self.secrets.write().await;
        secrets.remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self), name = "store_delete_expired")]
    async fn delete_expired(&self) -> Result<u64, StoreError> {
        self.ensure_open()?;
        let now = self.clock.now();
        let mut secrets = self.secrets.write().await;
        let before = secrets.len();
        secrets.retain(|_, secret| !secret.is_expired(now));
        let removed = (before - secrets.len()) as u64;

        debug!(removed, "Swept expired secrets from memory");
        Ok(removed)
    }

    async fn close(&self) -> Result<(), StoreError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.secrets.write().await.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{Clock, ManualClock};
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn store_with_clock() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::starting_now();
        (MemoryStore::new(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (store, clock) = store_with_clock();
        let secret = StoredSecret::new("a", "cipher", clock.now() + Duration::hours(1));

        let created = store.create(secret.clone()).await.unwrap();
        assert_eq!(created, secret);
        assert_eq!(store.get("a").await.unwrap(), secret);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (store, _) = store_with_clock();
        assert!(matches!(store.get("missing").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let (store, clock) = store_with_clock();
        let secret = StoredSecret::new("a", "cipher", clock.now() + Duration::hours(1));
        store.create(secret.clone()).await.unwrap();

        assert!(matches!(store.create(secret).await, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, clock) = store_with_clock();
        store
            .create(StoredSecret::new("a", "cipher", clock.now() + Duration::hours(1)))
            .await
            .unwrap();

        assert_ok!(store.delete("a").await);
        assert_err!(store.get("a").await);
        assert!(matches!(store.delete("a").await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (store, clock) = store_with_clock();
        let now = clock.now();
        store.create(StoredSecret::new("short", "c", now + Duration::minutes(1))).await.unwrap();
        store.create(StoredSecret::new("long", "c", now + Duration::hours(1))).await.unwrap();

        assert_eq!(store.delete_expired().await.unwrap(), 0);

        clock.advance(Duration::minutes(2));
        assert_eq!(store.delete_expired().await.unwrap(), 1);
        assert!(matches!(store.get("short").await, Err(StoreError::NotFound)));
        assert!(store.get("long").await.is_ok());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (store, clock) = store_with_clock();
        store.create(StoredSecret::new("a", "c", clock.now() + Duration::hours(1))).await.unwrap();

        assert_ok!(store.close().await);
        assert_ok!(store.close().await);

        assert!(store.is_empty().await);
        assert!(matches!(store.get("a").await, Err(StoreError::Closed)));
        assert!(matches!(store.delete_expired().await, Err(StoreError::Closed)));
    }
}
