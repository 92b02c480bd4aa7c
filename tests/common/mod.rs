//! Common test utilities for all integration tests.
//!
//! Provides service construction over the in-process backends and a shared
//! contract check that every [`SecretStore`] must pass.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

use burnit::config::{ServiceConfig, SqliteConfig};
use burnit::storage::{MemoryStore, SqlStore};
use burnit::{ManualClock, SecretService, SecretStore, StoreError, StoredSecret};
use chrono::{Duration, SubsecRound, Utc};
use std::sync::Arc;

/// A service over a fresh in-memory store, driven by a manual clock
pub fn memory_service() -> (SecretService, ManualClock) {
    let clock = ManualClock::starting_now();
    let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));
    (SecretService::new(store, Arc::new(clock.clone()), ServiceConfig::default()), clock)
}

/// A service over an in-memory SQLite database, driven by a manual clock
pub async fn sqlite_service() -> (SecretService, ManualClock) {
    let clock = ManualClock::starting_now();
    let config = SqliteConfig { url: "sqlite::memory:".to_string(), ..Default::default() };
    let store = SqlStore::sqlite(&config, Arc::new(clock.clone()))
        .await
        .expect("open in-memory SQLite store");
    (SecretService::new(Arc::new(store), Arc::new(clock.clone()), ServiceConfig::default()), clock)
}

/// Unique id so tests sharing a live server do not collide
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Exercise the persistence contract against a store whose data is shared
/// with nothing else under these ids.
pub async fn check_store_contract(store: &dyn SecretStore) {
    let expires_at = (Utc::now() + Duration::hours(1)).trunc_subsecs(3);
    let id = unique_id("contract");

    // Missing ids
    assert!(matches!(store.get(&id).await, Err(StoreError::NotFound)));
    assert!(matches!(store.delete(&id).await, Err(StoreError::NotFound)));

    // Create returns the stored record unchanged
    let secret = StoredSecret::new(id.clone(), "Y2lwaGVydGV4dA==", expires_at);
    let created = store.create(secret.clone()).await.expect("create secret");
    assert_eq!(created, secret);
    assert_eq!(store.get(&id).await.expect("get secret"), secret);

    // Delete is exactly-once
    store.delete(&id).await.expect("delete secret");
    assert!(matches!(store.get(&id).await, Err(StoreError::NotFound)));
    assert!(matches!(store.delete(&id).await, Err(StoreError::NotFound)));

    // Sweeping with nothing expired is not an error
    store.delete_expired().await.expect("sweep");
}
