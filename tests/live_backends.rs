//! Tests against running MSSQL, MongoDB and Redis servers.
//!
//! Run with `cargo test --features integration-tests`. Each test reads its
//! connection string from the environment and is skipped when it is unset:
//!
//! - `BURNIT_TEST_MSSQL`: ADO.NET connection string
//! - `BURNIT_TEST_MONGODB`: MongoDB URI
//! - `BURNIT_TEST_REDIS`: Redis URL

#![cfg(feature = "integration-tests")]

mod common;

use burnit::config::{MongoConfig, MssqlConfig, RedisConfig, ServiceConfig};
use burnit::storage::{MongoStore, RedisStore, SqlStore};
use burnit::utils::system_clock;
use burnit::{BurnitError, GetOptions, NewSecret, SecretService, SecretStore, StoreKind};
use std::sync::Arc;
use std::time::Duration;

fn env(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => {
            eprintln!("{} not set, skipping", name);
            None
        }
    }
}

async fn check_service(store: Arc<dyn SecretStore>) {
    let service = SecretService::new(store, system_clock(), ServiceConfig::default());

    let created = service.create(NewSecret::new("live").with_passphrase("pass")).await.unwrap();
    assert!(matches!(
        service.get(&created.id, "wrong", GetOptions::default()).await,
        Err(BurnitError::InvalidPassphrase)
    ));
    let secret = service.get(&created.id, "pass", GetOptions::default()).await.unwrap();
    assert_eq!(secret.value.as_deref(), Some("live"));
    assert!(matches!(
        service.get(&created.id, "pass", GetOptions::default()).await,
        Err(BurnitError::NotFound)
    ));

    service.close().await.unwrap();
}

#[tokio::test]
async fn test_mssql_store() {
    let Some(connection_string) = env("BURNIT_TEST_MSSQL") else { return };
    let config = MssqlConfig {
        connection_string,
        table: Some("BurnitTestSecrets".to_string()),
        ..Default::default()
    };

    let store = SqlStore::mssql(&config, system_clock()).await.unwrap();
    assert_eq!(store.kind(), StoreKind::Mssql);
    common::check_store_contract(&store).await;
    check_service(Arc::new(store)).await;
}

#[tokio::test]
async fn test_mssql_abandoned_create_leaves_connection_usable() {
    let Some(connection_string) = env("BURNIT_TEST_MSSQL") else { return };
    let config = MssqlConfig {
        connection_string,
        table: Some("BurnitTestSecrets".to_string()),
        ..Default::default()
    };
    let store = SqlStore::mssql(&config, system_clock()).await.unwrap();

    let id = common::unique_id("abandoned");
    let secret =
        burnit::StoredSecret::new(id.clone(), "c", chrono::Utc::now() + chrono::Duration::hours(1));
    // Give up almost immediately, usually mid-transaction
    let _ = tokio::time::timeout(Duration::from_micros(50), store.create(secret)).await;

    // The abandoned insert either committed in full or not at all
    match store.get(&id).await {
        Ok(stored) => assert_eq!(stored.value, "c"),
        Err(e) => assert!(matches!(e, burnit::StoreError::NotFound), "unexpected error: {}", e),
    }
    common::check_store_contract(&store).await;
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_mongodb_store() {
    let Some(uri) = env("BURNIT_TEST_MONGODB") else { return };
    let config = MongoConfig {
        uri,
        database: "burnit_test".to_string(),
        ..Default::default()
    };

    let store = MongoStore::connect(&config, system_clock()).await.unwrap();
    common::check_store_contract(&store).await;

    let duplicate = burnit::StoredSecret::new(
        common::unique_id("dup"),
        "c",
        chrono::Utc::now() + chrono::Duration::hours(1),
    );
    store.create(duplicate.clone()).await.unwrap();
    assert!(matches!(
        store.create(duplicate).await,
        Err(burnit::StoreError::Conflict { .. })
    ));

    check_service(Arc::new(store)).await;
}

#[tokio::test]
async fn test_redis_store() {
    let Some(url) = env("BURNIT_TEST_REDIS") else { return };
    let config = RedisConfig { url, key_prefix: "burnit-test".to_string(), ..Default::default() };

    let store = RedisStore::connect(&config, system_clock()).await.unwrap();
    common::check_store_contract(&store).await;
    assert_eq!(store.delete_expired().await.unwrap(), 0);

    // Redis evicts the key on its own once the TTL passes
    let id = common::unique_id("ttl");
    let expires_at = chrono::Utc::now() + chrono::Duration::milliseconds(1500);
    store.create(burnit::StoredSecret::new(id.clone(), "c", expires_at)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(matches!(store.get(&id).await, Err(burnit::StoreError::NotFound)));

    check_service(Arc::new(store)).await;
}
