//! PostgreSQL secret store tests.
//!
//! Each test starts a fresh PostgreSQL container, so Docker must be
//! available. Run with `cargo test --features postgres_tests`.

#![cfg(feature = "postgres_tests")]

mod common;

use burnit::config::{PostgresConfig, ServiceConfig};
use burnit::storage::SqlStore;
use burnit::{BurnitError, GetOptions, ManualClock, NewSecret, SecretService, SecretStore, StoreKind};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

/// A PostgreSQL container plus a store connected to it. The container is
/// removed when this is dropped.
struct TestPostgres {
    store: SqlStore,
    clock: ManualClock,
    _container: ContainerAsync<Postgres>,
}

impl TestPostgres {
    async fn start() -> Self {
        let container =
            Postgres::default().start().await.expect("start PostgreSQL container");
        let host = container.get_host().await.expect("container host");
        let port = container.get_host_port_ipv4(5432).await.expect("container port");

        let config = PostgresConfig {
            url: format!("postgresql://postgres:postgres@{}:{}/postgres", host, port),
            max_connections: 5,
            ..Default::default()
        };
        let clock = ManualClock::starting_now();
        let store =
            SqlStore::postgres(&config, Arc::new(clock.clone())).await.expect("connect store");

        Self { store, clock, _container: container }
    }
}

#[tokio::test]
async fn test_postgres_store_contract() {
    let db = TestPostgres::start().await;
    assert_eq!(db.store.kind(), StoreKind::Postgres);
    common::check_store_contract(&db.store).await;
}

#[tokio::test]
async fn test_postgres_secret_lifecycle() {
    let db = TestPostgres::start().await;
    let clock = db.clock.clone();
    let service = SecretService::new(
        Arc::new(db.store),
        Arc::new(clock.clone()),
        ServiceConfig::default(),
    );

    let created = service.create(NewSecret::new("hunter2").with_passphrase("pg")).await.unwrap();
    assert!(matches!(
        service.get(&created.id, "wrong", GetOptions::default()).await,
        Err(BurnitError::InvalidPassphrase)
    ));
    let secret = service.get(&created.id, "pg", GetOptions::default()).await.unwrap();
    assert_eq!(secret.value.as_deref(), Some("hunter2"));
    assert!(matches!(
        service.get(&created.id, "pg", GetOptions::default()).await,
        Err(BurnitError::NotFound)
    ));

    service.create(NewSecret::new("a").with_ttl(Duration::from_secs(60))).await.unwrap();
    service.create(NewSecret::new("b").with_ttl(Duration::from_secs(3600))).await.unwrap();
    clock.advance(ChronoDuration::minutes(5));
    assert_eq!(service.delete_expired().await.unwrap(), 1);

    service.close().await.unwrap();
}
