//! Secret lifecycle service
//!
//! Orchestrates validation, encryption and storage of burn-after-reading
//! secrets:
//!
//! - `create` validates the value, fixes the expiry, encrypts with the
//!   caller's passphrase (or a generated one) and stores the ciphertext.
//! - `get` re-checks expiry, decrypts, and deletes the secret on success. A
//!   wrong passphrase leaves the secret untouched.
//! - `cleanup` starts a background task that periodically removes expired
//!   secrets and reports failures on a channel.
//!
//! Every create/get/delete runs under the configured timeout.

use crate::config::{AppConfig, ServiceConfig};
use crate::errors::{BurnitError, Result};
use crate::services::generator::{self, GenerateOptions};
use crate::services::secret_cipher::{CipherError, SecretCipher, SecretKey};
use crate::storage::{create_store, SecretStore, StoreError, StoredSecret};
use crate::utils::{generate_id, system_clock, SharedClock};
use crate::validation::{expiration_time, valid_passphrase, valid_value, ExpiryBounds};
use chrono::{DateTime, Duration as ChronoDuration, SubsecRound, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// A secret to be stored
#[derive(Clone, Default)]
pub struct NewSecret {
    pub value: String,
    /// Generated when absent
    pub passphrase: Option<String>,
    pub ttl: Option<Duration>,
    /// Takes precedence over `ttl`
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewSecret {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self { value: value.into(), ..Default::default() }
    }

    pub fn with_passphrase<S: Into<String>>(mut self, passphrase: S) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

impl std::fmt::Debug for NewSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewSecret")
            .field("value", &"[REDACTED]")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("ttl", &self.ttl)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a successful create. The passphrase is never available again.
#[derive(Clone)]
pub struct CreatedSecret {
    pub id: String,
    pub passphrase: String,
    /// The passphrase's key, for links that should not carry the passphrase
    pub passphrase_hash: String,
    /// Remaining lifetime rounded to the nearest minute
    pub ttl: Duration,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for CreatedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedSecret")
            .field("id", &self.id)
            .field("passphrase", &"[REDACTED]")
            .field("passphrase_hash", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A retrieved secret. `value` is `None` for existence checks.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    pub id: String,
    pub value: Option<String>,
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("value", &self.value.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Return the plaintext but keep the secret
    pub no_delete: bool,
    /// Only check that the secret exists; nothing is decrypted or deleted
    pub no_decrypt: bool,
    /// The passphrase is the pre-hashed key
    pub passphrase_hashed: bool,
}

#[derive(Clone, Default)]
pub struct DeleteOptions {
    pub passphrase: Option<String>,
    /// Only delete when the passphrase decrypts the secret
    pub verify_passphrase: bool,
    pub passphrase_hashed: bool,
}

impl DeleteOptions {
    /// Delete only if `passphrase` is correct
    pub fn verified<S: Into<String>>(passphrase: S) -> Self {
        Self { passphrase: Some(passphrase.into()), verify_passphrase: true, passphrase_hashed: false }
    }
}

impl std::fmt::Debug for DeleteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteOptions")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("verify_passphrase", &self.verify_passphrase)
            .field("passphrase_hashed", &self.passphrase_hashed)
            .finish()
    }
}

impl From<&ServiceConfig> for ExpiryBounds {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            min_ttl: ChronoDuration::seconds(config.min_ttl_seconds as i64),
            max_ttl: ChronoDuration::seconds(config.max_ttl_seconds as i64),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct CleanupTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// The secret service. Share it behind an `Arc`.
#[derive(Debug)]
pub struct SecretService {
    store: Arc<dyn SecretStore>,
    clock: SharedClock,
    cipher: SecretCipher,
    config: ServiceConfig,
    bounds: ExpiryBounds,
    cleanup: Mutex<Option<CleanupTask>>,
    closed: AtomicBool,
}

impl SecretService {
    pub fn new(store: Arc<dyn SecretStore>, clock: SharedClock, config: ServiceConfig) -> Self {
        let bounds = ExpiryBounds::from(&config);
        Self {
            store,
            clock,
            cipher: SecretCipher::new(),
            config,
            bounds,
            cleanup: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Connect to the configured store and build a service on the system
    /// clock
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let clock = system_clock();
        let store = create_store(&config.store, Arc::clone(&clock))
            .await
            .map_err(|e| BurnitError::store("connect", e))?;

        info!(
            backend = %store.kind(),
            timeout_ms = config.service.timeout().as_millis() as u64,
            cleanup_interval_ms = config.service.cleanup_interval().as_millis() as u64,
            "Secret service initialized"
        );

        Ok(Self::new(store, clock, config.service.clone()))
    }

    pub fn store(&self) -> &Arc<dyn SecretStore> {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Generate a random string
    pub fn generate(&self, options: GenerateOptions) -> String {
        generator::generate(options)
    }

    /// Store a new secret
    #[instrument(skip(self, secret), name = "secret_create")]
    pub async fn create(&self, secret: NewSecret) -> Result<CreatedSecret> {
        self.with_timeout("create", self.create_inner(secret)).await
    }

    async fn create_inner(&self, secret: NewSecret) -> Result<CreatedSecret> {
        valid_value(&secret.value, self.config.max_value_characters)?;

        let now = self.clock.now();
        let expires_at =
            expiration_time(now, secret.ttl, secret.expires_at, &self.bounds)?.trunc_subsecs(3);

        let passphrase = match secret.passphrase {
            Some(passphrase) => {
                valid_passphrase(
                    &passphrase,
                    self.config.min_passphrase_characters,
                    self.config.max_passphrase_characters,
                )?;
                passphrase
            }
            None => generator::generate(GenerateOptions::passphrase()),
        };

        let key = SecretKey::derive(&passphrase);
        let encrypted = self.cipher.encrypt(secret.value.as_bytes(), &key).map_err(BurnitError::Cipher)?;

        let stored = self
            .store
            .create(StoredSecret::new(generate_id(), encrypted, expires_at))
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to store secret");
                BurnitError::store("create", e)
            })?;

        info!(secret_id = %stored.id, expires_at = %stored.expires_at, "Created secret");

        Ok(CreatedSecret {
            ttl: round_to_minute(stored.expires_at - self.clock.now()),
            passphrase_hash: key.to_hashed(),
            id: stored.id,
            passphrase,
            expires_at: stored.expires_at,
        })
    }

    /// Retrieve a secret, deleting it unless `options.no_delete` is set
    #[instrument(skip(self, passphrase), fields(secret_id = %id), name = "secret_get")]
    pub async fn get(&self, id: &str, passphrase: &str, options: GetOptions) -> Result<Secret> {
        self.with_timeout("get", self.get_inner(id, passphrase, options)).await
    }

    async fn get_inner(&self, id: &str, passphrase: &str, options: GetOptions) -> Result<Secret> {
        let stored = match self.store.get(id).await {
            Ok(stored) => stored,
            Err(StoreError::NotFound) => return Err(BurnitError::NotFound),
            Err(e) => return Err(BurnitError::store("get", e)),
        };

        if stored.is_expired(self.clock.now()) {
            debug!(secret_id = %id, "Secret has expired");
            match self.store.delete(id).await {
                Ok(()) | Err(StoreError::NotFound) => {}
                Err(e) => return Err(BurnitError::store("delete", e)),
            }
            return Err(BurnitError::NotFound);
        }

        if options.no_decrypt {
            return Ok(Secret { id: stored.id, value: None });
        }

        let key = SecretKey::from_passphrase(passphrase, options.passphrase_hashed)
            .map_err(|_| BurnitError::InvalidPassphrase)?;
        let plaintext = self.cipher.decrypt(&stored.value, &key).map_err(|e| match e {
            CipherError::InvalidKey => BurnitError::InvalidPassphrase,
            other => BurnitError::Cipher(other),
        })?;
        let value = String::from_utf8(plaintext).map_err(|_| {
            BurnitError::Cipher(CipherError::Malformed("decrypted value is not UTF-8".to_string()))
        })?;

        if !options.no_delete {
            match self.store.delete(id).await {
                Ok(()) => {}
                Err(StoreError::NotFound) => {
                    // Another reader deleted it first and owns the plaintext.
                    debug!(secret_id = %id, "Secret consumed concurrently");
                    return Err(BurnitError::NotFound);
                }
                Err(e) => return Err(BurnitError::store("delete", e)),
            }
            info!(secret_id = %id, "Secret read and deleted");
        }

        Ok(Secret { id: stored.id, value: Some(value) })
    }

    /// Delete a secret, optionally only after verifying its passphrase
    #[instrument(skip(self, options), fields(secret_id = %id, verify = options.verify_passphrase), name = "secret_delete")]
    pub async fn delete(&self, id: &str, options: DeleteOptions) -> Result<()> {
        self.with_timeout("delete", async {
            if options.verify_passphrase {
                let get_options =
                    GetOptions { passphrase_hashed: options.passphrase_hashed, ..Default::default() };
                let passphrase = options.passphrase.as_deref().unwrap_or_default();
                return self.get_inner(id, passphrase, get_options).await.map(|_| ());
            }

            match self.store.delete(id).await {
                Ok(()) => {
                    info!(secret_id = %id, "Deleted secret");
                    Ok(())
                }
                Err(StoreError::NotFound) => Err(BurnitError::NotFound),
                Err(e) => Err(BurnitError::store("delete", e)),
            }
        })
        .await
    }

    /// Remove all expired secrets once. Returns how many were removed.
    pub async fn delete_expired(&self) -> Result<u64> {
        sweep_expired(self.store.as_ref(), self.config.timeout()).await
    }

    /// Start the periodic cleanup task.
    ///
    /// Failed sweeps are sent on the returned channel and the task carries
    /// on. Only one task may run per service; it stops on [`close`](Self::close).
    pub fn cleanup(&self) -> Result<mpsc::UnboundedReceiver<BurnitError>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BurnitError::internal("secret service is closed"));
        }

        let mut guard = self
            .cleanup
            .lock()
            .map_err(|_| BurnitError::internal("cleanup state lock poisoned"))?;
        if guard.is_some() {
            return Err(BurnitError::internal("cleanup task is already running"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let store = Arc::clone(&self.store);
        let interval = self.config.cleanup_interval();
        let timeout = self.config.timeout();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "Started expired secret cleanup");

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = sweep_expired(store.as_ref(), timeout).await {
                            error!(error = %e, "Expired secret cleanup failed");
                            // The receiver may be gone; the task keeps sweeping regardless.
                            let _ = tx.send(e);
                        }
                    }
                }
            }

            info!("Stopped expired secret cleanup");
        });

        *guard = Some(CleanupTask { token, handle });
        Ok(rx)
    }

    /// Stop the cleanup task, wait for it, then close the store. Idempotent.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let task = self
            .cleanup
            .lock()
            .map_err(|_| BurnitError::internal("cleanup state lock poisoned"))?
            .take();

        if let Some(task) = task {
            task.token.cancel();
            task.handle
                .await
                .map_err(|e| BurnitError::internal(format!("cleanup task failed: {}", e)))?;
        }

        self.store.close().await.map_err(|e| BurnitError::store("close", e))?;
        info!("Secret service closed");
        Ok(())
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = timeout.as_millis() as u64, "Secret operation timed out");
                Err(BurnitError::timeout(operation, timeout.as_millis() as u64))
            }
        }
    }
}

impl Drop for SecretService {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.cleanup.lock() {
            if let Some(task) = guard.take() {
                task.token.cancel();
            }
        }
    }
}

async fn sweep_expired(store: &dyn SecretStore, timeout: Duration) -> Result<u64> {
    let span = crate::store_span!("delete_expired", backend = %store.kind());
    match tokio::time::timeout(timeout, store.delete_expired()).instrument(span).await {
        Ok(Ok(removed)) => {
            if removed > 0 {
                info!(removed, backend = %store.kind(), "Deleted expired secrets");
            }
            Ok(removed)
        }
        Ok(Err(e)) => Err(BurnitError::store("delete_expired", e)),
        Err(_) => Err(BurnitError::timeout("delete_expired", timeout.as_millis() as u64)),
    }
}

/// Round to the nearest whole minute; negative durations become zero
fn round_to_minute(duration: ChronoDuration) -> Duration {
    let millis = duration.num_milliseconds();
    if millis <= 0 {
        return Duration::ZERO;
    }
    let minutes = (millis + 30_000) / 60_000;
    Duration::from_secs(minutes as u64 * 60)
}
