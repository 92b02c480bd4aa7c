//! # Burnit
//!
//! Burn-after-reading secret storage. A secret is encrypted with a key
//! derived from its passphrase, stored with an expiry, and deleted the first
//! time it is successfully read.
//!
//! ## Architecture
//!
//! ```text
//! CLI / embedding app → SecretService → SecretStore (memory | SQL | MongoDB | Redis)
//!                           ↓
//!               validation · cipher · cleanup task
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use burnit::{AppConfig, GetOptions, NewSecret, Result, SecretService};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let service = SecretService::from_config(&config).await?;
//!
//!     let created = service.create(NewSecret::new("hunter2")).await?;
//!     let secret = service.get(&created.id, &created.passphrase, GetOptions::default()).await?;
//!     assert_eq!(secret.value.as_deref(), Some("hunter2"));
//!
//!     service.close().await
//! }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod services;
pub mod storage;
pub mod utils;
pub mod validation;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{BurnitError, Result};
pub use services::{
    CreatedSecret, DeleteOptions, GenerateOptions, GetOptions, NewSecret, Secret, SecretService,
};
pub use storage::{create_store, SecretStore, StoreError, StoreKind, StoredSecret};
pub use utils::{Clock, ManualClock, SharedClock, SystemClock};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "burnit");
    }
}
