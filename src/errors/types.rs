//! # Error Types
//!
//! Error taxonomy for the secret service using `thiserror`.

use crate::services::CipherError;
use crate::storage::StoreError;
use crate::validation::ValidationError;

/// Custom result type for burnit operations
pub type Result<T> = std::result::Result<T, BurnitError>;

/// Main error type for the secret service
#[derive(thiserror::Error, Debug)]
pub enum BurnitError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Rejected secret value, passphrase or expiry
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Secret is absent, expired or already read
    #[error("Secret not found")]
    NotFound,

    /// The passphrase did not decrypt the secret
    #[error("Invalid passphrase")]
    InvalidPassphrase,

    /// Storage backend failure
    #[error("Storage error during {operation}: {source}")]
    Store {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// Ciphertext could not be processed
    #[error("Cipher error: {0}")]
    Cipher(#[source] CipherError),

    /// Timeout errors
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Internal errors, e.g. lifecycle misuse
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BurnitError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Wrap a storage error with the operation that produced it
    pub fn store<S: Into<String>>(operation: S, source: StoreError) -> Self {
        Self::Store { operation: operation.into(), source }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            BurnitError::Config { .. } => 500,
            BurnitError::Validation(_) => 400,
            BurnitError::NotFound => 404,
            BurnitError::InvalidPassphrase => 401,
            BurnitError::Store { .. } => 500,
            BurnitError::Cipher(_) => 500,
            BurnitError::Timeout { .. } => 504,
            BurnitError::Internal { .. } => 500,
        }
    }

    /// Check if the caller may retry the operation
    pub fn is_retryable(&self) -> bool {
        match self {
            BurnitError::Timeout { .. } => true,
            BurnitError::Store { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

impl From<config::ConfigError> for BurnitError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for BurnitError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Invalid configuration: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_error_creation() {
        let error = BurnitError::config("Test configuration error");
        assert!(matches!(error, BurnitError::Config { .. }));
        assert_eq!(error.to_string(), "Configuration error: Test configuration error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BurnitError::Validation(ValidationError::EmptyValue).status_code(), 400);
        assert_eq!(BurnitError::InvalidPassphrase.status_code(), 401);
        assert_eq!(BurnitError::NotFound.status_code(), 404);
        assert_eq!(BurnitError::store("get", StoreError::Closed).status_code(), 500);
        assert_eq!(BurnitError::timeout("create", 10_000).status_code(), 504);
        assert_eq!(BurnitError::internal("test").status_code(), 500);
        assert_eq!(BurnitError::Cipher(CipherError::Malformed("short".into())).status_code(), 500);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(BurnitError::timeout("get", 1000).is_retryable());
        assert!(BurnitError::store("get", StoreError::connection("refused")).is_retryable());
        assert!(!BurnitError::store("get", StoreError::query("syntax")).is_retryable());
        assert!(!BurnitError::NotFound.is_retryable());
        assert!(!BurnitError::InvalidPassphrase.is_retryable());
    }

    #[test]
    fn test_store_error_keeps_operation() {
        let error = BurnitError::store("delete", StoreError::Closed);
        assert_eq!(error.to_string(), "Storage error during delete: store is closed");
    }

    #[test]
    fn test_validation_conversion() {
        let error: BurnitError = ValidationError::PassphraseTooShort { min: 4 }.into();
        assert!(matches!(
            error,
            BurnitError::Validation(ValidationError::PassphraseTooShort { min: 4 })
        ));
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(range(min = 1, message = "must be positive"))]
        count: u32,
    }

    #[test]
    fn test_validator_conversion() {
        let errors = Sample { count: 0 }.validate().unwrap_err();
        let error: BurnitError = errors.into();
        assert!(matches!(error, BurnitError::Config { .. }));
        assert!(error.to_string().contains("count: must be positive"));
    }
}
