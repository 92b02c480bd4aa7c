//! # Validation Module
//!
//! Pure checks on what callers submit: secret values, passphrases and
//! expiry times. Every rejection is a distinct [`ValidationError`] variant so
//! callers can map them without parsing messages.

pub mod content;
pub mod secret;

pub use content::{decode_any, sniff, ContentKind};
pub use secret::{expiration_time, valid_passphrase, valid_value, ExpiryBounds};

use thiserror::Error;

/// Reasons a secret, passphrase or expiry is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("value must not be empty")]
    EmptyValue,

    #[error("value exceeds the maximum of {max} characters")]
    ValueTooLong { max: usize },

    #[error("value must be valid UTF-8 text or encoded binary data")]
    InvalidValue,

    #[error("passphrase must be at least {min} characters")]
    PassphraseTooShort { min: usize },

    #[error("passphrase must be at most {max} characters")]
    PassphraseTooLong { max: usize },

    #[error("passphrase must be valid UTF-8 text")]
    PassphraseInvalid,

    #[error("expiration time must be in the future")]
    ExpirationInPast,

    #[error("expiration time must be between {min_seconds}s and {max_seconds}s from now")]
    ExpirationOutOfRange { min_seconds: i64, max_seconds: i64 },
}

impl ValidationError {
    /// Which input the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyValue | Self::ValueTooLong { .. } | Self::InvalidValue => "value",
            Self::PassphraseTooShort { .. }
            | Self::PassphraseTooLong { .. }
            | Self::PassphraseInvalid => "passphrase",
            Self::ExpirationInPast | Self::ExpirationOutOfRange { .. } => "expiresAt",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names() {
        assert_eq!(ValidationError::EmptyValue.field(), "value");
        assert_eq!(ValidationError::PassphraseInvalid.field(), "passphrase");
        assert_eq!(ValidationError::ExpirationInPast.field(), "expiresAt");
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ValidationError::ValueTooLong { max: 4000 }.to_string(),
            "value exceeds the maximum of 4000 characters"
        );
        assert_eq!(
            ValidationError::ExpirationOutOfRange { min_seconds: 55, max_seconds: 604805 }
                .to_string(),
            "expiration time must be between 55s and 604805s from now"
        );
    }
}
