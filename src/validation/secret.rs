//! Secret value, passphrase and expiry checks

use super::content::{decode_any, is_null_byte, sniff, ContentKind};
use super::ValidationError;
use chrono::{DateTime, Duration, Utc};

/// Lifetime applied when neither a TTL nor an expiry time is given
pub const DEFAULT_TTL_SECONDS: i64 = 3600;

/// Allowed secret lifetimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryBounds {
    pub default_ttl: Duration,
    pub min_ttl: Duration,
    pub max_ttl: Duration,
}

impl Default for ExpiryBounds {
    fn default() -> Self {
        Self {
            default_ttl: Duration::seconds(DEFAULT_TTL_SECONDS),
            min_ttl: Duration::seconds(55),
            max_ttl: Duration::hours(168) + Duration::seconds(5),
        }
    }
}

impl ExpiryBounds {
    fn out_of_range(&self) -> ValidationError {
        ValidationError::ExpirationOutOfRange {
            min_seconds: self.min_ttl.num_seconds(),
            max_seconds: self.max_ttl.num_seconds(),
        }
    }
}

/// Check a secret value.
///
/// The value may be plain text or base32/base32hex/hex/base64-wrapped
/// binary data. Decoding only decides what gets inspected; the value itself
/// is stored unchanged.
pub fn valid_value(value: &str, max_characters: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyValue);
    }

    if value.chars().count() > max_characters {
        return Err(ValidationError::ValueTooLong { max: max_characters });
    }

    let acceptable = match decode_any(value) {
        Some(decoded) => {
            !is_null_byte(&decoded)
                && matches!(sniff(&decoded), ContentKind::Text | ContentKind::Binary)
        }
        None => is_text(value),
    };

    if !acceptable {
        return Err(ValidationError::InvalidValue);
    }
    Ok(())
}

/// Check a caller-supplied passphrase against character bounds
pub fn valid_passphrase(
    passphrase: &str,
    min_characters: usize,
    max_characters: usize,
) -> Result<(), ValidationError> {
    let characters = passphrase.chars().count();
    if characters < min_characters {
        return Err(ValidationError::PassphraseTooShort { min: min_characters });
    }
    if characters > max_characters {
        return Err(ValidationError::PassphraseTooLong { max: max_characters });
    }
    if !is_text(passphrase) {
        return Err(ValidationError::PassphraseInvalid);
    }
    Ok(())
}

fn is_text(value: &str) -> bool {
    !is_null_byte(value.as_bytes()) && sniff(value.as_bytes()) == ContentKind::Text
}

/// Work out when a new secret expires.
///
/// An explicit `expires_at` wins over `ttl` and must lie in the future. With
/// neither (or a zero TTL) the default lifetime applies. Anything else must
/// fall within `[now + min_ttl, now + max_ttl]`.
pub fn expiration_time(
    now: DateTime<Utc>,
    ttl: Option<std::time::Duration>,
    expires_at: Option<DateTime<Utc>>,
    bounds: &ExpiryBounds,
) -> Result<DateTime<Utc>, ValidationError> {
    let candidate = match (expires_at, ttl) {
        (Some(at), _) => {
            if at < now {
                return Err(ValidationError::ExpirationInPast);
            }
            at
        }
        (None, Some(ttl)) if !ttl.is_zero() => {
            let ttl = Duration::from_std(ttl).map_err(|_| bounds.out_of_range())?;
            now.checked_add_signed(ttl).ok_or_else(|| bounds.out_of_range())?
        }
        _ => return Ok(now + bounds.default_ttl),
    };

    if candidate < now + bounds.min_ttl || candidate > now + bounds.max_ttl {
        return Err(bounds.out_of_range());
    }

    Ok(candidate)
}
