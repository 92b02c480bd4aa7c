//! Random secret and passphrase generation

use rand::Rng;

/// Letters and digits used for every generated string
pub const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Added when special characters are requested
pub const SPECIAL_CHARSET: &[u8] = b"_-!?=()&%";

/// Length used when none is given
pub const DEFAULT_LENGTH: usize = 16;

/// Longer requests are truncated to this
pub const MAX_LENGTH: usize = 512;

/// Length of passphrases assigned to secrets created without one
pub const DEFAULT_PASSPHRASE_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Zero means [`DEFAULT_LENGTH`]
    pub length: usize,
    pub special_characters: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { length: DEFAULT_LENGTH, special_characters: false }
    }
}

impl GenerateOptions {
    pub fn new(length: usize, special_characters: bool) -> Self {
        Self { length, special_characters }
    }

    /// Options for an auto-assigned passphrase
    pub fn passphrase() -> Self {
        Self::new(DEFAULT_PASSPHRASE_LENGTH, true)
    }
}

/// Generate a random string.
///
/// Characters are drawn from the thread-local CSPRNG.
pub fn generate(options: GenerateOptions) -> String {
    let length = match options.length {
        0 => DEFAULT_LENGTH,
        n => n.min(MAX_LENGTH),
    };

    let mut chars = CHARSET.to_vec();
    if options.special_characters {
        chars.extend_from_slice(SPECIAL_CHARSET);
    }

    let mut rng = rand::thread_rng();
    (0..length).map(|_| chars[rng.gen_range(0..chars.len())] as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_length() {
        assert_eq!(generate(GenerateOptions::default()).len(), DEFAULT_LENGTH);
        assert_eq!(generate(GenerateOptions::new(0, false)).len(), DEFAULT_LENGTH);
    }

    #[test]
    fn test_length_is_capped() {
        assert_eq!(generate(GenerateOptions::new(10_000, true)).len(), MAX_LENGTH);
        assert_eq!(generate(GenerateOptions::new(512, false)).len(), 512);
        assert_eq!(generate(GenerateOptions::new(1, false)).len(), 1);
    }

    #[test]
    fn test_charset_without_specials() {
        let value = generate(GenerateOptions::new(512, false));
        assert!(value.bytes().all(|b| CHARSET.contains(&b)));
    }

    #[test]
    fn test_charset_with_specials() {
        let value = generate(GenerateOptions::new(512, true));
        assert!(value.bytes().all(|b| CHARSET.contains(&b) || SPECIAL_CHARSET.contains(&b)));
    }

    #[test]
    fn test_passphrase_options() {
        let passphrase = generate(GenerateOptions::passphrase());
        assert_eq!(passphrase.chars().count(), DEFAULT_PASSPHRASE_LENGTH);
    }

    #[test]
    fn test_values_differ() {
        let first = generate(GenerateOptions::new(32, true));
        let second = generate(GenerateOptions::new(32, true));
        assert_ne!(first, second);
    }
}
