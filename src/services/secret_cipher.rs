//! Passphrase-keyed secret encryption using AES-256-GCM
//!
//! The key is the SHA-256 digest of the passphrase. Each encryption draws a
//! fresh 96-bit nonce, and the stored form is
//! `base64(nonce || ciphertext || tag)` using the standard padded alphabet.
//!
//! ## Pre-hashed passphrases
//!
//! Links that carry the passphrase can carry the key instead: the digest
//! encoded as unpadded URL-safe base64 (43 characters). [`SecretKey::from_hashed`]
//! turns that back into a key.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use tracing::{debug, error, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of AES-256-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of AES-256-GCM tag in bytes
pub const TAG_SIZE: usize = 16;

/// Size of the derived key in bytes
pub const KEY_SIZE: usize = 32;

/// URL-safe alphabet, emitted without padding, accepted with or without it
const HASH_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Cipher failures
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// Wrong key, or the ciphertext was tampered with
    #[error("invalid key")]
    InvalidKey,

    /// The stored text is not a valid nonce-prefixed ciphertext
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// The platform failed to produce randomness or seal the payload
    #[error("encryption failed: {0}")]
    Encryption(String),
}

/// 256-bit key derived from a passphrase. Wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Derive a key as the SHA-256 digest of `passphrase`
    pub fn derive(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&digest);
        Self(key)
    }

    /// Decode a key previously rendered with [`SecretKey::to_hashed`].
    ///
    /// Anything that does not decode to exactly 32 bytes is an invalid key.
    pub fn from_hashed(hashed: &str) -> Result<Self, CipherError> {
        let mut bytes = HASH_ENGINE.decode(hashed.trim()).map_err(|_| CipherError::InvalidKey)?;
        if bytes.len() != KEY_SIZE {
            bytes.zeroize();
            return Err(CipherError::InvalidKey);
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(key))
    }

    /// Derive from a plain passphrase, or decode a pre-hashed one
    pub fn from_passphrase(passphrase: &str, hashed: bool) -> Result<Self, CipherError> {
        if hashed {
            Self::from_hashed(passphrase)
        } else {
            Ok(Self::derive(passphrase))
        }
    }

    /// Unpadded URL-safe base64 of the key
    pub fn to_hashed(&self) -> String {
        HASH_ENGINE.encode(self.0)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Single-use nonce sequence for AES-GCM
struct SingleNonce {
    nonce: Option<[u8; NONCE_SIZE]>,
}

impl SingleNonce {
    fn new(nonce_bytes: [u8; NONCE_SIZE]) -> Self {
        Self { nonce: Some(nonce_bytes) }
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.nonce.take().map(Nonce::assume_unique_for_key).ok_or(ring::error::Unspecified)
    }
}

/// Stateless apart from its random source; cheap to clone.
#[derive(Clone)]
pub struct SecretCipher {
    rng: SystemRandom,
}

impl Default for SecretCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretCipher {
    pub fn new() -> Self {
        Self { rng: SystemRandom::new() }
    }

    /// Encrypt `plaintext` with a key derived from `passphrase`
    pub fn encrypt_with_passphrase(
        &self,
        plaintext: &[u8],
        passphrase: &str,
    ) -> Result<String, CipherError> {
        self.encrypt(plaintext, &SecretKey::derive(passphrase))
    }

    /// Encrypt and frame as `base64(nonce || ciphertext || tag)`
    #[instrument(skip(self, plaintext, key), fields(plaintext_len = plaintext.len()))]
    pub fn encrypt(&self, plaintext: &[u8], key: &SecretKey) -> Result<String, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng.fill(&mut nonce_bytes).map_err(|_| {
            error!("Failed to generate random nonce");
            CipherError::Encryption("failed to generate random nonce".to_string())
        })?;

        let unbound_key = UnboundKey::new(&AES_256_GCM, key.as_bytes()).map_err(|_| {
            error!("Failed to create encryption key");
            CipherError::Encryption("failed to create encryption key".to_string())
        })?;
        let mut sealing_key = aead::SealingKey::new(unbound_key, SingleNonce::new(nonce_bytes));

        let mut framed = Vec::with_capacity(NONCE_SIZE + plaintext.len() + TAG_SIZE);
        framed.extend_from_slice(&nonce_bytes);
        let mut sealed = plaintext.to_vec();
        sealed.reserve(TAG_SIZE);

        sealing_key.seal_in_place_append_tag(Aad::empty(), &mut sealed).map_err(|_| {
            error!("Encryption failed");
            CipherError::Encryption("failed to seal secret".to_string())
        })?;
        framed.extend_from_slice(&sealed);

        debug!(ciphertext_len = framed.len(), "Encrypted secret");
        Ok(STANDARD.encode(framed))
    }

    /// Decrypt a value produced by [`SecretCipher::encrypt`].
    ///
    /// An authentication failure is reported as [`CipherError::InvalidKey`]
    /// whether the key is wrong or the ciphertext was altered.
    #[instrument(skip(self, ciphertext, key), fields(ciphertext_len = ciphertext.len()))]
    pub fn decrypt(&self, ciphertext: &str, key: &SecretKey) -> Result<Vec<u8>, CipherError> {
        let framed = STANDARD
            .decode(ciphertext)
            .map_err(|e| CipherError::Malformed(format!("invalid base64: {}", e)))?;

        if framed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::Malformed(format!(
                "ciphertext too short: {} bytes",
                framed.len()
            )));
        }

        let (nonce, sealed) = framed.split_at(NONCE_SIZE);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);

        let unbound_key = UnboundKey::new(&AES_256_GCM, key.as_bytes()).map_err(|_| {
            error!("Failed to create decryption key");
            CipherError::Encryption("failed to create decryption key".to_string())
        })?;
        let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(nonce_bytes));

        let mut buffer = sealed.to_vec();
        let plaintext = opening_key
            .open_in_place(Aad::empty(), &mut buffer)
            .map_err(|_| CipherError::InvalidKey)?;

        debug!(plaintext_len = plaintext.len(), "Decrypted secret");
        Ok(plaintext.to_vec())
    }
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = SecretCipher::new();
        let encrypted = cipher.encrypt_with_passphrase(b"hunter2", "correct horse").unwrap();

        let decrypted = cipher.decrypt(&encrypted, &SecretKey::derive("correct horse")).unwrap();
        assert_eq!(decrypted, b"hunter2");
    }

    #[test]
    fn test_output_framing() {
        let cipher = SecretCipher::new();
        let encrypted = cipher.encrypt_with_passphrase(b"abc", "pass").unwrap();

        let raw = STANDARD.decode(&encrypted).unwrap();
        assert_eq!(raw.len(), NONCE_SIZE + 3 + TAG_SIZE);
    }

    #[test]
    fn test_different_nonces_produce_different_ciphertext() {
        let cipher = SecretCipher::new();
        let first = cipher.encrypt_with_passphrase(b"same", "pass").unwrap();
        let second = cipher.encrypt_with_passphrase(b"same", "pass").unwrap();
        assert_ne!(first, second);

        let raw_first = STANDARD.decode(&first).unwrap();
        let raw_second = STANDARD.decode(&second).unwrap();
        assert_ne!(raw_first[..NONCE_SIZE], raw_second[..NONCE_SIZE]);
    }

    #[test]
    fn test_wrong_passphrase_is_invalid_key() {
        let cipher = SecretCipher::new();
        let encrypted = cipher.encrypt_with_passphrase(b"secret", "right").unwrap();

        let result = cipher.decrypt(&encrypted, &SecretKey::derive("wrong"));
        assert!(matches!(result, Err(CipherError::InvalidKey)));
    }

    #[test]
    fn test_tampered_ciphertext_is_invalid_key() {
        let cipher = SecretCipher::new();
        let encrypted = cipher.encrypt_with_passphrase(b"sensitive-data", "pass").unwrap();

        let mut raw = STANDARD.decode(&encrypted).unwrap();
        raw[NONCE_SIZE] ^= 0xFF;
        let tampered = STANDARD.encode(raw);

        let result = cipher.decrypt(&tampered, &SecretKey::derive("pass"));
        assert!(matches!(result, Err(CipherError::InvalidKey)));
    }

    #[test]
    fn test_malformed_input() {
        let cipher = SecretCipher::new();
        let key = SecretKey::derive("pass");

        assert!(matches!(cipher.decrypt("not base64!!", &key), Err(CipherError::Malformed(_))));
        let short = STANDARD.encode([0u8; NONCE_SIZE + TAG_SIZE - 1]);
        assert!(matches!(cipher.decrypt(&short, &key), Err(CipherError::Malformed(_))));
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = SecretCipher::new();
        let encrypted = cipher.encrypt_with_passphrase(b"", "pass").unwrap();
        let decrypted = cipher.decrypt(&encrypted, &SecretKey::derive("pass")).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_hashed_key_roundtrip() {
        let key = SecretKey::derive("passphrase");
        let hashed = key.to_hashed();
        assert_eq!(hashed.len(), 43);
        assert!(!hashed.contains('='));
        assert_eq!(SecretKey::from_hashed(&hashed).unwrap(), key);
        assert_eq!(SecretKey::from_hashed(&format!("{}=", hashed)).unwrap(), key);
    }

    #[test]
    fn test_hashed_key_decrypts() {
        let cipher = SecretCipher::new();
        let encrypted = cipher.encrypt_with_passphrase(b"value", "passphrase").unwrap();
        let hashed = SecretKey::derive("passphrase").to_hashed();

        let key = SecretKey::from_passphrase(&hashed, true).unwrap();
        assert_eq!(cipher.decrypt(&encrypted, &key).unwrap(), b"value");
    }

    #[test]
    fn test_invalid_hashed_key() {
        assert!(matches!(SecretKey::from_hashed("%%%"), Err(CipherError::InvalidKey)));
        assert!(matches!(SecretKey::from_hashed("c2hvcnQ"), Err(CipherError::InvalidKey)));
    }

    #[test]
    fn test_known_digest() {
        // SHA-256("abc")
        let key = SecretKey::derive("abc");
        assert_eq!(
            hex::encode(key.as_bytes()),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SecretKey::derive("abc");
        assert_eq!(format!("{:?}", key), "SecretKey([REDACTED])");
    }

    proptest! {
        #[test]
        fn prop_roundtrip(value in ".{0,200}", passphrase in ".{1,64}") {
            let cipher = SecretCipher::new();
            let encrypted = cipher.encrypt_with_passphrase(value.as_bytes(), &passphrase).unwrap();
            let decrypted = cipher.decrypt(&encrypted, &SecretKey::derive(&passphrase)).unwrap();
            prop_assert_eq!(decrypted, value.as_bytes());
        }

        #[test]
        fn prop_other_passphrase_fails(value in ".{0,100}", first in "[a-z]{1,32}", second in "[A-Z]{1,32}") {
            let cipher = SecretCipher::new();
            let encrypted = cipher.encrypt_with_passphrase(value.as_bytes(), &first).unwrap();
            let result = cipher.decrypt(&encrypted, &SecretKey::derive(&second));
            prop_assert!(matches!(result, Err(CipherError::InvalidKey)));
        }
    }
}
