//! # Services
//!
//! Business logic for burn-after-reading secrets: random generation,
//! authenticated encryption and the secret lifecycle.

pub mod generator;
pub mod secret_cipher;
pub mod secret_service;

pub use generator::{generate, GenerateOptions};
pub use secret_cipher::{CipherError, SecretCipher, SecretKey};
pub use secret_service::{
    CreatedSecret, DeleteOptions, GetOptions, NewSecret, Secret, SecretService,
};
