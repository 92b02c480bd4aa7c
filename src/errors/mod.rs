//! # Error Handling
//!
//! Error types for the secret service. Storage, cipher and validation
//! failures have their own enums next to the code that raises them; this
//! module ties them together into [`BurnitError`].

pub mod types;

pub use types::{BurnitError, Result};
