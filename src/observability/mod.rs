//! # Observability Infrastructure
//!
//! Structured logging for the secret service. Spans come from `#[instrument]`
//! on service and store operations.

pub mod logging;

pub use logging::{env_filter, init_logging, log_config_info};
