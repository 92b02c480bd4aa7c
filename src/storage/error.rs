//! Storage error types
//!
//! Every store maps its driver errors into [`StoreError`] so the service can
//! tell "no such secret" apart from a genuine backend failure without caring
//! which database sits underneath.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by [`SecretStore`](super::SecretStore) implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// No secret exists under the requested id
    #[error("secret not found")]
    NotFound,

    /// A secret with the same id already exists
    #[error("secret '{id}' already exists")]
    Conflict { id: String },

    /// The store has been closed
    #[error("store is closed")]
    Closed,

    /// Connecting to or talking with the backend failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The backend rejected or failed a query
    #[error("query error: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A stored record could not be decoded
    #[error("invalid stored data: {message}")]
    Data { message: String },
}

impl StoreError {
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    pub fn connection_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection { message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn query<S: Into<String>>(message: S) -> Self {
        Self::Query { message: message.into(), source: None }
    }

    pub fn query_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Query { message: message.into(), source: Some(Box::new(source)) }
    }

    pub fn data<S: Into<String>>(message: S) -> Self {
        Self::Data { message: message.into() }
    }

    pub fn conflict<S: Into<String>>(id: S) -> Self {
        Self::Conflict { id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether the failure is transport-level and might succeed on a later
    /// attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}
