//! Error types for the query cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Query Error Enum ==
/// Errors raised synchronously by cache operations.
///
/// Fetch failures never surface here. They are stored on the entry as a
/// [`FetchError`] and reach consumers through their subscription.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The key could not be serialized into a non-empty JSON array
    #[error("Invalid query key: {0}")]
    InvalidKey(String),

    /// The canonical key exceeds the maximum length
    #[error("Query key exceeds maximum length of {max} bytes (got {len})")]
    KeyTooLong { len: usize, max: usize },

    /// The key is already cached with a different payload type
    #[error("Query key {key} is cached as {cached}, not {requested}")]
    TypeMismatch {
        key: String,
        cached: &'static str,
        requested: &'static str,
    },

    /// The entry was removed while a consumer was still waiting on it
    #[error("Query entry removed: {0}")]
    EntryRemoved(String),

    /// A fetch had to start but no Tokio runtime was running
    #[error("No Tokio runtime available to run the fetch for {0}")]
    NoRuntime(String),
}

// == Fetch Error ==
/// The failure of a fetch function, collapsed into an opaque message.
///
/// Network errors, non-success responses and decode failures all end up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The human-readable failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for FetchError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for FetchError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, QueryError>;
