//! Error types for the ROILS pipeline.

use thiserror::Error;

/// Result type alias using the pipeline's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pipeline operations.
///
/// Only [`Error::Connection`] and [`Error::Store`] are fatal to a stage run.
/// Backend failures during a scan are reported as
/// [`crate::GenerationOutcome`] values or [`Error::Request`] and handled per
/// record.
#[derive(Error, Debug)]
pub enum Error {
    /// Store or backend unreachable at startup
    #[error("Connection error: {0}")]
    Connection(String),

    /// Record store command failed
    #[error("Store error: {0}")]
    Store(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Remote restart of the generation backend failed
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error should abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Store(_) | Error::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            Error::Connection(e.to_string())
        } else {
            Error::Store(e.to_string())
        }
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(e: crate::config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}
