//! Error types for outputs.

use thiserror::Error;

use crate::http_client::HttpClientPoolError;

/// Defines the possible errors that can occur while delivering to an output.
#[derive(Debug, Error)]
pub enum OutputError {
    /// An error related to invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The remote end rejected the delivery.
    #[error("Delivery failed: {0}")]
    NotifyFailed(String),

    /// The payload exceeds what the output accepts, even after truncation.
    #[error("Payload of {size} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge {
        /// Serialized size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The rendered fields could not be turned into the output's format.
    #[error("Failed to serialize payload: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A local script exited unsuccessfully.
    #[error("Script failed: {0}")]
    ExecFailed(String),

    /// An I/O error, e.g. spawning a script.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error originating from the HTTP client pool.
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] HttpClientPoolError),

    /// An error from the underlying `reqwest` or `reqwest_middleware`
    /// libraries.
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest_middleware::Error),
}

impl From<reqwest::Error> for OutputError {
    fn from(e: reqwest::Error) -> Self {
        OutputError::RequestError(reqwest_middleware::Error::Reqwest(e))
    }
}
