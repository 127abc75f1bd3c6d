//! Error types for the OpenKeyVal client

use thiserror::Error;

/// Errors that can occur while encoding values or talking to the service
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid request (empty key, empty batch)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Base URL or request URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// The service answered with a non-success status
    #[error("HTTP error (status {status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body returned with the status
        message: String,
    },

    /// TLS/SSL error
    #[error("TLS error: {0}")]
    Tls(String),

    /// Value could not be serialized to JSON
    #[error("Encoding error: {0}")]
    Encoding(#[source] serde_json::Error),

    /// Payload is not valid JSON for the requested type
    #[error("Decoding error: {0}")]
    Decoding(#[source] serde_json::Error),

    /// Payload could not be gzip-compressed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Payload is not valid Base64, gzip or UTF-16
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Blocking worker could not be started or stopped answering
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Returns true for failures of the HTTP round trip itself
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_)
                | Error::Connection(_)
                | Error::Timeout(_)
                | Error::Status { .. }
                | Error::Tls(_)
        )
    }

    /// Returns true when a stored payload did not match the expected shape
    /// or compression flag
    pub fn is_payload_mismatch(&self) -> bool {
        matches!(self, Error::Decoding(_) | Error::Decompression(_))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;
