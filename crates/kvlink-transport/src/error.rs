use crate::request::Method;

/// Errors raised when a remote call cannot be completed.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, reset, ...).
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote answered with a non-success status.
    #[error("{method} {url} returned status {status}")]
    Status {
        method: Method,
        url: String,
        status: u16,
    },

    /// The response body could not be read as text.
    #[error("failed to read response body: {0}")]
    Body(String),

    /// The request URL does not belong to this transport.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The transport could not be constructed.
    #[error("transport setup failed: {0}")]
    Setup(String),
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
