use kvlink_transport::TransportError;

/// Errors surfaced by client operations.
///
/// None of these are recovered inside the client. Bulk operations stop at
/// the first failure and return it unchanged.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// An argument was rejected before any remote call was made.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// No endpoint could be resolved when building a client.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A remote call could not be completed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A stored value is not valid JSON.
    #[error("unable to parse value of {key:?}: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized for storage.
    #[error("unable to serialize value of {key:?}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The runtime backing a blocking client could not be started.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Result alias for client operations.
pub type KvResult<T> = Result<T, KvError>;

/// Reject empty keys before they reach the wire.
pub(crate) fn validate_key(key: &str) -> KvResult<()> {
    if key.is_empty() {
        return Err(KvError::Validation("key must be a non-empty string".into()));
    }
    Ok(())
}
