//! Error types for lemcache

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`LemmingCache`](crate::LemmingCache)
#[derive(Error, Debug)]
pub enum Error {
    /// Lemming could not be encoded as JSON
    #[error("failed to serialize lemming: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Stored bytes are not a valid lemming
    #[error("failed to deserialize lemming: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// The backing store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No lemming is stored under this name
    #[error("lemming not found: {0}")]
    NotFound(String),
}

/// Errors raised by [`KvStore`](crate::KvStore) backends
#[derive(Error, Debug)]
pub enum StoreError {
    /// The configured address is not a usable store address
    #[error("invalid store address {address:?}: {source}")]
    InvalidAddress {
        /// Address as given by the caller
        address: String,
        /// Client parse error
        #[source]
        source: redis::RedisError,
    },

    /// Error reported by the Redis client, passed through unchanged
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// The caller's deadline passed before the call was issued
    #[error("deadline exceeded before {op}")]
    DeadlineExceeded {
        /// Operation that was abandoned
        op: &'static str,
    },
}

impl StoreError {
    /// Whether the error came from a timeout, local or in the client
    pub fn is_timeout(&self) -> bool {
        match self {
            StoreError::DeadlineExceeded { .. } => true,
            StoreError::Redis(e) => e.is_timeout(),
            StoreError::InvalidAddress { .. } => false,
        }
    }
}

impl Error {
    /// Whether this is a missing-key error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
