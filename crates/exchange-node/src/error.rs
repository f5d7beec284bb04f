//! Error types for the exchange node.

use exchange_core::MarketError;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur below the market engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Market rule refused the operation
    #[error(transparent)]
    Market(#[from] MarketError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Store and IO failures reach callers of market operations as `StoreFailure`.
impl From<Error> for MarketError {
    fn from(e: Error) -> Self {
        match e {
            Error::Market(inner) => inner,
            other => MarketError::StoreFailure(other.to_string()),
        }
    }
}
