//! Cache error types.

use thiserror::Error;

/// Chunk cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to open namespace {namespace}: {source}")]
    Open {
        namespace: String,
        #[source]
        source: sled::Error,
    },

    #[error("cache store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("namespace {0} is still in use")]
    NamespaceBusy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;
