//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid {kind} code: {value}")]
    InvalidStatus { kind: &'static str, value: i32 },

    #[error("key cipher error: {0}")]
    Cipher(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
