//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("no eligible record: {0}")]
    NoEligibleRecord(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("batch failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Core(#[from] brokernode_core::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl MetadataError {
    /// Build an `InvalidStateTransition` from two statuses.
    pub fn transition<S: std::fmt::Display>(from: S, to: S) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
