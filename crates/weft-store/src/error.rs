//! Error types for the weft-store crate

use crate::Key;
use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during datastore operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Key not present
    #[error("key not found: {0}")]
    NotFound(Key),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Journal contents failed verification
    #[error("corrupt journal: {0}")]
    Corrupt(String),

    /// Store has been closed
    #[error("datastore is closed")]
    Closed,

    /// Malformed key string
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    /// Check if this is a missing-key error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl<E: std::fmt::Debug> From<serde_ipld_dagcbor::EncodeError<E>> for StoreError {
    fn from(err: serde_ipld_dagcbor::EncodeError<E>) -> Self {
        StoreError::Serialization(format!("{:?}", err))
    }
}

impl<E: std::fmt::Debug> From<serde_ipld_dagcbor::DecodeError<E>> for StoreError {
    fn from(err: serde_ipld_dagcbor::DecodeError<E>) -> Self {
        StoreError::Deserialization(format!("{:?}", err))
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Io(std::io::Error::other(err))
    }
}
