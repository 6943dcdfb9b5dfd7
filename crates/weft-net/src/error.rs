//! Network error types

use thiserror::Error;
use weft_thread::ThreadId;

/// Result type alias
pub type Result<T> = std::result::Result<T, NetError>;

/// Network errors
#[derive(Error, Debug)]
pub enum NetError {
    /// Thread is not known to this node
    #[error("thread not found: {0}")]
    ThreadNotFound(ThreadId),

    /// Thread was already created
    #[error("thread already exists: {0}")]
    ThreadExists(ThreadId),

    /// Log is not part of the thread
    #[error("log not found: {0}")]
    LogNotFound(String),

    /// This node cannot author records on the thread
    #[error("no own log in thread {0}")]
    NoOwnLog(ThreadId),

    /// Record failed decoding or signature verification
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network has been closed
    #[error("network is closed")]
    Closed,

    /// Storage error
    #[error("storage error: {0}")]
    Store(#[from] weft_store::StoreError),

    /// Identifier or key error
    #[error("thread error: {0}")]
    Thread(#[from] weft_thread::ThreadError),
}

impl NetError {
    /// Check if this is the "thread not found" sentinel
    pub fn is_not_found(&self) -> bool {
        matches!(self, NetError::ThreadNotFound(_))
    }
}
