//! Error types for the weft-db crate

use thiserror::Error;
use weft_net::NetError;
use weft_thread::ThreadId;

/// Result type alias using `DbError`
pub type Result<T> = std::result::Result<T, DbError>;

/// Errors that can occur in database operations
#[derive(Error, Debug)]
pub enum DbError {
    /// No database (or thread) for this ID; same for never-created and deleted IDs
    #[error("thread not found: {0}")]
    ThreadNotFound(ThreadId),

    /// A database is already open or persisted for this ID
    #[error("db already exists: {0}")]
    DbExists(ThreadId),

    /// Invalid database or collection name
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Collection already registered
    #[error("collection already exists: {0}")]
    CollectionExists(String),

    /// Collection not registered
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Schema is structurally invalid
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Document does not satisfy the collection schema
    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    /// Document is not a JSON object, or has an unusable `_id`
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Document ID already taken
    #[error("document already exists: {0}")]
    DocumentExists(String),

    /// Document ID not present
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// The context was canceled
    #[error("context canceled")]
    Canceled,

    /// The context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Database has been closed
    #[error("db is closed")]
    Closed,

    /// Manager has been closed
    #[error("manager is closed")]
    ManagerClosed,

    /// Storage error
    #[error("storage error: {0}")]
    Store(#[from] weft_store::StoreError),

    /// Network error
    #[error("network error: {0}")]
    Network(NetError),

    /// Identifier error
    #[error("thread error: {0}")]
    Thread(#[from] weft_thread::ThreadError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// Check if this is the "not found" error for a database
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::ThreadNotFound(_))
    }

    /// Check if this came from a canceled or expired context
    pub fn is_cancellation(&self) -> bool {
        matches!(self, DbError::Canceled | DbError::DeadlineExceeded)
    }
}

/// The network's not-found sentinel becomes the database not-found error
impl From<NetError> for DbError {
    fn from(err: NetError) -> Self {
        match err {
            NetError::ThreadNotFound(id) => DbError::ThreadNotFound(id),
            other => DbError::Network(other),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}
