//! # Weft Net
//!
//! The thread network contract used by the Weft database manager, and a
//! single-node implementation of it.
//!
//! ## Features
//!
//! - **Thread lifecycle**: create, look up, pull and delete threads by ID
//! - **Signed logs**: every node appends ed25519-signed records to its own log
//! - **Persistence**: thread keys, logs and records live in any `Datastore`
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use weft_net::{LocalNetwork, NetConfig, Network, NewThreadOptions};
//! use weft_store::MemoryDatastore;
//! use weft_thread::ThreadId;
//!
//! let net = LocalNetwork::new(Arc::new(MemoryDatastore::new()), NetConfig::default());
//! let id = ThreadId::new_random();
//! let info = net.create_thread(&id, NewThreadOptions::default()).await?;
//! net.create_record(&id, "hello".into()).await?;
//! ```

mod config;
mod error;
mod local;
mod lock;
mod logstore;
mod record;

pub use config::NetConfig;
pub use error::{NetError, Result};
pub use local::LocalNetwork;
pub use lock::{KeyedGuard, KeyedLock};
pub use logstore::Logstore;
pub use record::{Record, DAG_CBOR};

use async_trait::async_trait;
use bytes::Bytes;
use weft_thread::{LogId, SigningKey, ThreadAddr, ThreadId, ThreadInfo, ThreadKey};

/// Options for [`Network::create_thread`]
#[derive(Clone, Debug, Default)]
pub struct NewThreadOptions {
    /// Thread key to use instead of a generated one
    pub thread_key: Option<ThreadKey>,
    /// Log key to use instead of a generated one
    pub log_key: Option<SigningKey>,
}

impl NewThreadOptions {
    /// Use the given thread key
    pub fn with_thread_key(mut self, key: ThreadKey) -> Self {
        self.thread_key = Some(key);
        self
    }

    /// Use the given log key
    pub fn with_log_key(mut self, key: SigningKey) -> Self {
        self.log_key = Some(key);
        self
    }
}

/// Trait for thread networks
#[async_trait]
pub trait Network: Send + Sync {
    /// Create a thread with an own log; fails with `ThreadExists` if known
    async fn create_thread(&self, id: &ThreadId, opts: NewThreadOptions) -> Result<ThreadInfo>;

    /// Get thread info; fails with `ThreadNotFound` if unknown
    async fn get_thread(&self, id: &ThreadId) -> Result<ThreadInfo>;

    /// Bring the thread's logs up to date
    async fn pull_thread(&self, id: &ThreadId) -> Result<()>;

    /// Remove the thread and all of its logs
    async fn delete_thread(&self, id: &ThreadId) -> Result<()>;

    /// Addresses the thread can be joined at
    async fn thread_addrs(&self, id: &ThreadId) -> Result<Vec<ThreadAddr>>;

    /// Append a record to this node's own log in the thread
    async fn create_record(&self, id: &ThreadId, body: Bytes) -> Result<Record>;

    /// Records of one log, newest first
    async fn records(&self, id: &ThreadId, log: &LogId) -> Result<Vec<Record>>;

    /// Stop serving; later calls fail with `Closed`
    async fn close(&self) -> Result<()>;
}
