//! # Weft Store
//!
//! Key-value persistence layer for the Weft distributed database.
//!
//! This crate provides:
//! - **Keys**: hierarchical `/a/b/c` paths with prefix queries
//! - **Batches**: ordered writes that are applied atomically
//! - **Memory store**: a shared in-process store for tests and ephemeral nodes
//! - **File store**: an in-memory index backed by a checksummed append-only journal
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Manager / Logstore Layer         │
//! ├─────────────────────────────────────────┤
//! │            Datastore Trait              │
//! ├────────────────────┬────────────────────┤
//! │  MemoryDatastore   │   FileDatastore    │
//! ├────────────────────┴────────────────────┤
//! │                 Journal                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use weft_store::{Batch, Datastore, Key, MemoryDatastore};
//!
//! let store = MemoryDatastore::new();
//! let mut batch = Batch::new();
//! batch.put(Key::new("/db/x/meta"), b"meta".to_vec());
//! store.commit(batch).await?;
//! let entries = store.query(&Key::new("/db/x")).await?;
//! ```

pub mod batch;
pub mod error;
pub mod file;
pub mod key;
pub mod memory;

pub use batch::{Batch, BatchOp};
pub use error::{Result, StoreError};
pub use file::{FileDatastore, FileDatastoreConfig};
pub use key::Key;
pub use memory::MemoryDatastore;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

/// Trait for key-value storage backends
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Get a value; fails with [`StoreError::NotFound`] if absent
    async fn get(&self, key: &Key) -> Result<Bytes>;

    /// Check if a key exists
    async fn has(&self, key: &Key) -> Result<bool>;

    /// Set a single key
    async fn put(&self, key: &Key, value: Bytes) -> Result<()> {
        let mut batch = Batch::new();
        batch.put(key.clone(), value);
        self.commit(batch).await
    }

    /// Remove a single key (absent keys are not an error)
    async fn delete(&self, key: &Key) -> Result<()> {
        let mut batch = Batch::new();
        batch.delete(key.clone());
        self.commit(batch).await
    }

    /// All entries strictly below `prefix`, sorted by key
    async fn query(&self, prefix: &Key) -> Result<Vec<(Key, Bytes)>>;

    /// All keys strictly below `prefix`, sorted
    async fn query_keys(&self, prefix: &Key) -> Result<Vec<Key>> {
        Ok(self
            .query(prefix)
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Apply every op of the batch, or none of them
    async fn commit(&self, batch: Batch) -> Result<()>;

    /// Flush pending writes to durable storage
    async fn sync(&self) -> Result<()>;

    /// Release resources; later calls may fail with [`StoreError::Closed`]
    async fn close(&self) -> Result<()>;
}

/// Typed access to dag-cbor encoded values
#[async_trait]
pub trait DatastoreExt: Datastore {
    /// Get and decode a value
    async fn get_cbor<T: DeserializeOwned + Send>(&self, key: &Key) -> Result<T> {
        let bytes = self.get(key).await?;
        decode_cbor(&bytes)
    }

    /// Encode and put a value
    async fn put_cbor<T: Serialize + Sync>(&self, key: &Key, value: &T) -> Result<()> {
        let bytes = encode_cbor(value)?;
        self.put(key, bytes).await
    }
}

impl<D: Datastore + ?Sized> DatastoreExt for D {}

/// Encode a value as dag-cbor
pub fn encode_cbor<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_ipld_dagcbor::to_vec(value)?))
}

/// Decode a dag-cbor value
pub fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_ipld_dagcbor::from_slice(bytes)?)
}
