//! In-memory datastore for testing and ephemeral nodes

use crate::batch::{apply, descendants};
use crate::{Batch, Datastore, Key, Result, StoreError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An in-memory datastore.
///
/// Clones share the same underlying map, so a clone handed to a second
/// manager sees everything the first one wrote.
#[derive(Clone, Default)]
pub struct MemoryDatastore {
    entries: Arc<RwLock<BTreeMap<Key, Bytes>>>,
}

impl MemoryDatastore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of entries stored
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get total size of all values
    pub fn total_size(&self) -> u64 {
        self.entries.read().values().map(|v| v.len() as u64).sum()
    }

    /// List all keys
    pub fn keys(&self) -> Vec<Key> {
        self.entries.read().keys().cloned().collect()
    }
}

impl std::fmt::Debug for MemoryDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatastore")
            .field("len", &self.len())
            .finish()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, key: &Key) -> Result<Bytes> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    async fn has(&self, key: &Key) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    async fn query(&self, prefix: &Key) -> Result<Vec<(Key, Bytes)>> {
        let entries = self.entries.read();
        Ok(descendants(&entries, prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn commit(&self, batch: Batch) -> Result<()> {
        apply(&mut self.entries.write(), batch.into_ops());
        Ok(())
    }

    async fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// The map is owned by every clone, so closing one handle is a no-op
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
