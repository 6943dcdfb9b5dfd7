//! Atomic write batches

use crate::{Key, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single write inside a [`Batch`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    /// Set a key
    Put { key: Key, value: Bytes },
    /// Remove a key
    Delete { key: Key },
    /// Remove a key and everything below it
    DeletePrefix { prefix: Key },
}

/// Ordered list of writes committed together
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, key: Key, value: impl Into<Bytes>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key,
            value: value.into(),
        });
        self
    }

    /// Queue a put of a dag-cbor encoded value
    pub fn put_cbor<T: Serialize>(&mut self, key: Key, value: &T) -> Result<&mut Self> {
        let bytes = crate::encode_cbor(value)?;
        Ok(self.put(key, bytes))
    }

    /// Queue a delete
    pub fn delete(&mut self, key: Key) -> &mut Self {
        self.ops.push(BatchOp::Delete { key });
        self
    }

    /// Queue deletion of a key and all of its descendants
    pub fn delete_prefix(&mut self, prefix: Key) -> &mut Self {
        self.ops.push(BatchOp::DeletePrefix { prefix });
        self
    }

    /// Append all ops of another batch
    pub fn extend(&mut self, other: Batch) -> &mut Self {
        self.ops.extend(other.ops);
        self
    }

    /// Number of queued ops
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no ops
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Get the queued ops
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Take the queued ops
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

impl From<Vec<BatchOp>> for Batch {
    fn from(ops: Vec<BatchOp>) -> Self {
        Self { ops }
    }
}

/// Apply ops in order. Infallible, so callers holding the map lock get atomicity.
pub(crate) fn apply(map: &mut BTreeMap<Key, Bytes>, ops: impl IntoIterator<Item = BatchOp>) {
    for op in ops {
        match op {
            BatchOp::Put { key, value } => {
                map.insert(key, value);
            }
            BatchOp::Delete { key } => {
                map.remove(&key);
            }
            BatchOp::DeletePrefix { prefix } => {
                let doomed: Vec<Key> = descendants(map, &prefix).map(|(k, _)| k.clone()).collect();
                for key in doomed {
                    map.remove(&key);
                }
                map.remove(&prefix);
            }
        }
    }
}

/// Entries strictly below `prefix`, in key order
pub(crate) fn descendants<'a>(
    map: &'a BTreeMap<Key, Bytes>,
    prefix: &Key,
) -> impl Iterator<Item = (&'a Key, &'a Bytes)> + 'a {
    let start = prefix.descendant_prefix();
    map.range(Key::unchecked(start.clone())..)
        .take_while(move |(k, _)| k.as_str().starts_with(&start))
        .filter(|(k, _)| !k.is_root())
}
