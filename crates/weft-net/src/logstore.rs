//! Persistent thread metadata: keys, logs, heads and record blocks
//!
//! Layout under the datastore root:
//!
//! ```text
//! /thread/<id>/key              thread key bytes
//! /thread/<id>/log/<log id>     LogEntry (dag-cbor)
//! /thread/<id>/record/<cid>     record block (dag-cbor)
//! ```

use crate::{NetError, Record, Result};
use bytes::Bytes;
use cid::Cid;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use weft_store::{decode_cbor, Batch, Datastore, Key};
use weft_thread::{LogInfo, Multiaddr, ThreadId, ThreadInfo, ThreadKey};

const THREADS: &str = "thread";
const KEY: &str = "key";
const LOGS: &str = "log";
const RECORDS: &str = "record";

/// Stored form of a [`LogInfo`]
#[derive(Serialize, Deserialize)]
struct LogEntry {
    pub_key: Bytes,
    priv_key: Option<Bytes>,
    addrs: Vec<String>,
    head: Option<Bytes>,
    managed: bool,
}

impl LogEntry {
    fn from_info(log: &LogInfo) -> Self {
        Self {
            pub_key: Bytes::copy_from_slice(log.pub_key.as_bytes()),
            priv_key: log
                .priv_key
                .as_ref()
                .map(|key| Bytes::copy_from_slice(key.as_bytes())),
            addrs: log.addrs.iter().map(ToString::to_string).collect(),
            head: log.head.map(|cid| Bytes::from(cid.to_bytes())),
            managed: log.managed,
        }
    }

    fn into_info(self) -> Result<LogInfo> {
        let pub_key = VerifyingKey::from_bytes(&key_bytes(&self.pub_key)?)
            .map_err(|e| NetError::InvalidRecord(format!("log public key: {}", e)))?;
        let priv_key = match &self.priv_key {
            Some(bytes) => Some(SigningKey::from_bytes(&key_bytes(bytes)?)),
            None => None,
        };
        let addrs = self
            .addrs
            .iter()
            .map(|addr| {
                addr.parse::<Multiaddr>()
                    .map_err(|e| NetError::InvalidRecord(format!("log address {}: {}", addr, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        let head = self
            .head
            .as_deref()
            .map(|bytes| Cid::try_from(bytes).map_err(|e| NetError::InvalidRecord(e.to_string())))
            .transpose()?;

        let mut log = LogInfo::external(pub_key, addrs);
        log.priv_key = priv_key;
        log.head = head;
        log.managed = self.managed;
        Ok(log)
    }
}

fn key_bytes(bytes: &[u8]) -> Result<[u8; 32]> {
    <[u8; 32]>::try_from(bytes)
        .map_err(|_| NetError::InvalidRecord(format!("expected 32 key bytes, got {}", bytes.len())))
}

/// Thread metadata on top of any [`Datastore`]
#[derive(Clone)]
pub struct Logstore {
    store: Arc<dyn Datastore>,
}

impl Logstore {
    /// Wrap a datastore
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Get the underlying datastore
    pub fn datastore(&self) -> &Arc<dyn Datastore> {
        &self.store
    }

    fn thread_key(id: &ThreadId) -> Key {
        Key::from_segments([THREADS, id.to_string().as_str()])
    }

    fn log_key(id: &ThreadId, log: &LogInfo) -> Key {
        Self::thread_key(id).child(LOGS).child(log.id.to_string())
    }

    fn record_key(id: &ThreadId, cid: &Cid) -> Key {
        Self::thread_key(id).child(RECORDS).child(cid.to_string())
    }

    /// Whether the thread is known
    pub async fn has_thread(&self, id: &ThreadId) -> Result<bool> {
        Ok(self.store.has(&Self::thread_key(id).child(KEY)).await?)
    }

    /// Load everything known about a thread
    pub async fn thread_info(&self, id: &ThreadId) -> Result<ThreadInfo> {
        let key = match self.store.get(&Self::thread_key(id).child(KEY)).await {
            Ok(bytes) => ThreadKey::from_bytes(&bytes)?,
            Err(e) if e.is_not_found() => return Err(NetError::ThreadNotFound(id.clone())),
            Err(e) => return Err(e.into()),
        };

        let logs = self
            .store
            .query(&Self::thread_key(id).child(LOGS))
            .await?
            .into_iter()
            .map(|(_, value)| decode_cbor::<LogEntry>(&value)?.into_info())
            .collect::<Result<Vec<_>>>()?;

        Ok(ThreadInfo {
            id: id.clone(),
            key,
            logs,
            addrs: Vec::new(),
        })
    }

    /// IDs of every stored thread, sorted
    pub async fn thread_ids(&self) -> Result<Vec<ThreadId>> {
        let mut ids = self
            .store
            .query_keys(&Key::from_segments([THREADS]))
            .await?
            .into_iter()
            .filter(|key| key.name() == KEY && key.segments().count() == 3)
            .map(|key| Ok(ThreadId::decode(key.parent().name())?))
            .collect::<Result<Vec<_>>>()?;
        ids.sort();
        Ok(ids)
    }

    /// Persist a new thread (key and logs) in one batch
    pub async fn add_thread(&self, info: &ThreadInfo) -> Result<()> {
        let mut batch = Batch::new();
        batch.put(
            Self::thread_key(&info.id).child(KEY),
            info.key.to_bytes(),
        );
        for log in &info.logs {
            batch.put_cbor(Self::log_key(&info.id, log), &LogEntry::from_info(log))?;
        }
        self.store.commit(batch).await?;
        debug!(thread = %info.id, logs = info.logs.len(), "Stored thread");
        Ok(())
    }

    /// Remove a thread and all of its logs and records in one batch
    pub async fn delete_thread(&self, id: &ThreadId) -> Result<()> {
        let mut batch = Batch::new();
        batch.delete_prefix(Self::thread_key(id));
        self.store.commit(batch).await?;
        debug!(thread = %id, "Removed thread");
        Ok(())
    }

    /// Store a record and move its log head in one batch
    pub async fn put_record(&self, id: &ThreadId, log: &LogInfo, record: &Record) -> Result<()> {
        let mut batch = Batch::new();
        batch.put(Self::record_key(id, &record.cid()), record.to_block()?);
        batch.put_cbor(Self::log_key(id, log), &LogEntry::from_info(log))?;
        self.store.commit(batch).await?;
        Ok(())
    }

    /// Load a record block
    pub async fn get_record(&self, id: &ThreadId, cid: &Cid) -> Result<Record> {
        let block = self.store.get(&Self::record_key(id, cid)).await?;
        Record::from_block(&block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_store::MemoryDatastore;
    use weft_thread::generate_log_key;

    fn thread() -> ThreadInfo {
        let mut log = LogInfo::new_managed(generate_log_key());
        log.addrs.push("/ip4/127.0.0.1/tcp/4006".parse().unwrap());
        ThreadInfo {
            id: ThreadId::new_random(),
            key: ThreadKey::generate(),
            logs: vec![log],
            addrs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_thread_roundtrip() {
        let logstore = Logstore::new(Arc::new(MemoryDatastore::new()));
        let info = thread();

        logstore.add_thread(&info).await.unwrap();
        assert!(logstore.has_thread(&info.id).await.unwrap());

        let loaded = logstore.thread_info(&info.id).await.unwrap();
        assert_eq!(loaded.key, info.key);
        assert_eq!(loaded.logs.len(), 1);

        let log = &loaded.logs[0];
        assert_eq!(log.id, info.logs[0].id);
        assert!(log.is_own());
        assert!(log.managed);
        assert_eq!(log.addrs, info.logs[0].addrs);
        assert_eq!(log.head, None);
    }

    #[tokio::test]
    async fn test_missing_thread() {
        let logstore = Logstore::new(Arc::new(MemoryDatastore::new()));
        let id = ThreadId::new_random();

        assert!(!logstore.has_thread(&id).await.unwrap());
        let err = logstore.thread_info(&id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_thread_ids_and_delete() {
        let store = MemoryDatastore::new();
        let logstore = Logstore::new(Arc::new(store.clone()));
        let a = thread();
        let b = thread();

        logstore.add_thread(&a).await.unwrap();
        logstore.add_thread(&b).await.unwrap();

        let mut expected = vec![a.id.clone(), b.id.clone()];
        expected.sort();
        assert_eq!(logstore.thread_ids().await.unwrap(), expected);

        logstore.delete_thread(&a.id).await.unwrap();
        assert_eq!(logstore.thread_ids().await.unwrap(), vec![b.id.clone()]);
        assert!(store
            .keys()
            .iter()
            .all(|key| !key.as_str().contains(&a.id.to_string())));
    }

    #[tokio::test]
    async fn test_record_moves_head() {
        let logstore = Logstore::new(Arc::new(MemoryDatastore::new()));
        let info = thread();
        logstore.add_thread(&info).await.unwrap();

        let mut log = info.logs[0].clone();
        let key = log.priv_key.clone().unwrap();
        let record = Record::sign(&info.id, &key, None, Bytes::from("body")).unwrap();
        log.head = Some(record.cid());
        logstore.put_record(&info.id, &log, &record).await.unwrap();

        let loaded = logstore.thread_info(&info.id).await.unwrap();
        assert_eq!(loaded.logs[0].head, Some(record.cid()));
        assert_eq!(logstore.get_record(&info.id, &record.cid()).await.unwrap(), record);
    }
}
