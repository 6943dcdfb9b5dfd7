//! Single-node network
//!
//! Serves threads from a local [`Logstore`] and never dials peers. Thread
//! addresses are the configured host addresses with the thread component
//! appended.

use crate::{
    KeyedLock, Logstore, NetConfig, NetError, Network, NewThreadOptions, Record, Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use weft_store::Datastore;
use weft_thread::{generate_log_key, LogId, LogInfo, ThreadAddr, ThreadId, ThreadInfo, ThreadKey};

/// A network that keeps every thread on this node
pub struct LocalNetwork {
    logstore: Logstore,
    config: NetConfig,
    /// Serializes head updates per thread
    writers: KeyedLock<ThreadId>,
    closed: AtomicBool,
}

impl LocalNetwork {
    /// Create a network over the given datastore
    pub fn new(store: Arc<dyn Datastore>, config: NetConfig) -> Self {
        Self {
            logstore: Logstore::new(store),
            config,
            writers: KeyedLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Get the logstore
    pub fn logstore(&self) -> &Logstore {
        &self.logstore
    }

    /// IDs of every thread on this node, sorted
    pub async fn thread_ids(&self) -> Result<Vec<ThreadId>> {
        self.ensure_open()?;
        self.logstore.thread_ids().await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NetError::Closed);
        }
        Ok(())
    }

    fn with_addrs(&self, mut info: ThreadInfo) -> ThreadInfo {
        info.addrs = self.config.host_addrs.clone();
        info
    }
}

#[async_trait]
impl Network for LocalNetwork {
    #[instrument(skip(self, opts), fields(thread = %id))]
    async fn create_thread(&self, id: &ThreadId, opts: NewThreadOptions) -> Result<ThreadInfo> {
        self.ensure_open()?;
        let _guard = self.writers.lock(id).await;

        if self.logstore.has_thread(id).await? {
            return Err(NetError::ThreadExists(id.clone()));
        }

        let mut log = LogInfo::new_managed(opts.log_key.unwrap_or_else(generate_log_key));
        log.addrs = self.config.host_addrs.clone();

        let info = ThreadInfo {
            id: id.clone(),
            key: opts.thread_key.unwrap_or_else(ThreadKey::generate),
            logs: vec![log],
            addrs: self.config.host_addrs.clone(),
        };
        self.logstore.add_thread(&info).await?;

        info!(thread = %id, "Created thread");
        Ok(info)
    }

    async fn get_thread(&self, id: &ThreadId) -> Result<ThreadInfo> {
        self.ensure_open()?;
        let info = self.logstore.thread_info(id).await?;
        Ok(self.with_addrs(info))
    }

    /// Nothing to fetch on a single node; re-verifies every local log instead
    #[instrument(skip(self), fields(thread = %id))]
    async fn pull_thread(&self, id: &ThreadId) -> Result<()> {
        self.ensure_open()?;
        let info = self.logstore.thread_info(id).await?;

        let mut pulled = 0;
        for log in &info.logs {
            pulled += self.records(id, &log.id).await?.len();
        }

        debug!(thread = %id, logs = info.logs.len(), records = pulled, "Pulled thread");
        Ok(())
    }

    #[instrument(skip(self), fields(thread = %id))]
    async fn delete_thread(&self, id: &ThreadId) -> Result<()> {
        self.ensure_open()?;
        let _guard = self.writers.lock(id).await;

        if !self.logstore.has_thread(id).await? {
            return Err(NetError::ThreadNotFound(id.clone()));
        }
        self.logstore.delete_thread(id).await?;

        info!(thread = %id, "Deleted thread");
        Ok(())
    }

    async fn thread_addrs(&self, id: &ThreadId) -> Result<Vec<ThreadAddr>> {
        self.ensure_open()?;
        if !self.logstore.has_thread(id).await? {
            return Err(NetError::ThreadNotFound(id.clone()));
        }

        if self.config.host_addrs.is_empty() {
            return Ok(vec![id.to_addr()]);
        }
        Ok(self
            .config
            .host_addrs
            .iter()
            .map(|addr| ThreadAddr::new(addr.clone(), id.clone()))
            .collect())
    }

    async fn create_record(&self, id: &ThreadId, body: Bytes) -> Result<Record> {
        self.ensure_open()?;
        let _guard = self.writers.lock(id).await;

        let info = self.logstore.thread_info(id).await?;
        let mut log = info
            .own_log()
            .cloned()
            .ok_or_else(|| NetError::NoOwnLog(id.clone()))?;
        let key = log
            .priv_key
            .as_ref()
            .ok_or_else(|| NetError::NoOwnLog(id.clone()))?;

        let record = Record::sign(id, key, log.head, body)?;
        log.head = Some(record.cid());
        self.logstore.put_record(id, &log, &record).await?;

        debug!(thread = %id, record = %record.cid(), "Appended record");
        Ok(record)
    }

    async fn records(&self, id: &ThreadId, log: &LogId) -> Result<Vec<Record>> {
        self.ensure_open()?;
        let info = self.logstore.thread_info(id).await?;
        let log = info
            .log(log)
            .ok_or_else(|| NetError::LogNotFound(log.to_string()))?;

        let mut records = Vec::new();
        let mut next = log.head;
        while let Some(cid) = next {
            let record = self.logstore.get_record(id, &cid).await?;
            record.verify(id, &log.pub_key)?;
            next = record.prev()?;
            records.push(record);
        }
        Ok(records)
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Network closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_store::{FileDatastore, MemoryDatastore};

    fn network(store: &MemoryDatastore) -> LocalNetwork {
        LocalNetwork::new(Arc::new(store.clone()), NetConfig::default())
    }

    #[tokio::test]
    async fn test_create_and_get_thread() {
        let store = MemoryDatastore::new();
        let net = network(&store);
        let id = ThreadId::new_random();

        let created = net.create_thread(&id, NewThreadOptions::default()).await.unwrap();
        assert_eq!(created.id, id);
        assert!(created.own_log().is_some());
        assert!(created.key.can_read());

        let fetched = net.get_thread(&id).await.unwrap();
        assert_eq!(fetched.key, created.key);
        assert_eq!(fetched.logs[0].id, created.logs[0].id);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let net = network(&MemoryDatastore::new());
        let id = ThreadId::new_random();

        net.create_thread(&id, NewThreadOptions::default()).await.unwrap();
        let err = net.create_thread(&id, NewThreadOptions::default()).await.unwrap_err();
        assert!(matches!(err, NetError::ThreadExists(_)));
    }

    #[tokio::test]
    async fn test_provided_keys_are_used() {
        let net = network(&MemoryDatastore::new());
        let id = ThreadId::new_random();
        let thread_key = ThreadKey::generate_service_only();
        let log_key = generate_log_key();

        let info = net
            .create_thread(
                &id,
                NewThreadOptions::default()
                    .with_thread_key(thread_key.clone())
                    .with_log_key(log_key.clone()),
            )
            .await
            .unwrap();

        assert_eq!(info.key, thread_key);
        assert_eq!(info.logs[0].pub_key, log_key.verifying_key());
    }

    #[tokio::test]
    async fn test_not_found_sentinel() {
        let net = network(&MemoryDatastore::new());
        let id = ThreadId::new_random();

        assert!(net.get_thread(&id).await.unwrap_err().is_not_found());
        assert!(net.delete_thread(&id).await.unwrap_err().is_not_found());
        assert!(net.pull_thread(&id).await.unwrap_err().is_not_found());
        assert!(net.thread_addrs(&id).await.unwrap_err().is_not_found());
        assert!(net
            .create_record(&id, Bytes::from("x"))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_records_chain() {
        let net = network(&MemoryDatastore::new());
        let id = ThreadId::new_random();
        let info = net.create_thread(&id, NewThreadOptions::default()).await.unwrap();
        let log = info.logs[0].id.clone();

        for body in ["one", "two", "three"] {
            net.create_record(&id, Bytes::from(body)).await.unwrap();
        }

        let records = net.records(&id, &log).await.unwrap();
        let bodies: Vec<&[u8]> = records.iter().map(|r| r.body().as_ref()).collect();
        assert_eq!(bodies, vec![&b"three"[..], &b"two"[..], &b"one"[..]]);

        let head = net.get_thread(&id).await.unwrap().logs[0].head;
        assert_eq!(head, Some(records[0].cid()));
        net.pull_thread(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_thread_removes_everything() {
        let store = MemoryDatastore::new();
        let net = network(&store);
        let id = ThreadId::new_random();

        net.create_thread(&id, NewThreadOptions::default()).await.unwrap();
        net.create_record(&id, Bytes::from("x")).await.unwrap();
        net.delete_thread(&id).await.unwrap();

        assert!(store.is_empty());
        assert!(net.get_thread(&id).await.unwrap_err().is_not_found());

        // The id can be reused
        net.create_thread(&id, NewThreadOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_writer_locks_are_released() {
        let store = MemoryDatastore::new();
        let net = Arc::new(network(&store));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let net = net.clone();
            tasks.push(tokio::spawn(async move {
                let id = ThreadId::new_random();
                net.create_thread(&id, NewThreadOptions::default()).await.unwrap();
                net.create_record(&id, Bytes::from("a")).await.unwrap();
                net.create_record(&id, Bytes::from("b")).await.unwrap();
                id
            }));
        }
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        net.delete_thread(&ids[0]).await.unwrap();

        assert!(net.writers.is_empty());
    }

    #[tokio::test]
    async fn test_thread_addrs() {
        let id = ThreadId::new_random();

        let bare = network(&MemoryDatastore::new());
        bare.create_thread(&id, NewThreadOptions::default()).await.unwrap();
        assert_eq!(bare.thread_addrs(&id).await.unwrap(), vec![id.to_addr()]);

        let config = NetConfig::default()
            .with_host_addr_str("/ip4/10.0.0.1/tcp/4006")
            .unwrap();
        let hosted = LocalNetwork::new(Arc::new(MemoryDatastore::new()), config);
        hosted.create_thread(&id, NewThreadOptions::default()).await.unwrap();

        let addrs = hosted.thread_addrs(&id).await.unwrap();
        assert_eq!(addrs.len(), 1);
        assert_eq!(
            addrs[0].to_string(),
            format!("/ip4/10.0.0.1/tcp/4006/thread/{}", id)
        );
        assert_eq!(hosted.get_thread(&id).await.unwrap().addrs.len(), 1);
    }

    #[tokio::test]
    async fn test_close() {
        let store = MemoryDatastore::new();
        let net = network(&store);
        let id = ThreadId::new_random();
        net.create_thread(&id, NewThreadOptions::default()).await.unwrap();

        net.close().await.unwrap();
        net.close().await.unwrap();
        assert!(matches!(net.get_thread(&id).await, Err(NetError::Closed)));

        // A new network over the same store recovers the thread
        let reopened = network(&store);
        assert!(reopened.get_thread(&id).await.is_ok());
    }

    #[test_log::test(tokio::test)]
    async fn test_recovers_from_file_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logstore.journal");
        let id = ThreadId::new_random();

        let store = FileDatastore::open(&path).await.unwrap();
        let net = LocalNetwork::new(Arc::new(store.clone()), NetConfig::default());
        net.create_thread(&id, NewThreadOptions::default()).await.unwrap();
        net.create_record(&id, Bytes::from("persisted")).await.unwrap();
        net.close().await.unwrap();
        store.close().await.unwrap();

        let store = FileDatastore::open(&path).await.unwrap();
        let net = LocalNetwork::new(Arc::new(store), NetConfig::default());
        assert_eq!(net.thread_ids().await.unwrap(), vec![id.clone()]);

        let info = net.get_thread(&id).await.unwrap();
        let records = net.records(&id, &info.logs[0].id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body().as_ref(), b"persisted");
    }
}
