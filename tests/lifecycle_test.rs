//! Concurrency, cancellation and shutdown of the database manager

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use weft_db::{CollectionConfig, Context, DbError, Manager, NewDbOptions};
use weft_net::{LocalNetwork, NetConfig, Network, NewThreadOptions, Record};
use weft_store::{Batch, Datastore, Key, MemoryDatastore};
use weft_thread::{LogId, ThreadAddr, ThreadId, ThreadInfo};

fn local_network() -> Arc<LocalNetwork> {
    Arc::new(LocalNetwork::new(
        Arc::new(MemoryDatastore::new()),
        NetConfig::default(),
    ))
}

/// A network whose `create_thread` returns only after a delay
struct SlowNetwork {
    inner: Arc<LocalNetwork>,
    delay: Duration,
}

#[async_trait]
impl Network for SlowNetwork {
    async fn create_thread(
        &self,
        id: &ThreadId,
        opts: NewThreadOptions,
    ) -> weft_net::Result<ThreadInfo> {
        let info = self.inner.create_thread(id, opts).await?;
        tokio::time::sleep(self.delay).await;
        Ok(info)
    }

    async fn get_thread(&self, id: &ThreadId) -> weft_net::Result<ThreadInfo> {
        self.inner.get_thread(id).await
    }

    async fn pull_thread(&self, id: &ThreadId) -> weft_net::Result<()> {
        self.inner.pull_thread(id).await
    }

    async fn delete_thread(&self, id: &ThreadId) -> weft_net::Result<()> {
        self.inner.delete_thread(id).await
    }

    async fn thread_addrs(&self, id: &ThreadId) -> weft_net::Result<Vec<ThreadAddr>> {
        self.inner.thread_addrs(id).await
    }

    async fn create_record(&self, id: &ThreadId, body: Bytes) -> weft_net::Result<Record> {
        self.inner.create_record(id, body).await
    }

    async fn records(&self, id: &ThreadId, log: &LogId) -> weft_net::Result<Vec<Record>> {
        self.inner.records(id, log).await
    }

    async fn close(&self) -> weft_net::Result<()> {
        self.inner.close().await
    }
}

/// A datastore whose document existence checks stall while armed
struct StallingStore {
    inner: MemoryDatastore,
    armed: AtomicBool,
    delay: Duration,
}

impl StallingStore {
    fn new(inner: MemoryDatastore, delay: Duration) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            delay,
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Datastore for StallingStore {
    async fn get(&self, key: &Key) -> weft_store::Result<Bytes> {
        self.inner.get(key).await
    }

    async fn has(&self, key: &Key) -> weft_store::Result<bool> {
        if self.armed.load(Ordering::SeqCst) && key.as_str().contains("/doc/") {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.has(key).await
    }

    async fn query(&self, prefix: &Key) -> weft_store::Result<Vec<(Key, Bytes)>> {
        self.inner.query(prefix).await
    }

    async fn commit(&self, batch: Batch) -> weft_store::Result<()> {
        self.inner.commit(batch).await
    }

    async fn sync(&self) -> weft_store::Result<()> {
        self.inner.sync().await
    }

    async fn close(&self) -> weft_store::Result<()> {
        self.inner.close().await
    }
}

fn person_collection() -> CollectionConfig {
    CollectionConfig::new(
        "Person",
        json!({
            "type": "object",
            "required": ["_id", "name"],
            "properties": {"_id": {"type": "string"}, "name": {"type": "string"}}
        }),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_new_db_has_one_winner() {
    let manager = Arc::new(Manager::new(Arc::new(MemoryDatastore::new()), local_network()));
    let id = ThreadId::new_random();

    let attempts = (0..8).map(|_| {
        let manager = Arc::clone(&manager);
        let id = id.clone();
        tokio::spawn(async move {
            manager
                .new_db(&Context::background(), &id, NewDbOptions::default())
                .await
        })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(DbError::DbExists(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(duplicates, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_ids_create_concurrently() {
    let manager = Arc::new(Manager::new(Arc::new(MemoryDatastore::new()), local_network()));

    let creations = (0..16).map(|_| {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move {
            manager
                .new_db(&Context::background(), &ThreadId::new_random(), NewDbOptions::default())
                .await
        })
    });
    for joined in join_all(creations).await {
        joined.unwrap().unwrap();
    }

    let dbs = manager.list_dbs(&Context::background()).await.unwrap();
    assert_eq!(dbs.len(), 16);
}

#[tokio::test]
async fn test_timed_out_new_db_rolls_back() {
    let inner = local_network();
    let network = Arc::new(SlowNetwork {
        inner: Arc::clone(&inner),
        delay: Duration::from_millis(500),
    });
    let store = MemoryDatastore::new();
    let manager = Manager::new(Arc::new(store.clone()), network);
    let id = ThreadId::new_random();

    let ctx = Context::with_timeout(Duration::from_millis(50));
    let err = manager
        .new_db(&ctx, &id, NewDbOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::DeadlineExceeded), "{err}");
    assert!(!err.is_not_found());

    let ctx = Context::background();
    assert!(manager.get_db(&ctx, &id).await.unwrap_err().is_not_found());
    assert!(inner.thread_ids().await.unwrap().is_empty());
    assert!(store.is_empty());

    // The ID is free for a later attempt
    manager.new_db(&ctx, &id, NewDbOptions::default()).await.unwrap();
}

#[tokio::test]
async fn test_canceled_new_db_rolls_back() {
    let inner = local_network();
    let network = Arc::new(SlowNetwork {
        inner: Arc::clone(&inner),
        delay: Duration::from_millis(500),
    });
    let manager = Manager::new(Arc::new(MemoryDatastore::new()), network);
    let id = ThreadId::new_random();

    let ctx = Context::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = manager
        .new_db(&ctx, &id, NewDbOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Canceled), "{err}");

    let ctx = Context::background();
    assert!(manager.get_db(&ctx, &id).await.unwrap_err().is_not_found());
    assert!(inner.thread_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_twice_then_rejects() {
    let manager = Manager::new(Arc::new(MemoryDatastore::new()), local_network());
    let ctx = Context::background();
    let id = ThreadId::new_random();

    let db = manager.new_db(&ctx, &id, NewDbOptions::default()).await.unwrap();
    manager.close().await.unwrap();
    manager.close().await.unwrap();

    assert!(matches!(manager.get_db(&ctx, &id).await, Err(DbError::ManagerClosed)));
    assert!(matches!(manager.delete_db(&ctx, &id).await, Err(DbError::ManagerClosed)));
    assert!(matches!(db.addrs(&ctx).await, Err(DbError::Closed)));
}

#[tokio::test]
async fn test_concurrent_get_db_shares_one_handle() {
    let store = MemoryDatastore::new();
    let logstore = MemoryDatastore::new();
    let ctx = Context::background();
    let id = ThreadId::new_random();

    let network = Arc::new(LocalNetwork::new(Arc::new(logstore.clone()), NetConfig::default()));
    let first = Manager::new(Arc::new(store.clone()), network);
    first.new_db(&ctx, &id, NewDbOptions::default()).await.unwrap();
    first.close().await.unwrap();

    let network = Arc::new(LocalNetwork::new(Arc::new(logstore), NetConfig::default()));
    let manager = Arc::new(Manager::new(Arc::new(store), network));
    let lookups = (0..8).map(|_| {
        let manager = Arc::clone(&manager);
        let id = id.clone();
        tokio::spawn(async move { manager.get_db(&Context::background(), &id).await })
    });

    let dbs: Vec<_> = join_all(lookups)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    // One hydration: every handle sees a collection registered through any other
    dbs[0]
        .new_collection(
            &ctx,
            weft_db::CollectionConfig::new(
                "notes",
                serde_json::json!({"properties": {"_id": {"type": "string"}}}),
            ),
        )
        .await
        .unwrap();
    assert!(dbs.iter().all(|db| db.get_collection("notes").is_some()));
}

#[test_log::test(tokio::test)]
async fn test_delete_db_waits_for_in_flight_writes() {
    let store = MemoryDatastore::new();
    let stalling = Arc::new(StallingStore::new(store.clone(), Duration::from_millis(200)));
    let manager = Manager::new(stalling.clone(), local_network());
    let ctx = Context::background();
    let id = ThreadId::new_random();

    let db = manager
        .new_db(&ctx, &id, NewDbOptions::default().with_collection(person_collection()))
        .await
        .unwrap();
    let people = db.get_collection("Person").unwrap();

    stalling.arm();
    let writer = tokio::spawn(async move {
        people
            .create_many(
                &Context::background(),
                vec![json!({"name": "Alice"}), json!({"name": "Bob"})],
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    manager.delete_db(&ctx, &id).await.unwrap();
    let _ = writer.await.unwrap();
    assert!(store.is_empty(), "documents written after the delete");

    // A database created again under the same ID starts empty
    let db = manager.new_db(&ctx, &id, NewDbOptions::default()).await.unwrap();
    let people = db.new_collection(&ctx, person_collection()).await.unwrap();
    assert!(people.find_all(&ctx).await.unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_close_keeps_events_of_in_flight_writes() {
    let store = MemoryDatastore::new();
    let logstore = MemoryDatastore::new();
    let stalling = Arc::new(StallingStore::new(store.clone(), Duration::from_millis(200)));
    let network = Arc::new(LocalNetwork::new(Arc::new(logstore.clone()), NetConfig::default()));
    let manager = Manager::new(stalling.clone(), network);
    let ctx = Context::background();
    let id = ThreadId::new_random();

    let db = manager
        .new_db(&ctx, &id, NewDbOptions::default().with_collection(person_collection()))
        .await
        .unwrap();
    let people = db.get_collection("Person").unwrap();

    stalling.arm();
    let writer = tokio::spawn(async move {
        people
            .create_many(
                &Context::background(),
                vec![json!({"name": "Alice"}), json!({"name": "Bob"})],
            )
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    manager.close().await.unwrap();
    let committed = writer.await.unwrap().map(|ids| ids.len()).unwrap_or(0);

    let network = Arc::new(LocalNetwork::new(Arc::new(logstore), NetConfig::default()));
    let manager = Manager::new(Arc::new(store), network);
    let db = manager.get_db(&ctx, &id).await.unwrap();
    let docs = db.get_collection("Person").unwrap().find_all(&ctx).await.unwrap();
    let events = db.events(&ctx).await.unwrap();

    assert_eq!(docs.len(), committed);
    assert_eq!(events.len(), committed);
}
