//! Databases: a set of collections bound to one thread

use crate::{
    collection::{collection_meta, prepare_collection, Collection, LogEvent},
    context::Context,
    layout::{doc_prefix, schema_key, CollectionMeta, DbMeta},
    options::CollectionConfig,
    DbError, Result,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use weft_net::Network;
use weft_store::{Batch, Datastore};
use weft_thread::{ThreadAddr, ThreadId, ThreadKey};

/// Lifecycle state of a database handle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbState {
    /// Serving operations
    Open,
    /// Closed with its manager; the data is intact and can be hydrated again
    Closed,
    /// Deleted; terminal
    Deleted,
}

/// Summary of a database and how to join its thread
#[derive(Clone, Debug)]
pub struct DbInfo {
    pub id: ThreadId,
    pub name: Option<String>,
    pub key: ThreadKey,
    pub addrs: Vec<ThreadAddr>,
}

/// State shared between a database and its collections
pub(crate) struct DbCore {
    pub id: ThreadId,
    pub store: Arc<dyn Datastore>,
    state: Mutex<DbState>,
    events: Mutex<Option<mpsc::Sender<LogEvent>>>,
}

impl DbCore {
    pub fn new(
        id: ThreadId,
        store: Arc<dyn Datastore>,
        events: Option<mpsc::Sender<LogEvent>>,
    ) -> Self {
        Self {
            id,
            store,
            state: Mutex::new(DbState::Open),
            events: Mutex::new(events),
        }
    }

    pub fn state(&self) -> DbState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: DbState) {
        *self.state.lock() = state;
    }

    pub fn check_open(&self) -> Result<()> {
        match self.state() {
            DbState::Open => Ok(()),
            DbState::Closed => Err(DbError::Closed),
            DbState::Deleted => Err(DbError::ThreadNotFound(self.id.clone())),
        }
    }

    /// Queue events for the log writer, waiting if the queue is full
    pub async fn publish(&self, events: Vec<LogEvent>) {
        let Some(tx) = self.events.lock().clone() else {
            if !events.is_empty() {
                warn!(thread = %self.id, dropped = events.len(), "Log queue closed; dropping events");
            }
            return;
        };

        for event in events {
            if tx.send(event).await.is_err() {
                warn!(thread = %self.id, "Log writer stopped; dropping events");
                break;
            }
        }
    }

    /// Stop accepting events; the writer exits once the queue drains
    fn close_events(&self) {
        self.events.lock().take();
    }
}

/// A document database bound to one thread.
///
/// Handles are cheap to clone and all refer to the same database.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DbInner>,
}

struct DbInner {
    core: Arc<DbCore>,
    name: Option<String>,
    created_at: DateTime<Utc>,
    network: Arc<dyn Network>,
    collections: RwLock<BTreeMap<String, Collection>>,
    writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    /// Serializes collection registration and removal
    ddl: tokio::sync::Mutex<()>,
}

impl Database {
    /// Build an open database from its persisted metadata and start its log writer
    pub(crate) fn open(
        id: ThreadId,
        meta: &DbMeta,
        store: Arc<dyn Datastore>,
        network: Arc<dyn Network>,
        schemas: &[CollectionMeta],
        queue_capacity: usize,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let core = Arc::new(DbCore::new(id.clone(), store, Some(tx)));

        let mut collections = BTreeMap::new();
        for schema in schemas {
            let collection = Collection::new(Arc::clone(&core), schema)?;
            collections.insert(schema.name.clone(), collection);
        }

        let writer = tokio::spawn(run_log_writer(id, Arc::clone(&network), rx));

        Ok(Self {
            inner: Arc::new(DbInner {
                core,
                name: meta.name.clone(),
                created_at: meta.created_at,
                network,
                collections: RwLock::new(collections),
                writer: tokio::sync::Mutex::new(Some(writer)),
                ddl: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Thread ID of this database
    pub fn id(&self) -> &ThreadId {
        &self.inner.core.id
    }

    /// Name given at creation, if any
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// When the database was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Current lifecycle state
    pub fn state(&self) -> DbState {
        self.inner.core.state()
    }

    /// Register a new collection and persist its schema
    #[instrument(skip(self, ctx, config), fields(thread = %self.id(), collection = %config.name))]
    pub async fn new_collection(&self, ctx: &Context, config: CollectionConfig) -> Result<Collection> {
        self.inner.core.check_open()?;
        let schema = prepare_collection(&config)?;

        let _ddl = ctx
            .run(async { Ok::<_, DbError>(self.inner.ddl.lock().await) })
            .await?;
        self.inner.core.check_open()?;

        if self.inner.collections.read().contains_key(&config.name) {
            return Err(DbError::CollectionExists(config.name));
        }

        let meta = collection_meta(&config.name, &schema)?;
        let mut batch = Batch::new();
        batch.put_cbor(schema_key(self.id(), &meta.name), &meta)?;

        if let Some(err) = ctx.err() {
            return Err(err);
        }
        self.inner.core.store.commit(batch).await?;

        let collection = Collection::new(Arc::clone(&self.inner.core), &meta)?;
        self.inner
            .collections
            .write()
            .insert(meta.name.clone(), collection.clone());

        info!(thread = %self.id(), collection = %meta.name, "Registered collection");
        Ok(collection)
    }

    /// Look up a registered collection
    pub fn get_collection(&self, name: &str) -> Option<Collection> {
        self.inner.collections.read().get(name).cloned()
    }

    /// Every registered collection, ordered by name
    pub fn list_collections(&self) -> Vec<Collection> {
        self.inner.collections.read().values().cloned().collect()
    }

    /// Remove a collection with its schema and all of its documents
    #[instrument(skip(self, ctx), fields(thread = %self.id()))]
    pub async fn delete_collection(&self, ctx: &Context, name: &str) -> Result<()> {
        self.inner.core.check_open()?;

        let _ddl = ctx
            .run(async { Ok::<_, DbError>(self.inner.ddl.lock().await) })
            .await?;
        self.inner.core.check_open()?;

        let collection = self
            .get_collection(name)
            .ok_or_else(|| DbError::CollectionNotFound(name.to_string()))?;

        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let _writes = collection.drop_collection().await;
        let mut batch = Batch::new();
        batch
            .delete(schema_key(self.id(), name))
            .delete_prefix(doc_prefix(self.id(), name));
        self.inner.core.store.commit(batch).await?;
        self.inner.collections.write().remove(name);

        info!(thread = %self.id(), collection = %name, "Deleted collection");
        Ok(())
    }

    /// Name, thread key and addresses of this database
    pub async fn info(&self, ctx: &Context) -> Result<DbInfo> {
        self.inner.core.check_open()?;
        let thread = ctx.run(self.inner.network.get_thread(self.id())).await?;
        let addrs = ctx.run(self.inner.network.thread_addrs(self.id())).await?;

        Ok(DbInfo {
            id: self.id().clone(),
            name: self.inner.name.clone(),
            key: thread.key,
            addrs,
        })
    }

    /// Addresses the database's thread can be joined at
    pub async fn addrs(&self, ctx: &Context) -> Result<Vec<ThreadAddr>> {
        self.inner.core.check_open()?;
        ctx.run(self.inner.network.thread_addrs(self.id())).await
    }

    /// Events this node appended to the thread log, oldest first
    pub async fn events(&self, ctx: &Context) -> Result<Vec<LogEvent>> {
        self.inner.core.check_open()?;
        let thread = ctx.run(self.inner.network.get_thread(self.id())).await?;
        let Some(log) = thread.own_log() else {
            return Ok(Vec::new());
        };

        let records = ctx
            .run(self.inner.network.records(self.id(), &log.id))
            .await?;
        records
            .iter()
            .rev()
            .map(|record| LogEvent::from_bytes(record.body()))
            .collect()
    }

    /// Stop serving and wait for in-flight writes and queued log events.
    ///
    /// Once this returns nothing more is written under the database's keys.
    pub(crate) async fn close(&self) {
        if self.state() == DbState::Open {
            self.inner.core.set_state(DbState::Closed);
        }

        // Writers that got past their state check finish here; later ones see Closed
        let _ddl = self.inner.ddl.lock().await;
        for collection in self.list_collections() {
            collection.wait_writes().await;
        }
        self.inner.core.close_events();

        let writer = self.inner.writer.lock().await.take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(thread = %self.id(), error = %e, "Log writer task failed");
            }
        }
        debug!(thread = %self.id(), "Closed db");
    }

    pub(crate) fn mark_deleted(&self) {
        self.inner.core.set_state(DbState::Deleted);
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("id", self.id())
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Append queued events to the thread log until the queue closes
async fn run_log_writer(id: ThreadId, network: Arc<dyn Network>, mut rx: mpsc::Receiver<LogEvent>) {
    let mut written = 0usize;
    while let Some(event) = rx.recv().await {
        let body = match event.to_bytes() {
            Ok(body) => body,
            Err(e) => {
                warn!(thread = %id, error = %e, "Failed to encode log event");
                continue;
            }
        };

        match network.create_record(&id, body).await {
            Ok(_) => written += 1,
            Err(e) => warn!(thread = %id, error = %e, "Failed to append log record"),
        }
    }
    debug!(thread = %id, written, "Log writer stopped");
}
