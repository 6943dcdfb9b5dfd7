//! Lifecycle of many databases over one store and one network
//!
//! The manager keeps a registry of open databases. Creation and removal are
//! serialized per thread ID, so each ID has at most one open [`Database`].
//!
//! Persisted state is the source of truth. A database exists once its meta
//! key is committed; creating one commits meta and schemas in one batch after
//! its thread is created, and deleting one removes every `/db/<id>` key in one
//! batch before its thread is deleted. A crash between the two steps leaves
//! only an orphan thread, which is invisible to [`Manager::get_db`] and
//! replaced by the next [`Manager::new_db`] for that ID.

use crate::{
    collection::{collection_meta, prepare_collection},
    context::Context,
    db::Database,
    layout::{
        db_prefix, dbs_root, id_from_meta_key, meta_key, schema_key, schema_prefix, CollectionMeta,
        DbMeta,
    },
    options::{validate_name, ManagerConfig, NewDbOptions},
    schema::Schema,
    DbError, Result,
};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, instrument, warn};
use weft_net::{KeyedLock, Network, NewThreadOptions};
use weft_store::{decode_cbor, Batch, Datastore, DatastoreExt};
use weft_thread::ThreadId;

/// Owns the set of open databases
pub struct Manager {
    store: Arc<dyn Datastore>,
    network: Arc<dyn Network>,
    config: ManagerConfig,
    /// Open databases
    dbs: DashMap<ThreadId, Database>,
    /// Per-ID serialization of create, hydrate and delete
    locks: KeyedLock<ThreadId>,
    /// `true` once closed; operations hold a read guard
    closed: RwLock<bool>,
}

impl Manager {
    /// Create a manager with default configuration
    pub fn new(store: Arc<dyn Datastore>, network: Arc<dyn Network>) -> Self {
        Self::with_config(store, network, ManagerConfig::default())
    }

    /// Create a manager with custom configuration
    pub fn with_config(
        store: Arc<dyn Datastore>,
        network: Arc<dyn Network>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            store,
            network,
            config,
            dbs: DashMap::new(),
            locks: KeyedLock::new(),
            closed: RwLock::new(false),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Create a database bound to a new thread
    #[instrument(skip(self, ctx, id, opts), fields(thread = %id))]
    pub async fn new_db(&self, ctx: &Context, id: &ThreadId, opts: NewDbOptions) -> Result<Database> {
        let _open = self.enter().await?;

        if let Some(name) = &opts.name {
            validate_name(name)?;
        }

        let mut names = HashSet::new();
        let mut collections = Vec::with_capacity(opts.collections.len());
        for config in &opts.collections {
            let schema = prepare_collection(config)?;
            if !names.insert(config.name.as_str()) {
                return Err(DbError::CollectionExists(config.name.clone()));
            }
            collections.push((config.name.as_str(), schema));
        }

        let _lock = ctx
            .run(async { Ok::<_, DbError>(self.locks.lock(id).await) })
            .await?;

        if self.dbs.contains_key(id) || ctx.run(self.store.has(&meta_key(id))).await? {
            return Err(DbError::DbExists(id.clone()));
        }

        match ctx.run(self.network.get_thread(id)).await {
            Ok(_) => {
                warn!(thread = %id, "Discarding orphan thread");
                ctx.run(self.network.delete_thread(id)).await?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let db = match self.create_db(ctx, id, opts.name, &collections).await {
            Ok(db) => db,
            Err(err) => {
                self.rollback(id).await;
                return Err(err);
            }
        };

        self.dbs.insert(id.clone(), db.clone());
        info!(thread = %id, name = ?db.name(), collections = collections.len(), "Created db");
        Ok(db)
    }

    /// Get an open database, hydrating it from persisted state if needed
    #[instrument(skip(self, ctx, id), fields(thread = %id))]
    pub async fn get_db(&self, ctx: &Context, id: &ThreadId) -> Result<Database> {
        let _open = self.enter().await?;
        self.open_db(ctx, id).await
    }

    /// Every persisted database, ordered by ID
    #[instrument(skip(self, ctx))]
    pub async fn list_dbs(&self, ctx: &Context) -> Result<Vec<Database>> {
        let _open = self.enter().await?;

        let keys = ctx.run(self.store.query_keys(&dbs_root())).await?;
        let mut ids: Vec<ThreadId> = keys.iter().filter_map(id_from_meta_key).collect();
        ids.sort();

        let mut dbs = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.open_db(ctx, id).await {
                Ok(db) => dbs.push(db),
                // Deleted since the listing
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(dbs)
    }

    /// Delete a database and its thread
    #[instrument(skip(self, ctx, id), fields(thread = %id))]
    pub async fn delete_db(&self, ctx: &Context, id: &ThreadId) -> Result<()> {
        let _open = self.enter().await?;
        let _lock = ctx
            .run(async { Ok::<_, DbError>(self.locks.lock(id).await) })
            .await?;

        let open = self.get_open(id);
        let persisted = ctx.run(self.store.has(&meta_key(id))).await?;
        if open.is_none() && !persisted {
            return Err(DbError::ThreadNotFound(id.clone()));
        }

        if let Some(err) = ctx.err() {
            return Err(err);
        }

        if let Some((_, db)) = self.dbs.remove(id) {
            db.close().await;
        }

        let mut batch = Batch::new();
        batch.delete_prefix(db_prefix(id));
        self.store.commit(batch).await?;

        if let Some(db) = &open {
            db.mark_deleted();
        }

        match self.network.delete_thread(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(thread = %id, error = %e, "Failed to delete thread; left as orphan"),
        }

        info!(thread = %id, "Deleted db");
        Ok(())
    }

    /// Close every open database. Data is kept; a later manager can hydrate it.
    ///
    /// Calling `close` again is a no-op.
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<()> {
        let mut closed = self.closed.write().await;
        if *closed {
            return Ok(());
        }
        *closed = true;

        let dbs: Vec<Database> = self.dbs.iter().map(|entry| entry.value().clone()).collect();
        self.dbs.clear();
        for db in &dbs {
            db.close().await;
        }

        info!(dbs = dbs.len(), "Closed manager");
        Ok(())
    }

    /// Whether `close` has been called
    pub async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }

    async fn enter(&self) -> Result<RwLockReadGuard<'_, bool>> {
        let closed = self.closed.read().await;
        if *closed {
            return Err(DbError::ManagerClosed);
        }
        Ok(closed)
    }

    fn get_open(&self, id: &ThreadId) -> Option<Database> {
        self.dbs.get(id).map(|entry| entry.value().clone())
    }

    async fn open_db(&self, ctx: &Context, id: &ThreadId) -> Result<Database> {
        if let Some(db) = self.get_open(id) {
            return Ok(db);
        }

        let _lock = ctx
            .run(async { Ok::<_, DbError>(self.locks.lock(id).await) })
            .await?;
        if let Some(db) = self.get_open(id) {
            return Ok(db);
        }

        let db = self.hydrate(ctx, id).await?;
        self.dbs.insert(id.clone(), db.clone());
        info!(thread = %id, collections = db.list_collections().len(), "Hydrated db");
        Ok(db)
    }

    /// Rebuild a database from the network and the store
    async fn hydrate(&self, ctx: &Context, id: &ThreadId) -> Result<Database> {
        ctx.run(self.network.get_thread(id)).await?;

        let meta: DbMeta = match ctx.run(self.store.get_cbor::<DbMeta>(&meta_key(id))).await {
            Ok(meta) => meta,
            Err(DbError::Store(e)) if e.is_not_found() => {
                debug!(thread = %id, "Thread has no db meta");
                return Err(DbError::ThreadNotFound(id.clone()));
            }
            Err(e) => return Err(e),
        };

        let schemas = ctx
            .run(self.store.query(&schema_prefix(id)))
            .await?
            .iter()
            .map(|(_, bytes)| decode_cbor::<CollectionMeta>(bytes).map_err(DbError::from))
            .collect::<Result<Vec<_>>>()?;

        ctx.run(self.network.pull_thread(id)).await?;

        Database::open(
            id.clone(),
            &meta,
            Arc::clone(&self.store),
            Arc::clone(&self.network),
            &schemas,
            self.config.event_queue_capacity,
        )
    }

    /// Create the thread, commit meta and initial schemas, then build the handle
    async fn create_db(
        &self,
        ctx: &Context,
        id: &ThreadId,
        name: Option<String>,
        collections: &[(&str, Schema)],
    ) -> Result<Database> {
        ctx.run(self.network.create_thread(id, NewThreadOptions::default()))
            .await?;

        let meta = DbMeta::new(name);
        let schemas = collections
            .iter()
            .map(|(name, schema)| collection_meta(name, schema))
            .collect::<Result<Vec<_>>>()?;

        // Clear anything a crashed or interrupted delete left behind
        let mut batch = Batch::new();
        batch.delete_prefix(db_prefix(id));
        batch.put_cbor(meta_key(id), &meta)?;
        for schema in &schemas {
            batch.put_cbor(schema_key(id, &schema.name), schema)?;
        }

        if let Some(err) = ctx.err() {
            return Err(err);
        }
        self.store.commit(batch).await?;

        Database::open(
            id.clone(),
            &meta,
            Arc::clone(&self.store),
            Arc::clone(&self.network),
            &schemas,
            self.config.event_queue_capacity,
        )
    }

    /// Undo a partial `new_db`; runs to completion regardless of the caller's context
    async fn rollback(&self, id: &ThreadId) {
        let mut batch = Batch::new();
        batch.delete_prefix(db_prefix(id));
        if let Err(e) = self.store.commit(batch).await {
            warn!(thread = %id, error = %e, "Failed to remove db keys during rollback");
        }

        match self.network.delete_thread(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(thread = %id, error = %e, "Failed to delete thread during rollback"),
        }

        warn!(thread = %id, "Rolled back db creation");
    }
}
