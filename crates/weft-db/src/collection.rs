//! Schema-validated document collections

use crate::{
    context::Context,
    db::DbCore,
    layout::{doc_key, doc_prefix, CollectionMeta},
    options::{validate_name, CollectionConfig},
    schema::Schema,
    DbError, Result,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use weft_store::Batch;

/// Field every document is keyed by
pub const ID_FIELD: &str = "_id";

/// What a log event records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Save,
    Delete,
}

/// One committed document change, appended to the thread log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub collection: String,
    pub action: Action,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Value>,
    pub at: DateTime<Utc>,
}

impl LogEvent {
    fn new(collection: &str, action: Action, id: String, doc: Option<Value>) -> Self {
        Self {
            collection: collection.to_string(),
            action,
            id,
            doc,
            at: Utc::now(),
        }
    }

    /// Encode as a record body
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(serde_json::to_vec(self)?.into())
    }

    /// Decode a record body
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A named set of documents sharing one schema.
///
/// Handles are cheap to clone. Writes through any handle are serialized per
/// collection; reads never wait on writes.
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
}

struct CollectionInner {
    core: Arc<DbCore>,
    name: String,
    schema: Schema,
    created_at: DateTime<Utc>,
    write_lock: Mutex<()>,
    dropped: AtomicBool,
}

impl Collection {
    pub(crate) fn new(core: Arc<DbCore>, meta: &CollectionMeta) -> Result<Self> {
        let schema = Schema::from_json(&meta.schema)?;
        Ok(Self {
            inner: Arc::new(CollectionInner {
                core,
                name: meta.name.clone(),
                schema,
                created_at: meta.created_at,
                write_lock: Mutex::new(()),
                dropped: AtomicBool::new(false),
            }),
        })
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Collection schema
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// When the collection was registered
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Insert one document, returning its `_id`
    pub async fn create(&self, ctx: &Context, doc: Value) -> Result<String> {
        let mut ids = self.create_many(ctx, vec![doc]).await?;
        ids.pop()
            .ok_or_else(|| DbError::InvalidDocument("no document created".to_string()))
    }

    /// Insert documents atomically, returning their `_id`s in caller order.
    ///
    /// Every document is prepared and validated before anything is written;
    /// one bad document means nothing is written.
    #[instrument(skip(self, ctx, docs), fields(collection = %self.inner.name, count = docs.len()))]
    pub async fn create_many(&self, ctx: &Context, docs: Vec<Value>) -> Result<Vec<String>> {
        self.check_live()?;

        let prepared = docs
            .into_iter()
            .map(|doc| self.prepare(doc, true))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        for (id, _) in &prepared {
            if !seen.insert(id.as_str()) {
                return Err(DbError::DocumentExists(id.clone()));
            }
        }

        let _guard = self.lock_writes(ctx).await?;
        let core = &self.inner.core;

        let mut batch = Batch::new();
        let mut events = Vec::with_capacity(prepared.len());
        for (id, doc) in prepared {
            let key = doc_key(&core.id, &self.inner.name, &id);
            if ctx.run(core.store.has(&key)).await? {
                return Err(DbError::DocumentExists(id));
            }
            batch.put(key, serde_json::to_vec(&doc)?);
            events.push(LogEvent::new(&self.inner.name, Action::Create, id, Some(doc)));
        }

        let ids: Vec<String> = events.iter().map(|e| e.id.clone()).collect();
        self.commit(ctx, batch, events).await?;
        Ok(ids)
    }

    /// Replace an existing document
    #[instrument(skip(self, ctx, doc), fields(collection = %self.inner.name))]
    pub async fn save(&self, ctx: &Context, doc: Value) -> Result<()> {
        self.check_live()?;
        let (id, doc) = self.prepare(doc, false)?;

        let _guard = self.lock_writes(ctx).await?;
        let core = &self.inner.core;
        let key = doc_key(&core.id, &self.inner.name, &id);
        if !ctx.run(core.store.has(&key)).await? {
            return Err(DbError::DocumentNotFound(id));
        }

        let mut batch = Batch::new();
        batch.put(key, serde_json::to_vec(&doc)?);
        let event = LogEvent::new(&self.inner.name, Action::Save, id, Some(doc));
        self.commit(ctx, batch, vec![event]).await
    }

    /// Remove a document
    #[instrument(skip(self, ctx), fields(collection = %self.inner.name))]
    pub async fn delete(&self, ctx: &Context, id: &str) -> Result<()> {
        self.check_live()?;
        validate_doc_id(id)?;

        let _guard = self.lock_writes(ctx).await?;
        let core = &self.inner.core;
        let key = doc_key(&core.id, &self.inner.name, id);
        if !ctx.run(core.store.has(&key)).await? {
            return Err(DbError::DocumentNotFound(id.to_string()));
        }

        let mut batch = Batch::new();
        batch.delete(key);
        let event = LogEvent::new(&self.inner.name, Action::Delete, id.to_string(), None);
        self.commit(ctx, batch, vec![event]).await
    }

    /// Whether a document exists
    pub async fn has(&self, ctx: &Context, id: &str) -> Result<bool> {
        self.check_live()?;
        validate_doc_id(id)?;
        let core = &self.inner.core;
        ctx.run(core.store.has(&doc_key(&core.id, &self.inner.name, id)))
            .await
    }

    /// Fetch a document by `_id`
    pub async fn find_by_id(&self, ctx: &Context, id: &str) -> Result<Value> {
        self.check_live()?;
        validate_doc_id(id)?;
        let core = &self.inner.core;
        let key = doc_key(&core.id, &self.inner.name, id);

        match ctx.run(core.store.get(&key)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(DbError::Store(e)) if e.is_not_found() => {
                Err(DbError::DocumentNotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Every document, ordered by `_id`
    pub async fn find_all(&self, ctx: &Context) -> Result<Vec<Value>> {
        self.check_live()?;
        let core = &self.inner.core;
        let entries = ctx
            .run(core.store.query(&doc_prefix(&core.id, &self.inner.name)))
            .await?;

        entries
            .iter()
            .map(|(_, bytes)| serde_json::from_slice(bytes).map_err(DbError::from))
            .collect()
    }

    /// Ensure the document is an object with a usable `_id` and fits the schema
    fn prepare(&self, mut doc: Value, assign_id: bool) -> Result<(String, Value)> {
        let fields = doc.as_object_mut().ok_or_else(|| {
            DbError::InvalidDocument("document must be a JSON object".to_string())
        })?;

        let id = match fields.get(ID_FIELD) {
            None => String::new(),
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(DbError::InvalidDocument(format!(
                    "{ID_FIELD} must be a string, got {other}"
                )))
            }
        };

        let id = if id.is_empty() {
            if !assign_id {
                return Err(DbError::InvalidDocument(format!(
                    "{ID_FIELD} is required"
                )));
            }
            let id = uuid::Uuid::new_v4().to_string();
            fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        } else {
            validate_doc_id(&id)?;
            id
        };

        self.inner
            .schema
            .validate(&doc)
            .map_err(DbError::SchemaValidation)?;
        Ok((id, doc))
    }

    async fn lock_writes(&self, ctx: &Context) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        let guard = ctx
            .run(async { Ok::<_, DbError>(self.inner.write_lock.lock().await) })
            .await?;
        // State may have changed while waiting
        self.check_live()?;
        Ok(guard)
    }

    /// Commit a write batch and hand its events to the log writer.
    ///
    /// Cancellation is observed up to the commit; after that the write
    /// completes.
    async fn commit(&self, ctx: &Context, batch: Batch, events: Vec<LogEvent>) -> Result<()> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let core = &self.inner.core;
        core.store.commit(batch).await?;
        debug!(collection = %self.inner.name, events = events.len(), "Committed documents");
        core.publish(events).await;
        Ok(())
    }

    fn check_live(&self) -> Result<()> {
        self.inner.core.check_open()?;
        if self.inner.dropped.load(Ordering::Acquire) {
            return Err(DbError::CollectionNotFound(self.inner.name.clone()));
        }
        Ok(())
    }

    /// Wait for the write in progress, if any, to commit and publish
    pub(crate) async fn wait_writes(&self) {
        let _guard = self.inner.write_lock.lock().await;
    }

    /// Wait for in-flight writes, then reject all further operations
    pub(crate) async fn drop_collection(&self) -> tokio::sync::MutexGuard<'_, ()> {
        let guard = self.inner.write_lock.lock().await;
        self.inner.dropped.store(true, Ordering::Release);
        guard
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.inner.name)
            .field("db", &self.inner.core.id)
            .finish()
    }
}

/// Check a collection config and compile its schema
pub(crate) fn prepare_collection(config: &CollectionConfig) -> Result<Schema> {
    validate_name(&config.name)?;
    let schema = Schema::compile(config.schema.clone())?;
    schema.require_id()?;
    Ok(schema)
}

/// Persisted form of a freshly registered collection
pub(crate) fn collection_meta(name: &str, schema: &Schema) -> Result<CollectionMeta> {
    Ok(CollectionMeta {
        name: name.to_string(),
        schema: serde_json::to_string(schema.as_value())?,
        created_at: Utc::now(),
    })
}

fn validate_doc_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains('/') {
        return Err(DbError::InvalidDocument(format!(
            "invalid {ID_FIELD}: {id:?}"
        )));
    }
    Ok(())
}
