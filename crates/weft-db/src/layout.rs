//! Persisted layout of databases in the manager store
//!
//! ```text
//! /db/<thread id>/meta                  DbMeta (dag-cbor)
//! /db/<thread id>/schema/<collection>   CollectionMeta (dag-cbor)
//! /db/<thread id>/doc/<collection>/<id> document JSON
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_store::Key;
use weft_thread::ThreadId;

const DBS: &str = "db";
const META: &str = "meta";
const SCHEMA: &str = "schema";
const DOC: &str = "doc";

/// Root of all database keys
pub(crate) fn dbs_root() -> Key {
    Key::new(DBS)
}

/// Every key of one database
pub(crate) fn db_prefix(id: &ThreadId) -> Key {
    dbs_root().child(id.to_string())
}

pub(crate) fn meta_key(id: &ThreadId) -> Key {
    db_prefix(id).child(META)
}

pub(crate) fn schema_prefix(id: &ThreadId) -> Key {
    db_prefix(id).child(SCHEMA)
}

pub(crate) fn schema_key(id: &ThreadId, collection: &str) -> Key {
    schema_prefix(id).child(collection)
}

/// Every document of one collection
pub(crate) fn doc_prefix(id: &ThreadId, collection: &str) -> Key {
    db_prefix(id).child(DOC).child(collection)
}

pub(crate) fn doc_key(id: &ThreadId, collection: &str, doc_id: &str) -> Key {
    doc_prefix(id, collection).child(doc_id)
}

/// Database ID from a `/db/<id>/meta` key
pub(crate) fn id_from_meta_key(key: &Key) -> Option<ThreadId> {
    let mut segments = key.segments();
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(DBS), Some(id), Some(META), None) => id.parse().ok(),
        _ => None,
    }
}

/// Persisted database metadata; its presence marks a committed database
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct DbMeta {
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbMeta {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            created_at: Utc::now(),
        }
    }
}

/// Persisted collection registration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct CollectionMeta {
    pub name: String,
    /// Schema as JSON text
    pub schema: String,
    pub created_at: DateTime<Utc>,
}
