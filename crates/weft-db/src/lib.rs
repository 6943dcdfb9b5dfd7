//! # Weft DB
//!
//! Document databases bound to threads, and the manager that owns their
//! lifecycle.
//!
//! This crate provides:
//! - **Manager**: create, hydrate, list and delete databases with crash-consistent recovery
//! - **Databases**: named sets of collections, each bound to one thread
//! - **Collections**: JSON documents validated against a JSON schema subset
//! - **Context**: cancellation and deadlines for every store and network call
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                Manager                  │
//! ├─────────────────────────────────────────┤
//! │      Database      │    Log writer      │
//! ├────────────────────┼────────────────────┤
//! │  Collection/Schema │      Network       │
//! ├────────────────────┴────────────────────┤
//! │               Datastore                 │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use weft_db::{Context, Manager, NewDbOptions};
//! use weft_net::{LocalNetwork, NetConfig};
//! use weft_store::MemoryDatastore;
//! use weft_thread::ThreadId;
//!
//! let network = Arc::new(LocalNetwork::new(Arc::new(MemoryDatastore::new()), NetConfig::default()));
//! let manager = Manager::new(Arc::new(MemoryDatastore::new()), network);
//!
//! let ctx = Context::background();
//! let db = manager.new_db(&ctx, &ThreadId::new_random(), NewDbOptions::default()).await?;
//! ```

mod collection;
mod context;
mod db;
mod error;
mod layout;
mod manager;
mod options;
mod schema;

pub use collection::{Action, Collection, LogEvent, ID_FIELD};
pub use context::Context;
pub use db::{Database, DbInfo, DbState};
pub use error::{DbError, Result};
pub use manager::Manager;
pub use options::{CollectionConfig, ManagerConfig, NewDbOptions};
pub use schema::Schema;
