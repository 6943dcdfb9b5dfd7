//! Restart recovery example
//!
//! This example demonstrates:
//! - Persisting databases to journal files
//! - Hydrating a database, its collections and documents after a restart
//! - Deleting a database so it stays gone after the next restart
//!
//! Run with: cargo run --example restart_recovery

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use weft_db::{CollectionConfig, Context, Manager, NewDbOptions};
use weft_net::{LocalNetwork, NetConfig, Network};
use weft_store::{Datastore, FileDatastore};
use weft_thread::ThreadId;

struct Node {
    eventstore: Arc<FileDatastore>,
    logstore: Arc<FileDatastore>,
    network: Arc<LocalNetwork>,
    manager: Manager,
}

impl Node {
    async fn start(dir: &Path) -> anyhow::Result<Self> {
        let eventstore = Arc::new(FileDatastore::open(dir.join("eventstore.journal")).await?);
        let logstore = Arc::new(FileDatastore::open(dir.join("logstore.journal")).await?);
        let network = Arc::new(LocalNetwork::new(logstore.clone(), NetConfig::default()));
        let manager = Manager::new(eventstore.clone(), network.clone());
        Ok(Self {
            eventstore,
            logstore,
            network,
            manager,
        })
    }

    async fn stop(self) -> anyhow::Result<()> {
        self.manager.close().await?;
        self.network.close().await?;
        self.eventstore.close().await?;
        self.logstore.close().await?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("🧵 Weft - Restart Recovery Example\n");

    let dir = tempfile::tempdir()?;
    let ctx = Context::background();
    let id = ThreadId::new_random();

    // ==================== First run ====================

    println!("▶️  First run: creating database {}", id);
    let node = Node::start(dir.path()).await?;
    let db = node
        .manager
        .new_db(
            &ctx,
            &id,
            NewDbOptions::default().with_name("inventory").with_collection(CollectionConfig::new(
                "Item",
                json!({
                    "type": "object",
                    "required": ["_id", "sku"],
                    "properties": {
                        "_id": {"type": "string"},
                        "sku": {"type": "string", "minLength": 3},
                        "count": {"type": "integer", "minimum": 0}
                    }
                }),
            )),
        )
        .await?;

    let items = db
        .get_collection("Item")
        .ok_or_else(|| anyhow::anyhow!("collection missing"))?;
    items
        .create_many(
            &ctx,
            vec![
                json!({"_id": "bolt", "sku": "B-100", "count": 250}),
                json!({"_id": "nut", "sku": "N-200", "count": 400}),
            ],
        )
        .await?;
    println!("   ✅ Stored 2 items");
    node.stop().await?;

    // ==================== Second run ====================

    println!("\n🔁 Second run: hydrating from disk");
    let node = Node::start(dir.path()).await?;
    let db = node.manager.get_db(&ctx, &id).await?;
    println!("   Name: {}", db.name().unwrap_or("<unnamed>"));
    for collection in db.list_collections() {
        let docs = collection.find_all(&ctx).await?;
        println!("   📋 {} ({} documents)", collection.name(), docs.len());
        for doc in docs {
            println!("      - {}", doc);
        }
    }

    println!("\n🗑️  Deleting database");
    node.manager.delete_db(&ctx, &id).await?;
    node.stop().await?;

    // ==================== Third run ====================

    println!("\n🔁 Third run: the database stays deleted");
    let node = Node::start(dir.path()).await?;
    match node.manager.get_db(&ctx, &id).await {
        Ok(_) => println!("   ⚠️  Database unexpectedly present"),
        Err(e) if e.is_not_found() => println!("   ✅ {}", e),
        Err(e) => return Err(e.into()),
    }
    node.stop().await?;

    println!("\n✨ Done");
    Ok(())
}
