//! Basic usage example for Weft databases
//!
//! This example demonstrates:
//! - Creating a database bound to a thread ID
//! - Registering a collection with a JSON schema
//! - Creating, saving, finding and deleting documents
//! - Reading the thread log the database appends to
//!
//! Run with: cargo run --example basic_usage

use serde_json::json;
use std::sync::Arc;
use weft_db::{CollectionConfig, Context, Manager, NewDbOptions};
use weft_net::{LocalNetwork, NetConfig};
use weft_store::MemoryDatastore;
use weft_thread::ThreadId;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("🧵 Weft - Basic Usage Example\n");

    // Clones of a memory datastore share their contents
    let store = MemoryDatastore::new();
    let logstore = MemoryDatastore::new();
    let net_config = NetConfig::default().with_host_addr_str("/ip4/127.0.0.1/tcp/4006")?;

    let network = Arc::new(LocalNetwork::new(Arc::new(logstore.clone()), net_config.clone()));
    let manager = Manager::new(Arc::new(store.clone()), network);
    let ctx = Context::background();

    // ==================== Database ====================

    let id = ThreadId::new_random();
    println!("📦 Creating database 'address-book'...");
    println!("   ID:  {}", id);
    println!("   DID: {}", id.did());
    let db = manager
        .new_db(&ctx, &id, NewDbOptions::default().with_name("address-book"))
        .await?;

    let info = db.info(&ctx).await?;
    for addr in &info.addrs {
        println!("   Join at: {}", addr);
    }

    // ==================== Collection ====================

    println!("\n📋 Registering collection 'Person'...");
    let people = db
        .new_collection(
            &ctx,
            CollectionConfig::new(
                "Person",
                json!({
                    "type": "object",
                    "required": ["_id", "name", "age"],
                    "properties": {
                        "_id": {"type": "string"},
                        "name": {"type": "string"},
                        "age": {"type": "integer", "minimum": 0}
                    },
                    "additionalProperties": false
                }),
            ),
        )
        .await?;

    // ==================== Documents ====================

    println!("\n📤 Creating documents...");
    let ids = people
        .create_many(
            &ctx,
            vec![
                json!({"name": "Alice", "age": 30}),
                json!({"name": "Bob", "age": 41}),
            ],
        )
        .await?;
    for id in &ids {
        println!("   ✅ Created {}", id);
    }

    println!("\n🚫 Creating an invalid document...");
    match people.create(&ctx, json!({"name": "Eve", "age": "unknown"})).await {
        Ok(id) => println!("   ⚠️  Unexpectedly created {}", id),
        Err(e) => println!("   ✅ Rejected: {}", e),
    }

    println!("\n✏️  Updating Alice...");
    let mut alice = people.find_by_id(&ctx, &ids[0]).await?;
    alice["age"] = json!(31);
    people.save(&ctx, alice).await?;

    println!("\n🗑️  Deleting Bob...");
    people.delete(&ctx, &ids[1]).await?;

    println!("\n📋 Remaining documents:");
    for doc in people.find_all(&ctx).await? {
        println!("   - {}", doc);
    }

    // ==================== Thread log ====================

    // Closing drains the log writer, so every event is on the thread log
    manager.close().await?;

    println!("\n🧾 Thread log after reopening:");
    let network = Arc::new(LocalNetwork::new(Arc::new(logstore), net_config));
    let manager = Manager::new(Arc::new(store), network);
    let db = manager.get_db(&ctx, &id).await?;
    for event in db.events(&ctx).await? {
        println!("   {:?} {}/{}", event.action, event.collection, event.id);
    }
    manager.close().await?;

    println!("\n✨ Done");
    Ok(())
}
