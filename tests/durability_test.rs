//! Restart and recovery tests
//!
//! Every node here keeps its state in journal files, and a restart opens new
//! stores, a new network and a new manager over the same files.

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use weft_db::{Action, CollectionConfig, Context, DbError, DbState, Manager, NewDbOptions};
use weft_net::{LocalNetwork, NetConfig, Network};
use weft_store::{Datastore, FileDatastore};
use weft_thread::ThreadId;

/// One node's stores, network and manager
struct Node {
    eventstore: Arc<FileDatastore>,
    logstore: Arc<FileDatastore>,
    network: Arc<LocalNetwork>,
    manager: Manager,
}

impl Node {
    async fn open(dir: &Path) -> Self {
        let eventstore = Arc::new(FileDatastore::open(dir.join("eventstore.journal")).await.unwrap());
        let logstore = Arc::new(FileDatastore::open(dir.join("logstore.journal")).await.unwrap());
        let network = Arc::new(LocalNetwork::new(logstore.clone(), NetConfig::default()));
        let manager = Manager::new(eventstore.clone(), network.clone());
        Self {
            eventstore,
            logstore,
            network,
            manager,
        }
    }

    async fn close(self) {
        self.manager.close().await.unwrap();
        self.network.close().await.unwrap();
        self.eventstore.close().await.unwrap();
        self.logstore.close().await.unwrap();
    }
}

fn person_collection() -> CollectionConfig {
    CollectionConfig::new(
        "Person",
        json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "$ref": "#/definitions/person",
            "definitions": {
                "person": {
                    "required": ["_id", "name", "age"],
                    "properties": {
                        "_id": {"type": "string"},
                        "name": {"type": "string"},
                        "age": {"type": "integer"}
                    },
                    "additionalProperties": false,
                    "type": "object"
                }
            }
        }),
    )
}

fn person(name: &str, age: u32) -> Value {
    json!({"_id": "", "name": name, "age": age})
}

#[test_log::test(tokio::test)]
async fn test_db_survives_restart() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::background();
    let id = ThreadId::new_random();

    let node = Node::open(dir.path()).await;
    let db = node
        .manager
        .new_db(&ctx, &id, NewDbOptions::default())
        .await
        .unwrap();
    let people = db.new_collection(&ctx, person_collection()).await.unwrap();
    people.create(&ctx, person("Alice", 30)).await.unwrap();
    node.close().await;

    let node = Node::open(dir.path()).await;
    let db = node.manager.get_db(&ctx, &id).await.unwrap();
    let people = db
        .get_collection("Person")
        .expect("collection restored without re-registration");

    let ids = people
        .create_many(&ctx, vec![person("Bob", 40), person("Carol", 50)])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);
    assert_eq!(people.find_all(&ctx).await.unwrap().len(), 3);
    node.close().await;
}

#[test_log::test(tokio::test)]
async fn test_deleted_db_stays_deleted_after_restart() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::background();
    let id = ThreadId::new_random();

    let node = Node::open(dir.path()).await;
    let db = node
        .manager
        .new_db(&ctx, &id, NewDbOptions::default().with_collection(person_collection()))
        .await
        .unwrap();
    db.get_collection("Person")
        .unwrap()
        .create(&ctx, person("Alice", 30))
        .await
        .unwrap();
    node.close().await;

    let node = Node::open(dir.path()).await;
    node.manager.delete_db(&ctx, &id).await.unwrap();
    node.close().await;

    let node = Node::open(dir.path()).await;
    let err = node.manager.get_db(&ctx, &id).await.unwrap_err();
    assert!(matches!(err, DbError::ThreadNotFound(ref got) if *got == id), "{err}");
    assert!(node.network.thread_ids().await.unwrap().is_empty());
    assert!(node.eventstore.is_empty());
    node.close().await;
}

#[tokio::test]
async fn test_get_db_never_created_is_not_found() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::background();

    let node = Node::open(dir.path()).await;
    let err = node
        .manager
        .get_db(&ctx, &ThreadId::new_random())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
    node.close().await;
}

#[tokio::test]
async fn test_log_events_survive_restart() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::background();
    let id = ThreadId::new_random();

    let node = Node::open(dir.path()).await;
    let db = node
        .manager
        .new_db(&ctx, &id, NewDbOptions::default().with_collection(person_collection()))
        .await
        .unwrap();
    let people = db.get_collection("Person").unwrap();
    let alice = people.create(&ctx, person("Alice", 30)).await.unwrap();
    people
        .save(&ctx, json!({"_id": &alice, "name": "Alice", "age": 31}))
        .await
        .unwrap();
    people.delete(&ctx, &alice).await.unwrap();
    node.close().await;

    let node = Node::open(dir.path()).await;
    let db = node.manager.get_db(&ctx, &id).await.unwrap();
    let actions: Vec<Action> = db
        .events(&ctx)
        .await
        .unwrap()
        .iter()
        .map(|event| event.action)
        .collect();
    assert_eq!(actions, vec![Action::Create, Action::Save, Action::Delete]);
    node.close().await;
}

#[tokio::test]
async fn test_list_and_names_after_restart() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::background();

    let node = Node::open(dir.path()).await;
    let first = ThreadId::new_random();
    let second = ThreadId::new_random();
    node.manager
        .new_db(&ctx, &first, NewDbOptions::default().with_name("first-db"))
        .await
        .unwrap();
    node.manager
        .new_db(&ctx, &second, NewDbOptions::default())
        .await
        .unwrap();
    node.close().await;

    let node = Node::open(dir.path()).await;
    let dbs = node.manager.list_dbs(&ctx).await.unwrap();
    assert_eq!(dbs.len(), 2);
    assert!(dbs.iter().all(|db| db.state() == DbState::Open));

    let named = dbs.iter().find(|db| db.id() == &first).unwrap();
    assert_eq!(named.name(), Some("first-db"));
    let unnamed = dbs.iter().find(|db| db.id() == &second).unwrap();
    assert_eq!(unnamed.name(), None);
    node.close().await;
}

#[tokio::test]
async fn test_create_many_failure_persists_nothing() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::background();
    let id = ThreadId::new_random();

    let node = Node::open(dir.path()).await;
    let db = node
        .manager
        .new_db(&ctx, &id, NewDbOptions::default().with_collection(person_collection()))
        .await
        .unwrap();
    let result = db
        .get_collection("Person")
        .unwrap()
        .create_many(
            &ctx,
            vec![
                person("Alice", 30),
                json!({"_id": "", "name": "Bob", "age": 40, "extra": true}),
            ],
        )
        .await;
    assert!(matches!(result, Err(DbError::SchemaValidation(_))));
    node.close().await;

    let node = Node::open(dir.path()).await;
    let db = node.manager.get_db(&ctx, &id).await.unwrap();
    let people = db.get_collection("Person").unwrap();
    assert!(people.find_all(&ctx).await.unwrap().is_empty());
    assert!(db.events(&ctx).await.unwrap().is_empty());
    node.close().await;
}
