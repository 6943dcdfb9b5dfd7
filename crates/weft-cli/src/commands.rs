//! Command definitions and execution
//!
//! Every command produces a JSON value that `main` prints.

use crate::state::AppState;
use anyhow::Context as _;
use clap::Subcommand;
use serde_json::{json, Value};
use std::path::PathBuf;
use weft_db::{CollectionConfig, Database, NewDbOptions};
use weft_thread::{ThreadId, VerifyingKey};

/// Top-level commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate and inspect thread IDs
    #[command(subcommand)]
    Id(IdCommand),
    /// Manage databases
    #[command(subcommand)]
    Db(DbCommand),
    /// Manage collections of a database
    #[command(subcommand)]
    Collection(CollectionCommand),
    /// Manage documents of a collection
    #[command(subcommand)]
    Doc(DocCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum IdCommand {
    /// Generate a thread ID (random, or derived from an ed25519 public key)
    New {
        /// Hex-encoded 32-byte ed25519 public key
        #[arg(long)]
        pubkey: Option<String>,
    },
    /// Decode a thread ID and show its parts
    Inspect {
        /// Thread ID in any multibase encoding
        id: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DbCommand {
    /// Create a database bound to a new random thread ID
    Create {
        /// Database name (no whitespace)
        #[arg(long)]
        name: Option<String>,
    },
    /// List every database
    List,
    /// Show a database's name, thread key and addresses
    Info { id: ThreadId },
    /// Delete a database and its thread
    Delete { id: ThreadId },
}

#[derive(Subcommand, Debug, Clone)]
pub enum CollectionCommand {
    /// Register a collection
    Create {
        db: ThreadId,
        name: String,
        /// JSON schema file
        #[arg(long)]
        schema: PathBuf,
    },
    /// List collections
    List { db: ThreadId },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DocCommand {
    /// Insert documents (all or nothing)
    Create {
        db: ThreadId,
        collection: String,
        /// JSON documents
        #[arg(required = true)]
        docs: Vec<String>,
    },
    /// List every document of a collection
    List { db: ThreadId, collection: String },
}

/// Run an `id` command; needs no data directory
pub fn run_id(command: IdCommand) -> anyhow::Result<Value> {
    match command {
        IdCommand::New { pubkey: None } => Ok(describe_id(&ThreadId::new_random())),
        IdCommand::New { pubkey: Some(hex_key) } => {
            let bytes: [u8; 32] = hex::decode(hex_key.trim())
                .context("public key is not valid hex")?
                .try_into()
                .map_err(|_| anyhow::anyhow!("public key must be 32 bytes"))?;
            let key = VerifyingKey::from_bytes(&bytes).context("invalid ed25519 public key")?;
            Ok(describe_id(&ThreadId::from_public_key(&key)))
        }
        IdCommand::Inspect { id } => {
            let encoding = ThreadId::extract_encoding(&id)?;
            let parsed = ThreadId::decode(&id)?;
            let mut out = describe_id(&parsed);
            out["encoding"] = json!(format!("{encoding:?}"));
            out["payload"] = json!(hex::encode(parsed.payload()));
            Ok(out)
        }
    }
}

/// Run a command against an opened data directory
pub async fn run(state: &AppState, command: Command) -> anyhow::Result<Value> {
    let ctx = state.config.context();
    let manager = &state.manager;

    match command {
        Command::Id(command) => run_id(command),

        Command::Db(DbCommand::Create { name }) => {
            let mut opts = NewDbOptions::default();
            if let Some(name) = name {
                opts = opts.with_name(name);
            }
            let db = manager.new_db(&ctx, &ThreadId::new_random(), opts).await?;
            Ok(describe_db(&db))
        }
        Command::Db(DbCommand::List) => {
            let dbs = manager.list_dbs(&ctx).await?;
            Ok(Value::Array(dbs.iter().map(describe_db).collect()))
        }
        Command::Db(DbCommand::Info { id }) => {
            let db = manager.get_db(&ctx, &id).await?;
            let info = db.info(&ctx).await?;
            let mut out = describe_db(&db);
            out["key"] = json!(info.key.to_string());
            out["addrs"] = json!(info.addrs.iter().map(ToString::to_string).collect::<Vec<_>>());
            Ok(out)
        }
        Command::Db(DbCommand::Delete { id }) => {
            manager.delete_db(&ctx, &id).await?;
            Ok(json!({ "deleted": id.to_string() }))
        }

        Command::Collection(CollectionCommand::Create { db, name, schema }) => {
            let text = tokio::fs::read_to_string(&schema)
                .await
                .with_context(|| format!("reading schema {}", schema.display()))?;
            let schema: Value = serde_json::from_str(&text)
                .with_context(|| format!("parsing schema {}", schema.display()))?;

            let db = manager.get_db(&ctx, &db).await?;
            let collection = db
                .new_collection(&ctx, CollectionConfig::new(name, schema))
                .await?;
            Ok(json!({ "db": db.id().to_string(), "collection": collection.name() }))
        }
        Command::Collection(CollectionCommand::List { db }) => {
            let db = manager.get_db(&ctx, &db).await?;
            let collections = db
                .list_collections()
                .iter()
                .map(|c| json!({ "name": c.name(), "schema": c.schema().as_value() }))
                .collect();
            Ok(Value::Array(collections))
        }

        Command::Doc(DocCommand::Create { db, collection, docs }) => {
            let docs = docs
                .iter()
                .map(|doc| serde_json::from_str(doc).with_context(|| format!("parsing document {doc}")))
                .collect::<anyhow::Result<Vec<Value>>>()?;

            let collection = open_collection(&manager.get_db(&ctx, &db).await?, &collection)?;
            let ids = collection.create_many(&ctx, docs).await?;
            Ok(json!({ "ids": ids }))
        }
        Command::Doc(DocCommand::List { db, collection }) => {
            let collection = open_collection(&manager.get_db(&ctx, &db).await?, &collection)?;
            Ok(Value::Array(collection.find_all(&ctx).await?))
        }
    }
}

fn open_collection(db: &Database, name: &str) -> anyhow::Result<weft_db::Collection> {
    db.get_collection(name)
        .ok_or_else(|| weft_db::DbError::CollectionNotFound(name.to_string()).into())
}

fn describe_id(id: &ThreadId) -> Value {
    json!({
        "id": id.to_string(),
        "version": id.version().to_string(),
        "variant": id.variant().to_string(),
        "did": id.did(),
        "addr": id.to_addr().to_string(),
    })
}

fn describe_db(db: &Database) -> Value {
    json!({
        "id": db.id().to_string(),
        "name": db.name(),
        "created_at": db.created_at().to_rfc3339(),
        "collections": db.list_collections().iter().map(|c| c.name().to_string()).collect::<Vec<_>>(),
    })
}
