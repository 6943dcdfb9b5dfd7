//! Options and configuration for the manager and its databases

use serde::{Deserialize, Serialize};

/// Configuration for a collection: its name and JSON schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection name
    pub name: String,
    /// JSON schema every document must satisfy
    pub schema: serde_json::Value,
}

impl CollectionConfig {
    /// Create a collection config
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Options for [`Manager::new_db`](crate::Manager::new_db)
#[derive(Clone, Debug, Default)]
pub struct NewDbOptions {
    /// Optional human-readable name
    pub name: Option<String>,
    /// Collections registered together with the database
    pub collections: Vec<CollectionConfig>,
}

impl NewDbOptions {
    /// Set the database name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register a collection at creation time
    pub fn with_collection(mut self, config: CollectionConfig) -> Self {
        self.collections.push(config);
        self
    }
}

/// Manager configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Capacity of each database's log event queue
    pub event_queue_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: 256,
        }
    }
}

impl ManagerConfig {
    /// Set the log event queue capacity (at least 1)
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity.max(1);
        self
    }
}

/// Validate a database or collection name
pub(crate) fn validate_name(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(crate::DbError::InvalidName("name cannot be empty".to_string()));
    }

    if name.chars().any(char::is_whitespace) {
        return Err(crate::DbError::InvalidName(format!(
            "name cannot contain whitespace: {name:?}"
        )));
    }

    if name.contains('/') {
        return Err(crate::DbError::InvalidName(format!(
            "name cannot contain '/': {name:?}"
        )));
    }

    Ok(())
}
