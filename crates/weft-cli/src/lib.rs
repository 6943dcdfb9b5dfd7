//! # Weft CLI
//!
//! Operate Weft databases stored in a local data directory.
//!
//! This crate provides:
//! - **Thread IDs**: generate random or key-derived IDs and inspect encoded ones
//! - **Databases**: create, list, inspect and delete
//! - **Collections and documents**: register schemas and insert or list documents
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             weft (commands)             │
//! ├─────────────────────────────────────────┤
//! │               weft-db                   │
//! ├────────────────────┬────────────────────┤
//! │ eventstore.journal │ LocalNetwork       │
//! │                    │ logstore.journal   │
//! └────────────────────┴────────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod state;

pub use commands::{run, run_id, Command};
pub use config::CliConfig;
pub use state::AppState;
