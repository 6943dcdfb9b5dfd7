//! # Weft Thread
//!
//! Thread identity primitives for the Weft distributed database.
//!
//! This crate provides:
//! - **Thread IDs**: self-describing `<version><variant><payload>` identifiers
//!   with multibase text forms
//! - **Thread addresses**: thread IDs embedded in peer multiaddrs
//! - **Keys**: thread service/read keys and ed25519 log keys
//! - **Thread info**: the keys, logs and addresses of a thread
//!
//! ## Example
//!
//! ```rust
//! use weft_thread::{ThreadId, Variant};
//!
//! let id = ThreadId::new_random();
//! let text = id.to_string();
//!
//! let parsed: ThreadId = text.parse().unwrap();
//! assert_eq!(parsed, id);
//! assert_eq!(parsed.variant(), Variant::Random);
//! ```

pub mod addr;
pub mod error;
pub mod id;
pub mod info;
pub mod keys;

pub use addr::{ThreadAddr, PROTOCOL_CODE, PROTOCOL_NAME};
pub use error::{Result, ThreadError};
pub use id::{ThreadId, Variant, Version, DEFAULT_BASE};
pub use info::{LogId, LogInfo, ThreadInfo};
pub use keys::{generate_log_key, SymmetricKey, ThreadKey};

pub use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
pub use multiaddr::Multiaddr;
pub use multibase::Base;
