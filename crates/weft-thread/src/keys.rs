//! Thread and log keys
//!
//! Every thread carries a [`ThreadKey`]:
//! - the *service* key authenticates log records to network peers
//! - the *read* key (optional) gives access to record contents
//!
//! Every log is owned by an ed25519 key pair; the log ID is derived from the
//! public half.

use crate::{Result, ThreadError};
use ed25519_dalek::SigningKey;
use multibase::Base;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a symmetric key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// A 256-bit symmetric key
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    key: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Create a key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(ThreadError::InvalidKey(format!(
                "symmetric key must be {} bytes, got {}",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Service key plus optional read key for one thread
#[derive(Clone, PartialEq, Eq)]
pub struct ThreadKey {
    service: SymmetricKey,
    read: Option<SymmetricKey>,
}

impl ThreadKey {
    /// Build from parts
    pub fn new(service: SymmetricKey, read: Option<SymmetricKey>) -> Self {
        Self { service, read }
    }

    /// Generate a full key (service and read)
    pub fn generate() -> Self {
        Self {
            service: SymmetricKey::generate(),
            read: Some(SymmetricKey::generate()),
        }
    }

    /// Generate a key that can follow a thread but not read it
    pub fn generate_service_only() -> Self {
        Self {
            service: SymmetricKey::generate(),
            read: None,
        }
    }

    /// Get the service key
    pub fn service(&self) -> &SymmetricKey {
        &self.service
    }

    /// Get the read key, if present
    pub fn read(&self) -> Option<&SymmetricKey> {
        self.read.as_ref()
    }

    /// Whether record contents can be read with this key
    pub fn can_read(&self) -> bool {
        self.read.is_some()
    }

    /// Raw form: service key, followed by the read key when present
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 * KEY_SIZE);
        out.extend_from_slice(self.service.as_bytes());
        if let Some(read) = &self.read {
            out.extend_from_slice(read.as_bytes());
        }
        out
    }

    /// Parse the raw form (32 or 64 bytes)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            KEY_SIZE => Ok(Self {
                service: SymmetricKey::from_bytes(bytes)?,
                read: None,
            }),
            len if len == 2 * KEY_SIZE => Ok(Self {
                service: SymmetricKey::from_bytes(&bytes[..KEY_SIZE])?,
                read: Some(SymmetricKey::from_bytes(&bytes[KEY_SIZE..])?),
            }),
            len => Err(ThreadError::InvalidKey(format!(
                "thread key must be {} or {} bytes, got {}",
                KEY_SIZE,
                2 * KEY_SIZE,
                len
            ))),
        }
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&multibase::encode(Base::Base32Lower, self.to_bytes()))
    }
}

impl fmt::Debug for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadKey")
            .field("can_read", &self.can_read())
            .finish_non_exhaustive()
    }
}

impl FromStr for ThreadKey {
    type Err = ThreadError;

    fn from_str(s: &str) -> Result<Self> {
        let (_, bytes) = multibase::decode(s)?;
        Self::from_bytes(&bytes)
    }
}

/// Generate a fresh ed25519 key for a log this node will author
pub fn generate_log_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}
