//! Thread and log metadata

use crate::{keys::ThreadKey, Result, ThreadError, ThreadId};
use cid::Cid;
use ed25519_dalek::{SigningKey, VerifyingKey};
use multiaddr::Multiaddr;
use multibase::Base;
use multihash::Multihash;
use multihash_codetable::{Code, MultihashDigest};
use std::fmt;
use std::str::FromStr;

/// Identity of a single log: the sha2-256 multihash of its public key
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogId(Vec<u8>);

impl LogId {
    /// Derive from a log's public key
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        Self(Code::Sha2_256.digest(key.as_bytes()).to_bytes())
    }

    /// Parse the multihash bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Multihash::<64>::from_bytes(bytes)
            .map_err(|e| ThreadError::InvalidKey(format!("log id: {}", e)))?;
        Ok(Self(bytes.to_vec()))
    }

    /// Get the multihash bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&multibase::encode(Base::Base58Btc, &self.0))
    }
}

impl fmt::Debug for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogId({})", self)
    }
}

impl FromStr for LogId {
    type Err = ThreadError;

    fn from_str(s: &str) -> Result<Self> {
        let (_, bytes) = multibase::decode(s)?;
        Self::from_bytes(&bytes)
    }
}

/// Keys, addresses and head of one log
#[derive(Clone, Debug)]
pub struct LogInfo {
    /// Log identity
    pub id: LogId,
    /// Public key records are verified with
    pub pub_key: VerifyingKey,
    /// Private key; only present for logs this node authors
    pub priv_key: Option<SigningKey>,
    /// Addresses the log can be fetched from
    pub addrs: Vec<Multiaddr>,
    /// Latest record
    pub head: Option<Cid>,
    /// Created or added directly by this host
    pub managed: bool,
}

impl LogInfo {
    /// A log authored by this node
    pub fn new_managed(key: SigningKey) -> Self {
        let pub_key = key.verifying_key();
        Self {
            id: LogId::from_public_key(&pub_key),
            pub_key,
            priv_key: Some(key),
            addrs: Vec::new(),
            head: None,
            managed: true,
        }
    }

    /// A log observed from another peer
    pub fn external(pub_key: VerifyingKey, addrs: Vec<Multiaddr>) -> Self {
        Self {
            id: LogId::from_public_key(&pub_key),
            pub_key,
            priv_key: None,
            addrs,
            head: None,
            managed: false,
        }
    }

    /// Whether this node holds the private key
    pub fn is_own(&self) -> bool {
        self.priv_key.is_some()
    }
}

/// Everything known about a thread: key, logs and addresses
#[derive(Clone, Debug)]
pub struct ThreadInfo {
    /// Thread identity
    pub id: ThreadId,
    /// Thread key
    pub key: ThreadKey,
    /// Logs, sorted by ID
    pub logs: Vec<LogInfo>,
    /// Addresses the thread is reachable at
    pub addrs: Vec<Multiaddr>,
}

impl ThreadInfo {
    /// First log this node holds a private key for
    pub fn own_log(&self) -> Option<&LogInfo> {
        self.logs.iter().find(|log| log.is_own())
    }

    /// Logs created or added directly by this host
    pub fn managed_logs(&self) -> impl Iterator<Item = &LogInfo> {
        self.logs.iter().filter(|log| log.managed)
    }

    /// Look up a log by ID
    pub fn log(&self, id: &LogId) -> Option<&LogInfo> {
        self.logs.iter().find(|log| &log.id == id)
    }

    /// Current head of every log that has one
    pub fn heads(&self) -> Vec<(LogId, Cid)> {
        self.logs
            .iter()
            .filter_map(|log| log.head.map(|head| (log.id.clone(), head)))
            .collect()
    }
}
