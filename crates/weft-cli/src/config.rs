//! CLI configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use weft_db::Context;
use weft_net::NetConfig;

/// Journal holding databases, collections and documents
pub const EVENTSTORE_FILE: &str = "eventstore.journal";
/// Journal holding thread keys, logs and records
pub const LOGSTORE_FILE: &str = "logstore.journal";

/// Command line configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CliConfig {
    /// Directory holding both journals
    pub data_dir: PathBuf,
    /// Multiaddrs this host is reachable at
    pub host_addrs: Vec<String>,
    /// Per-command timeout (seconds)
    pub timeout_secs: Option<u64>,
    /// Enable debug logging
    pub debug: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".weft"),
            host_addrs: Vec::new(),
            timeout_secs: None,
            debug: false,
        }
    }
}

impl CliConfig {
    /// Use the given data directory
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Add a host address
    pub fn with_host_addr(mut self, addr: impl Into<String>) -> Self {
        self.host_addrs.push(addr.into());
        self
    }

    /// Path of the database journal
    pub fn eventstore_path(&self) -> PathBuf {
        self.data_dir.join(EVENTSTORE_FILE)
    }

    /// Path of the thread log journal
    pub fn logstore_path(&self) -> PathBuf {
        self.data_dir.join(LOGSTORE_FILE)
    }

    /// Network configuration from the host addresses
    pub fn net_config(&self) -> anyhow::Result<NetConfig> {
        let mut config = NetConfig::default();
        for addr in &self.host_addrs {
            config = config.with_host_addr_str(addr)?;
        }
        Ok(config)
    }

    /// Context for one command
    pub fn context(&self) -> Context {
        match self.timeout_secs {
            Some(secs) => Context::with_timeout(Duration::from_secs(secs)),
            None => Context::background(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let config = CliConfig::default().with_data_dir("/tmp/weft");
        assert_eq!(config.eventstore_path(), PathBuf::from("/tmp/weft/eventstore.journal"));
        assert_eq!(config.logstore_path(), PathBuf::from("/tmp/weft/logstore.journal"));
    }

    #[test]
    fn test_net_config() {
        let config = CliConfig::default().with_host_addr("/ip4/127.0.0.1/tcp/4006");
        assert_eq!(config.net_config().unwrap().host_addrs.len(), 1);

        let bad = CliConfig::default().with_host_addr("localhost:4006");
        assert!(bad.net_config().is_err());
    }
}
