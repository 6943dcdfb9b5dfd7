//! Network configuration

use crate::{NetError, Result};
use weft_thread::Multiaddr;

/// Network configuration
#[derive(Clone, Debug, Default)]
pub struct NetConfig {
    /// Addresses this host is reachable at; thread addresses are built from these
    pub host_addrs: Vec<Multiaddr>,
}

impl NetConfig {
    /// Create a config with the given host addresses
    pub fn new(host_addrs: Vec<Multiaddr>) -> Self {
        Self { host_addrs }
    }

    /// Add a host address
    pub fn with_host_addr(mut self, addr: Multiaddr) -> Self {
        self.host_addrs.push(addr);
        self
    }

    /// Parse and add a host address
    pub fn with_host_addr_str(self, addr: &str) -> Result<Self> {
        let addr = addr
            .parse::<Multiaddr>()
            .map_err(|e| NetError::Config(format!("host address {}: {}", addr, e)))?;
        Ok(self.with_host_addr(addr))
    }
}
