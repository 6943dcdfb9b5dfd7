//! Stores, network and manager opened over a data directory

use crate::config::CliConfig;
use std::sync::Arc;
use tracing::{debug, info};
use weft_db::Manager;
use weft_net::{LocalNetwork, Network};
use weft_store::{Datastore, FileDatastore};

/// Everything a command needs
pub struct AppState {
    /// CLI configuration
    pub config: CliConfig,
    /// Database journal
    pub eventstore: Arc<FileDatastore>,
    /// Thread log journal
    pub logstore: Arc<FileDatastore>,
    /// Single-node network over the log journal
    pub network: Arc<LocalNetwork>,
    /// Database manager
    pub manager: Manager,
}

impl AppState {
    /// Open both journals and build the manager
    pub async fn open(config: CliConfig) -> anyhow::Result<Self> {
        let net_config = config.net_config()?;

        let eventstore = Arc::new(FileDatastore::open(config.eventstore_path()).await?);
        let logstore = Arc::new(FileDatastore::open(config.logstore_path()).await?);
        debug!(
            entries = eventstore.len(),
            log_entries = logstore.len(),
            "Opened journals"
        );

        let network = Arc::new(LocalNetwork::new(logstore.clone(), net_config));
        let manager = Manager::new(eventstore.clone(), network.clone());

        info!(data_dir = %config.data_dir.display(), "Opened data directory");
        Ok(Self {
            config,
            eventstore,
            logstore,
            network,
            manager,
        })
    }

    /// Close the manager, then the network, then both journals
    pub async fn close(self) -> anyhow::Result<()> {
        self.manager.close().await?;
        self.network.close().await?;
        self.eventstore.close().await?;
        self.logstore.close().await?;
        Ok(())
    }
}
