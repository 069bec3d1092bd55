// Built-in uses
use std::time::Duration;
// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

/// Configuration of the chain-watching policy shared by all indexers.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EthWatchConfig {
    /// Amount of confirmations a block needs before its data is indexed.
    /// Acts as the reorg safety window: cursors never advance past
    /// `chain_tip - reorg_blocks`.
    #[serde(default = "EthWatchConfig::default_reorg_blocks")]
    pub reorg_blocks: u64,
    /// How often the indexers poll the Ethereum node.
    /// Value in milliseconds.
    #[serde(default = "EthWatchConfig::default_poll_interval")]
    pub poll_interval: u64,
    /// L2 networks have no tracing support: the internal-tx indexer is
    /// disabled and Safes are discovered through events only.
    #[serde(default)]
    pub l2_network: bool,
}

impl EthWatchConfig {
    pub fn from_env() -> Self {
        envy_load!("eth_watch", "ETH_")
    }

    /// Converts `self.poll_interval` into `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    fn default_reorg_blocks() -> u64 {
        10
    }

    fn default_poll_interval() -> u64 {
        5_000
    }
}
