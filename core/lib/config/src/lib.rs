//! Environment-driven configuration for the Safe history service.
//!
//! Every config section is a plain `Deserialize` struct loaded from
//! prefixed environment variables, one `from_env()` constructor per
//! section. The service's composition root loads the whole
//! `SafeHistoryConfig` once and passes the parts down explicitly.

pub mod configs;

pub use configs::{
    DbConfig, EthClientConfig, EthWatchConfig, IndexerConfig, ProcessorConfig,
};

/// Aggregated configuration of the whole service.
#[derive(Debug, Clone, PartialEq)]
pub struct SafeHistoryConfig {
    pub eth_client: EthClientConfig,
    pub eth_watch: EthWatchConfig,
    pub indexer: IndexerConfig,
    pub processor: ProcessorConfig,
    pub db: DbConfig,
}

impl SafeHistoryConfig {
    pub fn from_env() -> Self {
        Self {
            eth_client: EthClientConfig::from_env(),
            eth_watch: EthWatchConfig::from_env(),
            indexer: IndexerConfig::from_env(),
            processor: ProcessorConfig::from_env(),
            db: DbConfig::from_env(),
        }
    }
}
