// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

/// Per-stream block-window limits for the range indexers.
///
/// Trace windows are kept much smaller than log windows: a single
/// `trace_filter` response carries full call trees and is orders of
/// magnitude heavier than an `eth_getLogs` response over the same range.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IndexerConfig {
    #[serde(default = "IndexerConfig::default_internal_txs_block_process_limit")]
    pub internal_txs_block_process_limit: u64,
    #[serde(default = "IndexerConfig::default_events_block_process_limit")]
    pub events_block_process_limit: u64,
    #[serde(default = "IndexerConfig::default_proxy_factory_block_process_limit")]
    pub proxy_factory_block_process_limit: u64,
    /// How many monitored addresses are grouped into one indexing step.
    #[serde(default = "IndexerConfig::default_address_batch_size")]
    pub address_batch_size: usize,
}

impl IndexerConfig {
    pub fn from_env() -> Self {
        envy_load!("indexer", "INDEXER_")
    }

    fn default_internal_txs_block_process_limit() -> u64 {
        10_000
    }

    fn default_events_block_process_limit() -> u64 {
        50_000
    }

    fn default_proxy_factory_block_process_limit() -> u64 {
        50_000
    }

    fn default_address_batch_size() -> usize {
        500
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::test_utils::set_env;

    fn expected_config() -> IndexerConfig {
        IndexerConfig {
            internal_txs_block_process_limit: 5_000,
            events_block_process_limit: 20_000,
            proxy_factory_block_process_limit: 50_000,
            address_batch_size: 100,
        }
    }

    #[test]
    fn from_env() {
        let config = r#"
INDEXER_INTERNAL_TXS_BLOCK_PROCESS_LIMIT="5000"
INDEXER_EVENTS_BLOCK_PROCESS_LIMIT="20000"
INDEXER_ADDRESS_BATCH_SIZE="100"
        "#;
        set_env(config);

        let actual = IndexerConfig::from_env();
        assert_eq!(actual, expected_config());
    }
}
