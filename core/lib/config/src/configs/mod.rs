// Public re-exports
pub use self::{
    db::DbConfig, eth_client::EthClientConfig, eth_watch::EthWatchConfig,
    indexer::IndexerConfig, processor::ProcessorConfig,
};

pub mod db;
pub mod eth_client;
pub mod eth_watch;
pub mod indexer;
pub mod processor;

#[cfg(test)]
pub(crate) mod test_utils;

/// Convenience macro that loads the structure from the environment variable given the prefix.
///
/// # Panics
///
/// Panics if the config cannot be loaded from the environment variables.
#[macro_export]
macro_rules! envy_load {
    ($name:expr, $prefix:expr) => {
        envy::prefixed($prefix)
            .from_env()
            .unwrap_or_else(|err| panic!("Cannot load config <{}>: {}", $name, err))
    };
}
