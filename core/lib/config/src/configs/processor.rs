// Built-in uses
use std::time::Duration;
// External uses
use serde::Deserialize;
// Local uses
use crate::envy_load;

/// Configuration of the decoded-invocation processor.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Whether invocations of functions outside the known Safe interface
    /// are marked processed (without any state effect) or left pending.
    #[serde(default = "ProcessorConfig::default_mark_unknown_as_processed")]
    pub mark_unknown_as_processed: bool,
    /// How many pending invocations are pulled per processing round.
    #[serde(default = "ProcessorConfig::default_batch_size")]
    pub batch_size: usize,
    /// How often the processor polls the ledger for pending invocations.
    /// Value in milliseconds.
    #[serde(default = "ProcessorConfig::default_poll_interval")]
    pub poll_interval: u64,
}

impl ProcessorConfig {
    pub fn from_env() -> Self {
        envy_load!("processor", "PROCESSOR_")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }

    fn default_mark_unknown_as_processed() -> bool {
        true
    }

    fn default_batch_size() -> usize {
        500
    }

    fn default_poll_interval() -> u64 {
        2_000
    }
}
