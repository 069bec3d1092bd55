// External uses
use serde::Deserialize;
use url::Url;
// Local uses
use crate::envy_load;

/// Configuration for the Ethereum JSON-RPC endpoints.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EthClientConfig {
    /// Address of the full Ethereum node.
    pub node_url: Url,
    /// Address of a tracing-capable Ethereum node (`trace_filter`,
    /// `trace_transaction`). May be the same as `node_url`.
    pub tracing_node_url: Option<Url>,
    /// Amount of independent `eth_call`s packed into one batched request.
    #[serde(default = "EthClientConfig::default_rpc_batch_size")]
    pub rpc_batch_size: usize,
    /// Deadline for a single RPC request, in seconds.
    #[serde(default = "EthClientConfig::default_request_timeout")]
    pub request_timeout: u64,
}

impl EthClientConfig {
    pub fn from_env() -> Self {
        envy_load!("eth_client", "ETHEREUM_")
    }

    /// The URL traces are requested from. Falls back to the regular node
    /// when no dedicated tracing node is configured.
    pub fn tracing_node_url(&self) -> &Url {
        self.tracing_node_url.as_ref().unwrap_or(&self.node_url)
    }

    fn default_rpc_batch_size() -> usize {
        500
    }

    fn default_request_timeout() -> u64 {
        30
    }
}
