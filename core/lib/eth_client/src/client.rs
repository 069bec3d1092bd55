// Built-in deps
use std::future::Future;
use std::time::Duration;
// External deps
use anyhow::format_err;
use web3::transports::{Batch, Http};
use web3::types::{
    Block, BlockId, BlockNumber as Web3BlockNumber, CallRequest, Filter, FilterBuilder, Log,
    Trace, TraceFilterBuilder, Transaction, TransactionId, TransactionReceipt,
};
use web3::Web3;
// Workspace deps
use safe_history_basic_types::{Address, Bytes, H256};
use safe_history_config::EthClientConfig;

/// One read-only contract call inside a batched request.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub to: Address,
    pub data: Vec<u8>,
}

impl ContractCall {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self { to, data }
    }
}

/// The chain access surface consumed by the indexers, the processor and the
/// collectibles resolver.
#[async_trait::async_trait]
pub trait EthereumGateway: Send + Sync {
    async fn block_number(&self) -> anyhow::Result<u64>;

    async fn get_block(&self, number: u64) -> anyhow::Result<Option<Block<H256>>>;

    async fn get_transaction(&self, hash: H256) -> anyhow::Result<Option<Transaction>>;

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> anyhow::Result<Option<TransactionReceipt>>;

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: Option<Vec<Address>>,
        topics: Option<Vec<H256>>,
    ) -> anyhow::Result<Vec<Log>>;

    /// Traces touching the given addresses within the block range, in both
    /// directions. Requires a tracing-capable node.
    async fn trace_filter(
        &self,
        from_block: u64,
        to_block: u64,
        from_addresses: Option<Vec<Address>>,
        to_addresses: Option<Vec<Address>>,
    ) -> anyhow::Result<Vec<Trace>>;

    /// The full call tree of one transaction.
    async fn trace_transaction(&self, hash: H256) -> anyhow::Result<Vec<Trace>>;

    /// Packs independent `eth_call`s into a single request. The result
    /// preserves the submission order; failed elements come back as `None`
    /// unless `raise_on_error` turns any failure into an error of the whole
    /// batch.
    async fn batch_call(
        &self,
        calls: &[ContractCall],
        raise_on_error: bool,
    ) -> anyhow::Result<Vec<Option<Vec<u8>>>>;
}

/// HTTP JSON-RPC implementation of the gateway.
///
/// Trace methods go through a dedicated tracing node when one is configured;
/// everything else uses the regular node.
#[derive(Debug, Clone)]
pub struct EthereumClient {
    web3: Web3<Http>,
    tracing_web3: Web3<Http>,
    transport: Http,
    request_timeout: Duration,
    rpc_batch_size: usize,
}

impl EthereumClient {
    pub fn from_config(config: &EthClientConfig) -> anyhow::Result<Self> {
        let transport = Http::new(config.node_url.as_str())?;
        let tracing_transport = Http::new(config.tracing_node_url().as_str())?;

        Ok(Self {
            web3: Web3::new(transport.clone()),
            tracing_web3: Web3::new(tracing_transport),
            transport,
            request_timeout: Duration::from_secs(config.request_timeout),
            rpc_batch_size: config.rpc_batch_size.max(1),
        })
    }

    /// Applies the per-request deadline. An elapsed deadline surfaces as a
    /// regular error so the calling loop abandons the window and backs off.
    async fn deadline<T, F>(&self, future: F) -> anyhow::Result<T>
    where
        F: Future<Output = Result<T, web3::Error>> + Send,
    {
        tokio::time::timeout(self.request_timeout, future)
            .await
            .map_err(|_| format_err!("rpc request timed out after {:?}", self.request_timeout))?
            .map_err(|err| format_err!("rpc request failed: {}", err))
    }
}

fn build_filter(
    from_block: u64,
    to_block: u64,
    addresses: Option<Vec<Address>>,
    topics: Option<Vec<H256>>,
) -> Filter {
    let mut builder = FilterBuilder::default()
        .from_block(Web3BlockNumber::Number(from_block.into()))
        .to_block(Web3BlockNumber::Number(to_block.into()));
    if let Some(addresses) = addresses {
        builder = builder.address(addresses);
    }
    builder = builder.topics(topics, None, None, None);
    builder.build()
}

#[async_trait::async_trait]
impl EthereumGateway for EthereumClient {
    async fn block_number(&self) -> anyhow::Result<u64> {
        let number = self.deadline(self.web3.eth().block_number()).await?;
        Ok(number.as_u64())
    }

    async fn get_block(&self, number: u64) -> anyhow::Result<Option<Block<H256>>> {
        self.deadline(
            self.web3
                .eth()
                .block(BlockId::Number(Web3BlockNumber::Number(number.into()))),
        )
        .await
    }

    async fn get_transaction(&self, hash: H256) -> anyhow::Result<Option<Transaction>> {
        self.deadline(self.web3.eth().transaction(TransactionId::Hash(hash)))
            .await
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> anyhow::Result<Option<TransactionReceipt>> {
        self.deadline(self.web3.eth().transaction_receipt(hash)).await
    }

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: Option<Vec<Address>>,
        topics: Option<Vec<H256>>,
    ) -> anyhow::Result<Vec<Log>> {
        let filter = build_filter(from_block, to_block, addresses, topics);
        self.deadline(self.web3.eth().logs(filter)).await
    }

    async fn trace_filter(
        &self,
        from_block: u64,
        to_block: u64,
        from_addresses: Option<Vec<Address>>,
        to_addresses: Option<Vec<Address>>,
    ) -> anyhow::Result<Vec<Trace>> {
        let mut builder = TraceFilterBuilder::default()
            .from_block(Web3BlockNumber::Number(from_block.into()))
            .to_block(Web3BlockNumber::Number(to_block.into()));
        if let Some(from_addresses) = from_addresses {
            builder = builder.from_address(from_addresses);
        }
        if let Some(to_addresses) = to_addresses {
            builder = builder.to_address(to_addresses);
        }

        self.deadline(self.tracing_web3.trace().filter(builder.build()))
            .await
    }

    async fn trace_transaction(&self, hash: H256) -> anyhow::Result<Vec<Trace>> {
        self.deadline(self.tracing_web3.trace().transaction(hash))
            .await
    }

    async fn batch_call(
        &self,
        calls: &[ContractCall],
        raise_on_error: bool,
    ) -> anyhow::Result<Vec<Option<Vec<u8>>>> {
        let mut results = Vec::with_capacity(calls.len());

        // Large batches are split so a single request stays within what
        // nodes are willing to answer.
        for chunk in calls.chunks(self.rpc_batch_size) {
            let batch = Web3::new(Batch::new(self.transport.clone()));
            let pending: Vec<_> = chunk
                .iter()
                .map(|call| {
                    let request = CallRequest {
                        to: Some(call.to),
                        data: Some(Bytes(call.data.clone())),
                        ..Default::default()
                    };
                    batch.eth().call(request, None)
                })
                .collect();

            self.deadline(batch.transport().submit_batch()).await?;

            for (index, response) in pending.into_iter().enumerate() {
                match response.await {
                    Ok(output) => results.push(Some(output.0)),
                    Err(err) if raise_on_error => {
                        return Err(format_err!("batched call {} failed: {}", index, err));
                    }
                    Err(err) => {
                        vlog::debug!("batched call {} failed: {}", index, err);
                        results.push(None);
                    }
                }
            }
        }
        Ok(results)
    }
}
