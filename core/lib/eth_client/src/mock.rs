// Built-in deps
use std::collections::HashMap;
use std::sync::Arc;
// External deps
use anyhow::format_err;
use tokio::sync::RwLock;
use web3::types::{Action, Block, Log, Trace, Transaction, TransactionReceipt};
// Workspace deps
use safe_history_basic_types::{Address, H256};
// Local deps
use crate::client::{ContractCall, EthereumGateway};

#[derive(Debug, Default)]
struct MockEthereumInner {
    block_number: u64,
    blocks: HashMap<u64, Block<H256>>,
    transactions: HashMap<H256, Transaction>,
    receipts: HashMap<H256, TransactionReceipt>,
    traces: HashMap<H256, Vec<Trace>>,
    logs: Vec<Log>,
    call_results: HashMap<(Address, Vec<u8>), Vec<u8>>,
}

/// Canned-state Ethereum client. Tests seed it with blocks, traces, logs and
/// call outputs; the indexers then run against it unchanged.
#[derive(Debug, Default, Clone)]
pub struct MockEthereumClient {
    inner: Arc<RwLock<MockEthereumInner>>,
}

impl MockEthereumClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_block_number(&self, number: u64) {
        self.inner.write().await.block_number = number;
    }

    pub async fn insert_block(&self, number: u64, block: Block<H256>) {
        self.inner.write().await.blocks.insert(number, block);
    }

    pub async fn insert_transaction(&self, hash: H256, transaction: Transaction) {
        self.inner.write().await.transactions.insert(hash, transaction);
    }

    pub async fn insert_receipt(&self, hash: H256, receipt: TransactionReceipt) {
        self.inner.write().await.receipts.insert(hash, receipt);
    }

    pub async fn insert_traces(&self, hash: H256, traces: Vec<Trace>) {
        self.inner.write().await.traces.insert(hash, traces);
    }

    pub async fn push_log(&self, log: Log) {
        self.inner.write().await.logs.push(log);
    }

    pub async fn set_call_result(&self, to: Address, data: Vec<u8>, output: Vec<u8>) {
        self.inner
            .write()
            .await
            .call_results
            .insert((to, data), output);
    }
}

fn trace_addresses(trace: &Trace) -> (Option<Address>, Option<Address>) {
    match &trace.action {
        Action::Call(call) => (Some(call.from), Some(call.to)),
        Action::Create(create) => (Some(create.from), None),
        Action::Suicide(suicide) => (Some(suicide.address), Some(suicide.refund_address)),
        Action::Reward(_) => (None, None),
    }
}

#[async_trait::async_trait]
impl EthereumGateway for MockEthereumClient {
    async fn block_number(&self) -> anyhow::Result<u64> {
        Ok(self.inner.read().await.block_number)
    }

    async fn get_block(&self, number: u64) -> anyhow::Result<Option<Block<H256>>> {
        Ok(self.inner.read().await.blocks.get(&number).cloned())
    }

    async fn get_transaction(&self, hash: H256) -> anyhow::Result<Option<Transaction>> {
        Ok(self.inner.read().await.transactions.get(&hash).cloned())
    }

    async fn get_transaction_receipt(
        &self,
        hash: H256,
    ) -> anyhow::Result<Option<TransactionReceipt>> {
        Ok(self.inner.read().await.receipts.get(&hash).cloned())
    }

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: Option<Vec<Address>>,
        topics: Option<Vec<H256>>,
    ) -> anyhow::Result<Vec<Log>> {
        let inner = self.inner.read().await;
        Ok(inner
            .logs
            .iter()
            .filter(|log| {
                let number = match log.block_number {
                    Some(number) => number.as_u64(),
                    None => return false,
                };
                if number < from_block || number > to_block {
                    return false;
                }
                if let Some(addresses) = &addresses {
                    if !addresses.contains(&log.address) {
                        return false;
                    }
                }
                if let Some(topics) = &topics {
                    match log.topics.first() {
                        Some(topic) if topics.contains(topic) => {}
                        _ => return false,
                    }
                }
                true
            })
            .cloned()
            .collect())
    }

    async fn trace_filter(
        &self,
        from_block: u64,
        to_block: u64,
        from_addresses: Option<Vec<Address>>,
        to_addresses: Option<Vec<Address>>,
    ) -> anyhow::Result<Vec<Trace>> {
        let inner = self.inner.read().await;
        let mut matched = Vec::new();
        for traces in inner.traces.values() {
            for trace in traces {
                if trace.block_number < from_block || trace.block_number > to_block {
                    continue;
                }
                let (from, to) = trace_addresses(trace);
                let from_matches = from_addresses
                    .as_ref()
                    .map(|list| from.map(|a| list.contains(&a)).unwrap_or(false))
                    .unwrap_or(true);
                let to_matches = to_addresses
                    .as_ref()
                    .map(|list| to.map(|a| list.contains(&a)).unwrap_or(false))
                    .unwrap_or(true);
                if from_matches && to_matches {
                    matched.push(trace.clone());
                }
            }
        }
        Ok(matched)
    }

    async fn trace_transaction(&self, hash: H256) -> anyhow::Result<Vec<Trace>> {
        self.inner
            .read()
            .await
            .traces
            .get(&hash)
            .cloned()
            .ok_or_else(|| format_err!("no traces recorded for tx {:?}", hash))
    }

    async fn batch_call(
        &self,
        calls: &[ContractCall],
        raise_on_error: bool,
    ) -> anyhow::Result<Vec<Option<Vec<u8>>>> {
        let inner = self.inner.read().await;
        let mut results = Vec::with_capacity(calls.len());
        for (index, call) in calls.iter().enumerate() {
            let key = (call.to, call.data.clone());
            match inner.call_results.get(&key) {
                Some(output) => results.push(Some(output.clone())),
                None if raise_on_error => {
                    return Err(format_err!("batched call {} has no canned result", index));
                }
                None => results.push(None),
            }
        }
        Ok(results)
    }
}
