// Built-in deps
use std::collections::HashSet;
use std::convert::TryFrom;
// External deps
use anyhow::format_err;
use async_trait::async_trait;
// Workspace deps
use safe_history_eth_client::EthereumGateway;
use safe_history_types::{BlockData, DecodedCall, EthereumTxData, InternalTx, H256};
// Local deps
use crate::decoder::{TxDecoder, TxDecoderError};
use crate::indexers::{BlockRangeIndexer, Element};
use crate::storage_interactor::{CursorStream, MonitoredAddress, StorageInteractor};

/// Scans `trace_filter` for internal transactions touching the monitored
/// wallets, fetches every matching call tree in full and stores it together
/// with the decoded form of the decodable traces.
#[derive(Debug)]
pub struct InternalTxIndexer {
    tx_decoder: TxDecoder,
    block_process_limit: u64,
    address_batch_size: usize,
}

impl InternalTxIndexer {
    pub fn new(block_process_limit: u64, address_batch_size: usize) -> Self {
        Self {
            tx_decoder: TxDecoder::new(),
            block_process_limit,
            address_batch_size,
        }
    }

    /// Fetches everything belonging to one traced transaction and prepares
    /// it for a single ledger transaction.
    async fn fetch_traced_transaction<W: EthereumGateway>(
        &self,
        client: &W,
        tx_hash: H256,
    ) -> anyhow::Result<(
        BlockData,
        EthereumTxData,
        Vec<InternalTx>,
        Vec<(Vec<u64>, DecodedCall)>,
    )> {
        vlog::debug!("fetching traces for tx {:?}", tx_hash);
        let traces = client.trace_transaction(tx_hash).await?;

        let transaction = client
            .get_transaction(tx_hash)
            .await?
            .ok_or_else(|| format_err!("traced transaction {:?} not found", tx_hash))?;
        let receipt = client.get_transaction_receipt(tx_hash).await?;
        let tx_data = EthereumTxData::from_parts(&transaction, receipt.as_ref())?;

        let block = client
            .get_block(tx_data.block_number.0)
            .await?
            .ok_or_else(|| format_err!("block {} not found", tx_data.block_number))?;
        let block_data = BlockData::try_from(&block)?;

        let mut internal_txs = Vec::with_capacity(traces.len());
        let mut decoded = Vec::new();
        for trace in &traces {
            let internal_tx = InternalTx::try_from(trace)?;
            if internal_tx.can_be_decoded() {
                match self.tx_decoder.decode(&internal_tx.data) {
                    Ok(call) => decoded.push((internal_tx.trace_address.clone(), call)),
                    // Traces calling outside the Safe interface are stored
                    // undecoded.
                    Err(TxDecoderError::CannotDecode(_)) => {}
                    // An ABI mismatch is fatal to the whole unit of work.
                    Err(err @ TxDecoderError::UnexpectedDecoding { .. }) => {
                        return Err(err.into());
                    }
                }
            }
            internal_txs.push(internal_tx);
        }

        Ok((block_data, tx_data, internal_txs, decoded))
    }
}

#[async_trait]
impl<W, I> BlockRangeIndexer<W, I> for InternalTxIndexer
where
    W: EthereumGateway,
    I: StorageInteractor,
{
    fn stream_name(&self) -> &'static str {
        "internal-txs"
    }

    fn block_process_limit(&self) -> u64 {
        self.block_process_limit
    }

    async fn monitored_addresses(
        &mut self,
        interactor: &mut I,
        below_block: u64,
    ) -> anyhow::Result<Vec<MonitoredAddress>> {
        interactor
            .monitored_safes(CursorStream::InternalTxs, below_block, self.address_batch_size)
            .await
    }

    async fn find_relevant_elements(
        &mut self,
        client: &W,
        addresses: &[MonitoredAddress],
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<Element>> {
        let watched: Vec<_> = addresses.iter().map(|entry| entry.address).collect();

        // Both directions, the way the tracing API filters.
        let to_traces = client
            .trace_filter(from_block, to_block, None, Some(watched.clone()))
            .await?;
        let from_traces = client
            .trace_filter(from_block, to_block, Some(watched), None)
            .await?;

        let mut seen = HashSet::new();
        let mut elements = Vec::new();
        for trace in to_traces.iter().chain(from_traces.iter()) {
            if let Some(tx_hash) = trace.transaction_hash {
                if seen.insert(tx_hash) {
                    elements.push(Element::TxHash(tx_hash));
                }
            }
        }
        Ok(elements)
    }

    async fn process_element(
        &mut self,
        client: &W,
        interactor: &mut I,
        element: Element,
    ) -> anyhow::Result<()> {
        let tx_hash = match element {
            Element::TxHash(tx_hash) => tx_hash,
            Element::Log(_) => return Err(format_err!("unexpected log element")),
        };

        let (block, transaction, internal_txs, decoded) =
            self.fetch_traced_transaction(client, tx_hash).await?;
        interactor
            .save_traced_transaction(block, transaction, internal_txs, decoded)
            .await
    }

    async fn advance_cursors(
        &mut self,
        interactor: &mut I,
        addresses: &[MonitoredAddress],
        block_number: u64,
    ) -> anyhow::Result<()> {
        let addresses: Vec<_> = addresses.iter().map(|entry| entry.address).collect();
        interactor
            .advance_safe_cursors(CursorStream::InternalTxs, &addresses, block_number)
            .await
    }
}
