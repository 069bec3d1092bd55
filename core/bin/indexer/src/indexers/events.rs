// Built-in deps
use std::collections::HashSet;
use std::convert::TryFrom;
// External deps
use anyhow::format_err;
use async_trait::async_trait;
// Workspace deps
use safe_history_eth_client::EthereumGateway;
use safe_history_types::{Address, EthereumEvent, H256, APPROVAL_TOPIC, TRANSFER_TOPIC};
// Local deps
use crate::indexers::{BlockRangeIndexer, Element};
use crate::storage_interactor::{CursorStream, MonitoredAddress, StorageInteractor};

/// Scans `eth_getLogs` for ERC-20/ERC-721 Transfer and Approval events
/// involving the monitored wallets. Token contract addresses are unknown in
/// advance, so the filter runs on the event topics and the wallet addresses
/// are matched against the indexed topic positions.
#[derive(Debug)]
pub struct Erc20EventsIndexer {
    block_process_limit: u64,
    address_batch_size: usize,
}

impl Erc20EventsIndexer {
    pub fn new(block_process_limit: u64, address_batch_size: usize) -> Self {
        Self {
            block_process_limit,
            address_batch_size,
        }
    }
}

/// An address left-padded into a 32-byte log topic.
fn address_topic(address: &Address) -> H256 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    H256::from(word)
}

#[async_trait]
impl<W, I> BlockRangeIndexer<W, I> for Erc20EventsIndexer
where
    W: EthereumGateway,
    I: StorageInteractor,
{
    fn stream_name(&self) -> &'static str {
        "erc20-events"
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
            .monitored_safes(CursorStream::Erc20, below_block, self.address_batch_size)
            .await
    }

    async fn find_relevant_elements(
        &mut self,
        client: &W,
        addresses: &[MonitoredAddress],
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<Element>> {
        let watched: HashSet<H256> = addresses
            .iter()
            .map(|entry| address_topic(&entry.address))
            .collect();

        let logs = client
            .get_logs(
                from_block,
                to_block,
                None,
                Some(vec![*TRANSFER_TOPIC, *APPROVAL_TOPIC]),
            )
            .await?;

        // Keep logs whose indexed participants include a monitored wallet.
        let elements = logs
            .into_iter()
            .filter(|log| {
                log.topics
                    .iter()
                    .skip(1)
                    .take(2)
                    .any(|topic| watched.contains(topic))
            })
            .map(Element::Log)
            .collect();
        Ok(elements)
    }

    async fn process_element(
        &mut self,
        _client: &W,
        interactor: &mut I,
        element: Element,
    ) -> anyhow::Result<()> {
        let log = match element {
            Element::Log(log) => log,
            Element::TxHash(_) => return Err(format_err!("unexpected tx-hash element")),
        };

        let event = EthereumEvent::try_from(&log)?;
        interactor.save_events(vec![event]).await
    }

    async fn advance_cursors(
        &mut self,
        interactor: &mut I,
        addresses: &[MonitoredAddress],
        block_number: u64,
    ) -> anyhow::Result<()> {
        let addresses: Vec<_> = addresses.iter().map(|entry| entry.address).collect();
        interactor
            .advance_safe_cursors(CursorStream::Erc20, &addresses, block_number)
            .await
    }
}
