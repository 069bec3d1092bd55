// Built-in deps
// External deps
use anyhow::format_err;
use async_trait::async_trait;
use ethabi::ParamType;
use once_cell::sync::Lazy;
// Workspace deps
use safe_history_contracts::proxy_factory_contract;
use safe_history_eth_client::EthereumGateway;
use safe_history_types::{Address, H256};
// Local deps
use crate::indexers::{BlockRangeIndexer, Element};
use crate::storage_interactor::{MonitoredAddress, StorageInteractor};

/// `keccak256("ProxyCreation(address,address)")`.
static PROXY_CREATION_TOPIC: Lazy<H256> = Lazy::new(|| {
    proxy_factory_contract()
        .event("ProxyCreation")
        .expect("proxy factory abi")
        .signature()
});

/// Watches the fixed set of proxy-factory contracts for `ProxyCreation`
/// events; every event registers a new Safe whose cursors start at the
/// creation block, so the other streams pick the wallet up from there.
#[derive(Debug)]
pub struct ProxyFactoryIndexer {
    block_process_limit: u64,
}

impl ProxyFactoryIndexer {
    pub fn new(block_process_limit: u64) -> Self {
        Self {
            block_process_limit,
        }
    }
}

/// Decodes `(proxy, masterCopy)` from the non-indexed event data.
fn decode_proxy_creation(data: &[u8]) -> anyhow::Result<(Address, Address)> {
    let tokens = ethabi::decode(&[ParamType::Address, ParamType::Address], data)
        .map_err(|err| format_err!("malformed ProxyCreation data: {}", err))?;
    match (tokens.get(0), tokens.get(1)) {
        (Some(ethabi::Token::Address(proxy)), Some(ethabi::Token::Address(master_copy))) => {
            Ok((*proxy, *master_copy))
        }
        _ => Err(format_err!("ProxyCreation data is not two addresses")),
    }
}

#[async_trait]
impl<W, I> BlockRangeIndexer<W, I> for ProxyFactoryIndexer
where
    W: EthereumGateway,
    I: StorageInteractor,
{
    fn stream_name(&self) -> &'static str {
        "proxy-factory"
    }

    fn block_process_limit(&self) -> u64 {
        self.block_process_limit
    }

    async fn monitored_addresses(
        &mut self,
        interactor: &mut I,
        below_block: u64,
    ) -> anyhow::Result<Vec<MonitoredAddress>> {
        interactor.monitored_proxy_factories(below_block).await
    }

    async fn find_relevant_elements(
        &mut self,
        client: &W,
        addresses: &[MonitoredAddress],
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<Element>> {
        let factories: Vec<_> = addresses.iter().map(|entry| entry.address).collect();
        let logs = client
            .get_logs(
                from_block,
                to_block,
                Some(factories),
                Some(vec![*PROXY_CREATION_TOPIC]),
            )
            .await?;
        Ok(logs.into_iter().map(Element::Log).collect())
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

        let block_number = log
            .block_number
            .ok_or_else(|| format_err!("ProxyCreation log without a block number"))?
            .as_u64();
        let (proxy, master_copy) = decode_proxy_creation(&log.data.0)?;

        let created = interactor
            .register_safe(proxy, log.transaction_hash, block_number)
            .await?;
        if created {
            vlog::info!(
                "found new safe {:?} (master copy {:?}) at block {}",
                proxy,
                master_copy,
                block_number
            );
        }
        Ok(())
    }

    async fn advance_cursors(
        &mut self,
        interactor: &mut I,
        addresses: &[MonitoredAddress],
        block_number: u64,
    ) -> anyhow::Result<()> {
        for entry in addresses {
            interactor
                .advance_proxy_factory_cursor(entry.address, block_number)
                .await?;
        }
        Ok(())
    }
}
