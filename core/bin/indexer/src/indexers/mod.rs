//! The three block-range scanners that feed the ledger. They share one
//! shape: pick monitored addresses whose cursor lags the safe chain tip,
//! clamp a block window, ask the stream-specific discovery for relevant
//! elements, persist each element as one unit of work and advance the
//! cursors together with the data they cover.

// Built-in deps
use std::time::Duration;
// External deps
use async_trait::async_trait;
use rand::Rng;
// Workspace deps
use safe_history_eth_client::EthereumGateway;
// Local deps
use crate::storage_interactor::{MonitoredAddress, StorageInteractor};

pub mod events;
pub mod internal_txs;
pub mod proxy_factory;

pub use events::Erc20EventsIndexer;
pub use internal_txs::InternalTxIndexer;
pub use proxy_factory::ProxyFactoryIndexer;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Exponential backoff with jitter for transient RPC failures. A failed
/// window is abandoned (cursors untouched) and retried after the delay.
#[derive(Debug)]
pub struct Backoff {
    failures: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Self { failures: 0 }
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// The delay to sleep before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let exponential = BACKOFF_BASE
            .checked_mul(1u32 << self.failures.min(6))
            .unwrap_or(BACKOFF_CAP)
            .min(BACKOFF_CAP);
        self.failures = self.failures.saturating_add(1);

        let jitter = rand::thread_rng().gen_range(0..=exponential.as_millis() as u64 / 4);
        exponential + Duration::from_millis(jitter)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// The progress one indexing step made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Amount of discovered elements that were persisted.
    pub processed_elements: usize,
    /// Upper bound of the scanned window, if a window was scanned.
    pub scanned_until: Option<u64>,
}

impl StepOutcome {
    fn idle() -> Self {
        Self {
            processed_elements: 0,
            scanned_until: None,
        }
    }
}

/// Template of a block-range scanning stream.
///
/// Implementors provide address selection, element discovery, element
/// processing and cursor advancement; the provided `index_step` drives one
/// round of the shared shape.
#[async_trait]
pub trait BlockRangeIndexer<W: EthereumGateway, I: StorageInteractor> {
    /// Human-readable stream name used in logs.
    fn stream_name(&self) -> &'static str;

    /// Maximum width of one scanned block window.
    fn block_process_limit(&self) -> u64;

    /// Addresses whose cursor for this stream is strictly below the given
    /// block, together with those cursors.
    async fn monitored_addresses(
        &mut self,
        interactor: &mut I,
        below_block: u64,
    ) -> anyhow::Result<Vec<MonitoredAddress>>;

    /// Stream-specific discovery over `[from_block, to_block]`.
    async fn find_relevant_elements(
        &mut self,
        client: &W,
        addresses: &[MonitoredAddress],
        from_block: u64,
        to_block: u64,
    ) -> anyhow::Result<Vec<Element>>;

    /// Persists one discovered element as a single unit of work.
    async fn process_element(
        &mut self,
        client: &W,
        interactor: &mut I,
        element: Element,
    ) -> anyhow::Result<()>;

    /// Moves the cursors of the scanned addresses to `block_number`.
    async fn advance_cursors(
        &mut self,
        interactor: &mut I,
        addresses: &[MonitoredAddress],
        block_number: u64,
    ) -> anyhow::Result<()>;

    /// One round of the template. `confirmations` is the reorg safety
    /// margin: the window never extends past `chain_tip - confirmations`.
    async fn index_step(
        &mut self,
        client: &W,
        interactor: &mut I,
        confirmations: u64,
    ) -> anyhow::Result<StepOutcome> {
        let chain_tip = client.block_number().await?;
        let safe_tip = match chain_tip.checked_sub(confirmations) {
            Some(safe_tip) => safe_tip,
            None => return Ok(StepOutcome::idle()),
        };

        let addresses = self
            .monitored_addresses(interactor, safe_tip + 1)
            .await?;
        if addresses.is_empty() {
            return Ok(StepOutcome::idle());
        }

        let from_block = addresses
            .iter()
            .map(|address| address.cursor_block_number)
            .min()
            .expect("addresses are non-empty");
        let to_block = safe_tip.min(from_block + self.block_process_limit() - 1);
        if to_block < from_block {
            return Ok(StepOutcome::idle());
        }

        vlog::debug!(
            "{}: scanning blocks [{}, {}] for {} addresses",
            self.stream_name(),
            from_block,
            to_block,
            addresses.len()
        );

        let elements = self
            .find_relevant_elements(client, &addresses, from_block, to_block)
            .await?;
        let processed_elements = elements.len();
        if processed_elements > 0 {
            vlog::info!(
                "{}: found {} relevant elements between blocks {} and {}",
                self.stream_name(),
                processed_elements,
                from_block,
                to_block
            );
        }

        for element in elements {
            self.process_element(client, interactor, element).await?;
        }

        self.advance_cursors(interactor, &addresses, to_block + 1)
            .await?;

        Ok(StepOutcome {
            processed_elements,
            scanned_until: Some(to_block),
        })
    }
}

/// A discovered element: either a transaction hash worth tracing or a raw
/// log worth storing.
#[derive(Debug, Clone)]
pub enum Element {
    TxHash(safe_history_types::H256),
    Log(web3::types::Log),
}
