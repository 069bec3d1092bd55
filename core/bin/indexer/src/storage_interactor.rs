//! The seam between the scanning/processing logic and the ledger.
//!
//! Indexers and the processor are generic over this trait; production wires
//! in the database-backed implementation, tests the in-memory one. Every
//! method that writes groups one unit of work (one traced transaction for
//! an indexer, one committed invocation for the processor) into a single
//! ledger transaction, cursors included.

// Built-in deps
// External deps
use async_trait::async_trait;
// Workspace deps
use safe_history_types::{
    Address, BlockData, DecodedCall, EthereumEvent, EthereumTxData, InternalTx, Nonce,
    SafeStatus, H256, U256,
};
// Local deps

/// Which per-address cursor a scanning stream advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorStream {
    InternalTxs,
    Events,
    Erc20,
}

/// A monitored address with its cursor position for one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredAddress {
    pub address: Address,
    pub cursor_block_number: u64,
}

/// A decoded invocation pulled from the processor queue.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedInvocation {
    /// Ledger handle of the decoded row, echoed back on commit.
    pub id: i64,
    pub internal_tx: InternalTx,
    pub call: DecodedCall,
}

/// The state snapshot to append, tied to the trace that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub internal_tx_id: i64,
    pub block_number: u64,
    pub transaction_index: u64,
    pub trace_address: Vec<u64>,
    pub status: SafeStatus,
}

/// The multi-sig transaction row recovered from an `execTransaction` trace.
#[derive(Debug, Clone, PartialEq)]
pub struct MultisigTransactionData {
    pub safe_tx_hash: H256,
    pub safe: Address,
    pub ethereum_tx_hash: Option<H256>,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Option<Vec<u8>>,
    pub operation: u8,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Option<Address>,
    pub refund_receiver: Option<Address>,
    pub nonce: Nonce,
    pub signatures: Option<Vec<u8>>,
    pub failed: Option<bool>,
    pub origin: Option<String>,
}

/// A confirmation attached to a multi-sig transaction hash.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationData {
    pub multisig_transaction_hash: H256,
    pub owner: Address,
    pub ethereum_tx_hash: Option<H256>,
    pub signature: Option<Vec<u8>>,
}

/// Ledger writes derived from one decoded invocation. Committed atomically
/// together with the `processed` mark.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationEffects {
    /// `setup`: register the wallet (cursors starting at its creation
    /// block) and append its first state snapshot.
    RegisterSafe {
        ethereum_tx_hash: H256,
        created_block_number: u64,
        transition: StatusTransition,
    },
    /// Owner/threshold/master-copy management: append a snapshot.
    NewStatus { transition: StatusTransition },
    /// `approveHash`: upsert a confirmation.
    Confirmation { confirmation: ConfirmationData },
    /// `execTransaction`: drop wrong-nonce leftovers sharing the execution
    /// transaction, upsert the transaction and its recovered
    /// confirmations, and append the snapshot with the advanced nonce.
    ExecTransaction {
        transaction: MultisigTransactionData,
        confirmations: Vec<ConfirmationData>,
        transition: StatusTransition,
    },
    /// Nothing to apply (module execution, unknown functions, invariant
    /// violations that only advance the queue).
    None,
}

/// The commit of one processed invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedInvocation {
    pub id: i64,
    /// Whether the queue cursor advances past this invocation.
    pub mark_processed: bool,
    /// Whether the invocation had a state effect.
    pub successful: bool,
    pub effects: InvocationEffects,
}

#[async_trait]
pub trait StorageInteractor: Send {
    // ------ indexer side ------

    /// Persists one traced transaction: the block, the transaction itself,
    /// every trace of its call tree and the decoded form of the decodable
    /// traces. All rows land in one ledger transaction; replays are
    /// absorbed by the unique keys.
    async fn save_traced_transaction(
        &mut self,
        block: BlockData,
        transaction: EthereumTxData,
        internal_txs: Vec<InternalTx>,
        decoded: Vec<(Vec<u64>, DecodedCall)>,
    ) -> anyhow::Result<()>;

    /// Persists token events, deduplicated on `(tx_hash, log_index)`.
    async fn save_events(&mut self, events: Vec<EthereumEvent>) -> anyhow::Result<()>;

    /// Registers a Safe discovered by the proxy-factory stream. Returns
    /// whether it was new.
    async fn register_safe(
        &mut self,
        address: Address,
        ethereum_tx_hash: Option<H256>,
        created_block_number: u64,
    ) -> anyhow::Result<bool>;

    /// Monitored Safes whose cursor for `stream` is strictly below
    /// `below_block`, most-behind first.
    async fn monitored_safes(
        &mut self,
        stream: CursorStream,
        below_block: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<MonitoredAddress>>;

    /// Advances the stream cursors of the given Safes to `block_number`.
    /// Cursors already past it stay put.
    async fn advance_safe_cursors(
        &mut self,
        stream: CursorStream,
        addresses: &[Address],
        block_number: u64,
    ) -> anyhow::Result<()>;

    /// Registers a watched proxy factory starting at the given block.
    async fn register_proxy_factory(
        &mut self,
        address: Address,
        initial_block_number: u64,
    ) -> anyhow::Result<()>;

    /// Watched factories whose cursor is strictly below `below_block`.
    async fn monitored_proxy_factories(
        &mut self,
        below_block: u64,
    ) -> anyhow::Result<Vec<MonitoredAddress>>;

    async fn advance_proxy_factory_cursor(
        &mut self,
        address: Address,
        block_number: u64,
    ) -> anyhow::Result<()>;

    // ------ processor side ------

    /// Not-yet-processed decoded invocations in strict
    /// `(block_number, tx_index, trace_address)` order.
    async fn pending_invocations(
        &mut self,
        limit: usize,
    ) -> anyhow::Result<Vec<DecodedInvocation>>;

    /// The current state snapshot of a wallet, if any.
    async fn last_safe_status(&mut self, address: Address)
        -> anyhow::Result<Option<SafeStatus>>;

    /// The `from` address of the parent trace of the given trace, if the
    /// parent was indexed.
    async fn parent_trace_from(
        &mut self,
        ethereum_tx_hash: H256,
        parent_trace_address: &[u64],
    ) -> anyhow::Result<Option<Address>>;

    /// Applies the effects of one processed invocation and marks it
    /// processed, atomically.
    async fn commit_invocation(&mut self, commit: CommittedInvocation) -> anyhow::Result<()>;

    // ------ read side ------

    /// Distinct `(token_address, token_id)` pairs ever transferred to the
    /// owner, in observation order.
    async fn erc721_tokens_transferred_to(
        &mut self,
        owner: Address,
    ) -> anyhow::Result<Vec<(Address, U256)>>;
}
