//! In-memory implementation of the ledger seam. Mirrors the relational
//! schema closely enough that the indexers, the processor and the
//! collectibles resolver can be exercised end-to-end without a database.

// Built-in deps
use std::collections::hash_map::Entry;
use std::collections::HashMap;
// External deps
use async_trait::async_trait;
// Workspace deps
use safe_history_types::{
    Address, BlockData, DecodedCall, EthereumEvent, EthereumTxData, InternalTx, SafeStatus,
    TokenEvent, H256, U256,
};
// Local deps
use crate::storage_interactor::{
    CommittedInvocation, ConfirmationData, CursorStream, DecodedInvocation, InvocationEffects,
    MonitoredAddress, MultisigTransactionData, StatusTransition, StorageInteractor,
};

#[derive(Debug, Clone)]
struct DecodedRow {
    internal_tx_id: i64,
    call: DecodedCall,
    processed: bool,
    successful: Option<bool>,
}

#[derive(Debug, Clone)]
struct SafeContractRow {
    ethereum_tx_hash: Option<H256>,
    created_block_number: u64,
    cursors: HashMap<CursorStream, u64>,
}

#[derive(Debug, Clone)]
pub struct StatusRow {
    pub internal_tx_id: i64,
    pub block_number: u64,
    pub transaction_index: u64,
    pub trace_address: Vec<u64>,
    pub status: SafeStatus,
}

#[derive(Debug, Clone)]
pub struct ConfirmationRow {
    pub data: ConfirmationData,
    /// Whether the row points at a stored multi-sig transaction yet.
    pub linked: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryStorageInteractor {
    blocks: HashMap<u64, BlockData>,
    transactions: HashMap<H256, EthereumTxData>,
    internal_txs: HashMap<i64, InternalTx>,
    internal_tx_ids: HashMap<(H256, Vec<u64>), i64>,
    next_internal_tx_id: i64,
    decoded: HashMap<i64, DecodedRow>,
    events: HashMap<(H256, u64), EthereumEvent>,
    safes: HashMap<Address, SafeContractRow>,
    factories: HashMap<Address, u64>,
    statuses: Vec<StatusRow>,
    multisig_transactions: HashMap<H256, MultisigTransactionData>,
    confirmations: HashMap<(H256, Address), ConfirmationRow>,
}

impl InMemoryStorageInteractor {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_internal_tx(&mut self, tx: InternalTx) -> (i64, bool) {
        let key = (tx.ethereum_tx_hash, tx.trace_address.clone());
        if let Some(id) = self.internal_tx_ids.get(&key) {
            return (*id, false);
        }
        self.next_internal_tx_id += 1;
        let id = self.next_internal_tx_id;
        self.internal_tx_ids.insert(key, id);
        self.internal_txs.insert(id, tx);
        (id, true)
    }

    fn store_transition(&mut self, transition: StatusTransition) {
        if self
            .statuses
            .iter()
            .any(|row| row.internal_tx_id == transition.internal_tx_id)
        {
            return;
        }
        self.statuses.push(StatusRow {
            internal_tx_id: transition.internal_tx_id,
            block_number: transition.block_number,
            transaction_index: transition.transaction_index,
            trace_address: transition.trace_address,
            status: transition.status,
        });
    }

    fn upsert_confirmation(&mut self, confirmation: ConfirmationData) {
        let key = (confirmation.multisig_transaction_hash, confirmation.owner);
        let linked = self
            .multisig_transactions
            .contains_key(&confirmation.multisig_transaction_hash);
        match self.confirmations.entry(key) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                if existing.data.ethereum_tx_hash.is_none() {
                    existing.data.ethereum_tx_hash = confirmation.ethereum_tx_hash;
                }
                if confirmation.signature.is_some() {
                    existing.data.signature = confirmation.signature;
                }
                existing.linked = existing.linked || linked;
            }
            Entry::Vacant(entry) => {
                entry.insert(ConfirmationRow {
                    data: confirmation,
                    linked,
                });
            }
        }
    }

    fn link_confirmations(&mut self, safe_tx_hash: H256) {
        for ((hash, _), row) in self.confirmations.iter_mut() {
            if *hash == safe_tx_hash {
                row.linked = true;
            }
        }
    }

    // ------ inspection helpers for tests ------

    pub fn status_history(&self, address: Address) -> Vec<SafeStatus> {
        let mut rows: Vec<&StatusRow> = self
            .statuses
            .iter()
            .filter(|row| row.status.address == address)
            .collect();
        rows.sort_by(|a, b| {
            (a.block_number, a.transaction_index, &a.trace_address).cmp(&(
                b.block_number,
                b.transaction_index,
                &b.trace_address,
            ))
        });
        rows.into_iter().map(|row| row.status.clone()).collect()
    }

    pub fn safe_is_registered(&self, address: Address) -> bool {
        self.safes.contains_key(&address)
    }

    pub fn multisig_transaction(&self, safe_tx_hash: H256) -> Option<&MultisigTransactionData> {
        self.multisig_transactions.get(&safe_tx_hash)
    }

    pub fn multisig_transaction_count(&self) -> usize {
        self.multisig_transactions.len()
    }

    pub fn confirmations_for(&self, safe_tx_hash: H256) -> Vec<ConfirmationRow> {
        let mut rows: Vec<ConfirmationRow> = self
            .confirmations
            .iter()
            .filter(|((hash, _), _)| *hash == safe_tx_hash)
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by_key(|row| row.data.owner);
        rows
    }

    pub fn internal_tx_count(&self) -> usize {
        self.internal_txs.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn decoded_count(&self) -> usize {
        self.decoded.len()
    }

    pub fn unprocessed_count(&self) -> usize {
        self.decoded.values().filter(|row| !row.processed).count()
    }

    /// Seeds a pre-existing multi-sig transaction, the way an API
    /// submission or an earlier indexing round would have.
    pub fn seed_multisig_transaction(&mut self, transaction: MultisigTransactionData) {
        self.multisig_transactions
            .insert(transaction.safe_tx_hash, transaction);
    }
}

#[async_trait]
impl StorageInteractor for InMemoryStorageInteractor {
    async fn save_traced_transaction(
        &mut self,
        block: BlockData,
        transaction: EthereumTxData,
        internal_txs: Vec<InternalTx>,
        decoded: Vec<(Vec<u64>, DecodedCall)>,
    ) -> anyhow::Result<()> {
        self.blocks.entry(block.number.0).or_insert(block);
        let tx_hash = transaction.tx_hash;
        self.transactions.entry(tx_hash).or_insert(transaction);

        for internal_tx in internal_txs {
            self.insert_internal_tx(internal_tx);
        }

        for (trace_address, call) in decoded {
            let id = match self.internal_tx_ids.get(&(tx_hash, trace_address)) {
                Some(id) => *id,
                None => anyhow::bail!("decoded trace without a stored internal tx"),
            };
            self.decoded.entry(id).or_insert(DecodedRow {
                internal_tx_id: id,
                call,
                processed: false,
                successful: None,
            });
        }
        Ok(())
    }

    async fn save_events(&mut self, events: Vec<EthereumEvent>) -> anyhow::Result<()> {
        for event in events {
            let key = (event.ethereum_tx_hash, event.log_index);
            self.events.entry(key).or_insert(event);
        }
        Ok(())
    }

    async fn register_safe(
        &mut self,
        address: Address,
        ethereum_tx_hash: Option<H256>,
        created_block_number: u64,
    ) -> anyhow::Result<bool> {
        if self.safes.contains_key(&address) {
            return Ok(false);
        }
        let mut cursors = HashMap::new();
        cursors.insert(CursorStream::InternalTxs, created_block_number);
        cursors.insert(CursorStream::Events, created_block_number);
        cursors.insert(CursorStream::Erc20, created_block_number);
        self.safes.insert(
            address,
            SafeContractRow {
                ethereum_tx_hash,
                created_block_number,
                cursors,
            },
        );
        Ok(true)
    }

    async fn monitored_safes(
        &mut self,
        stream: CursorStream,
        below_block: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<MonitoredAddress>> {
        let mut monitored: Vec<MonitoredAddress> = self
            .safes
            .iter()
            .filter_map(|(address, row)| {
                let cursor = *row.cursors.get(&stream).unwrap_or(&row.created_block_number);
                if cursor < below_block {
                    Some(MonitoredAddress {
                        address: *address,
                        cursor_block_number: cursor,
                    })
                } else {
                    None
                }
            })
            .collect();
        monitored.sort_by_key(|entry| (entry.cursor_block_number, entry.address));
        monitored.truncate(limit);
        Ok(monitored)
    }

    async fn advance_safe_cursors(
        &mut self,
        stream: CursorStream,
        addresses: &[Address],
        block_number: u64,
    ) -> anyhow::Result<()> {
        for address in addresses {
            if let Some(row) = self.safes.get_mut(address) {
                let cursor = row.cursors.entry(stream).or_insert(0);
                if *cursor < block_number {
                    *cursor = block_number;
                }
            }
        }
        Ok(())
    }

    async fn register_proxy_factory(
        &mut self,
        address: Address,
        initial_block_number: u64,
    ) -> anyhow::Result<()> {
        self.factories.entry(address).or_insert(initial_block_number);
        Ok(())
    }

    async fn monitored_proxy_factories(
        &mut self,
        below_block: u64,
    ) -> anyhow::Result<Vec<MonitoredAddress>> {
        let mut monitored: Vec<MonitoredAddress> = self
            .factories
            .iter()
            .filter(|(_, cursor)| **cursor < below_block)
            .map(|(address, cursor)| MonitoredAddress {
                address: *address,
                cursor_block_number: *cursor,
            })
            .collect();
        monitored.sort_by_key(|entry| (entry.cursor_block_number, entry.address));
        Ok(monitored)
    }

    async fn advance_proxy_factory_cursor(
        &mut self,
        address: Address,
        block_number: u64,
    ) -> anyhow::Result<()> {
        if let Some(cursor) = self.factories.get_mut(&address) {
            if *cursor < block_number {
                *cursor = block_number;
            }
        }
        Ok(())
    }

    async fn pending_invocations(
        &mut self,
        limit: usize,
    ) -> anyhow::Result<Vec<DecodedInvocation>> {
        let mut pending: Vec<DecodedInvocation> = self
            .decoded
            .values()
            .filter(|row| !row.processed)
            .filter_map(|row| {
                self.internal_txs
                    .get(&row.internal_tx_id)
                    .map(|internal_tx| DecodedInvocation {
                        id: row.internal_tx_id,
                        internal_tx: internal_tx.clone(),
                        call: row.call.clone(),
                    })
            })
            .collect();
        pending.sort_by(|a, b| {
            a.internal_tx
                .ordering_key()
                .cmp(&b.internal_tx.ordering_key())
        });
        pending.truncate(limit);
        Ok(pending)
    }

    async fn last_safe_status(
        &mut self,
        address: Address,
    ) -> anyhow::Result<Option<SafeStatus>> {
        Ok(self.status_history(address).last().cloned())
    }

    async fn parent_trace_from(
        &mut self,
        ethereum_tx_hash: H256,
        parent_trace_address: &[u64],
    ) -> anyhow::Result<Option<Address>> {
        let key = (ethereum_tx_hash, parent_trace_address.to_vec());
        Ok(self
            .internal_tx_ids
            .get(&key)
            .and_then(|id| self.internal_txs.get(id))
            .map(|tx| tx.from))
    }

    async fn commit_invocation(&mut self, commit: CommittedInvocation) -> anyhow::Result<()> {
        match commit.effects {
            InvocationEffects::RegisterSafe {
                ethereum_tx_hash,
                created_block_number,
                transition,
            } => {
                let address = transition.status.address;
                self.register_safe(address, Some(ethereum_tx_hash), created_block_number)
                    .await?;
                self.store_transition(transition);
            }
            InvocationEffects::NewStatus { transition } => {
                self.store_transition(transition);
            }
            InvocationEffects::Confirmation { confirmation } => {
                self.upsert_confirmation(confirmation);
            }
            InvocationEffects::ExecTransaction {
                transaction,
                confirmations,
                transition,
            } => {
                // Drop wrong-nonce leftovers sharing the execution tx.
                let stale: Vec<H256> = self
                    .multisig_transactions
                    .values()
                    .filter(|existing| {
                        existing.ethereum_tx_hash == transaction.ethereum_tx_hash
                            && existing.safe == transaction.safe
                            && existing.nonce == transaction.nonce
                            && existing.safe_tx_hash != transaction.safe_tx_hash
                    })
                    .map(|existing| existing.safe_tx_hash)
                    .collect();
                for hash in stale {
                    self.multisig_transactions.remove(&hash);
                }

                match self.multisig_transactions.entry(transaction.safe_tx_hash) {
                    Entry::Occupied(mut entry) => {
                        let existing = entry.get_mut();
                        if existing.ethereum_tx_hash.is_none() {
                            existing.ethereum_tx_hash = transaction.ethereum_tx_hash;
                            existing.failed = transaction.failed;
                            existing.signatures = transaction.signatures.clone();
                        }
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(transaction.clone());
                    }
                }
                self.link_confirmations(transaction.safe_tx_hash);

                for confirmation in confirmations {
                    self.upsert_confirmation(confirmation);
                }
                self.store_transition(transition);
            }
            InvocationEffects::None => {}
        }

        if let Some(row) = self.decoded.get_mut(&commit.id) {
            if commit.mark_processed {
                row.processed = true;
            }
            row.successful = Some(commit.successful);
        }
        Ok(())
    }

    async fn erc721_tokens_transferred_to(
        &mut self,
        owner: Address,
    ) -> anyhow::Result<Vec<(Address, U256)>> {
        let mut events: Vec<&EthereumEvent> = self.events.values().collect();
        events.sort_by_key(|event| (event.block_number, event.log_index));

        let mut seen = Vec::new();
        for event in events {
            if let TokenEvent::Erc721Transfer { to, token_id, .. } = &event.event {
                if *to == owner {
                    let pair = (event.address, *token_id);
                    if !seen.contains(&pair) {
                        seen.push(pair);
                    }
                }
            }
        }
        Ok(seen)
    }
}
