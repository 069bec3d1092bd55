//! Database-backed implementation of the ledger seam. Every write method
//! wraps its rows into one storage transaction so a unit of work either
//! commits completely or not at all.

// Built-in deps
// External deps
use anyhow::format_err;
use async_trait::async_trait;
// Workspace deps
use safe_history_storage::internal_txs::records::{NewInternalTx, StoredPendingInvocation};
use safe_history_storage::multisig::records::NewMultisigTransaction;
use safe_history_storage::safe::records::NewSafeStatus;
use safe_history_storage::safe::CursorField;
use safe_history_storage::utils::{
    address_to_bytes, big_decimal_to_u256, bytes_to_address, bytes_to_hash, hash_to_bytes,
    trace_address_from_sql, trace_address_to_sql, u256_to_big_decimal,
};
use safe_history_storage::{ethereum, ConnectionPool, StorageProcessor};
use safe_history_types::utils::checksum_address;
use safe_history_types::{
    Address, BlockData, BlockNumber, CallType, DecodedCall, EthereumEvent, EthereumTxData,
    InternalTx, Nonce, SafeStatus, TraceType, TransactionIndex, H256, U256,
};
// Local deps
use crate::storage_interactor::{
    CommittedInvocation, ConfirmationData, CursorStream, DecodedInvocation, InvocationEffects,
    MonitoredAddress, MultisigTransactionData, StatusTransition, StorageInteractor,
};

impl From<CursorStream> for CursorField {
    fn from(stream: CursorStream) -> Self {
        match stream {
            CursorStream::InternalTxs => CursorField::InternalTxs,
            CursorStream::Events => CursorField::Events,
            CursorStream::Erc20 => CursorField::Erc20,
        }
    }
}

pub struct DatabaseStorageInteractor {
    pool: ConnectionPool,
}

impl DatabaseStorageInteractor {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    async fn storage(&self) -> anyhow::Result<StorageProcessor<'_>> {
        self.pool.access_storage().await
    }
}

fn block_record(block: &BlockData) -> ethereum::records::NewBlock {
    ethereum::records::NewBlock {
        number: block.number.0 as i64,
        hash: hash_to_bytes(&block.hash),
        parent_hash: hash_to_bytes(&block.parent_hash),
        timestamp: block.timestamp as i64,
        gas_limit: block.gas_limit as i64,
        gas_used: block.gas_used as i64,
    }
}

fn transaction_record(tx: &EthereumTxData) -> ethereum::records::NewEthereumTx {
    ethereum::records::NewEthereumTx {
        tx_hash: hash_to_bytes(&tx.tx_hash),
        block_number: tx.block_number.0 as i64,
        transaction_index: tx.transaction_index.0 as i64,
        from_address: address_to_bytes(&tx.from),
        to_address: tx.to.as_ref().map(address_to_bytes),
        nonce: tx.nonce as i64,
        value: u256_to_big_decimal(tx.value),
        gas: tx.gas as i64,
        gas_price: u256_to_big_decimal(tx.gas_price),
        data: if tx.data.is_empty() {
            None
        } else {
            Some(tx.data.clone())
        },
        status: tx.status.map(|status| status as i64),
        gas_used: tx.gas_used.map(|gas_used| gas_used as i64),
    }
}

fn internal_tx_record(tx: &InternalTx) -> NewInternalTx {
    NewInternalTx {
        ethereum_tx_hash: hash_to_bytes(&tx.ethereum_tx_hash),
        block_number: tx.block_number.0 as i64,
        transaction_index: tx.transaction_index.0 as i64,
        trace_address: trace_address_to_sql(&tx.trace_address),
        trace_type: tx.trace_type.to_string(),
        call_type: tx.call_type.to_string(),
        from_address: address_to_bytes(&tx.from),
        to_address: tx.to.as_ref().map(address_to_bytes),
        value: u256_to_big_decimal(tx.value),
        data: if tx.data.is_empty() {
            None
        } else {
            Some(tx.data.clone())
        },
        contract_address: tx.contract_address.as_ref().map(address_to_bytes),
        error: tx.error.clone(),
    }
}

fn status_record(transition: &StatusTransition) -> NewSafeStatus {
    let owners: Vec<String> = transition
        .status
        .owners
        .iter()
        .map(checksum_address)
        .collect();
    NewSafeStatus {
        internal_tx_id: transition.internal_tx_id,
        address: address_to_bytes(&transition.status.address),
        block_number: transition.block_number as i64,
        transaction_index: transition.transaction_index as i64,
        trace_address: trace_address_to_sql(&transition.trace_address),
        owners: serde_json::json!(owners),
        threshold: transition.status.threshold as i64,
        nonce: transition.status.nonce.0 as i64,
        master_copy: address_to_bytes(&transition.status.master_copy),
    }
}

fn multisig_record(tx: &MultisigTransactionData) -> NewMultisigTransaction {
    NewMultisigTransaction {
        safe_tx_hash: hash_to_bytes(&tx.safe_tx_hash),
        safe_address: address_to_bytes(&tx.safe),
        ethereum_tx_hash: tx.ethereum_tx_hash.as_ref().map(hash_to_bytes),
        to_address: tx.to.as_ref().map(address_to_bytes),
        value: u256_to_big_decimal(tx.value),
        data: tx.data.clone(),
        operation: tx.operation as i64,
        safe_tx_gas: u256_to_big_decimal(tx.safe_tx_gas),
        base_gas: u256_to_big_decimal(tx.base_gas),
        gas_price: u256_to_big_decimal(tx.gas_price),
        gas_token: tx.gas_token.as_ref().map(address_to_bytes),
        refund_receiver: tx.refund_receiver.as_ref().map(address_to_bytes),
        nonce: tx.nonce.0 as i64,
        signatures: tx.signatures.clone(),
        failed: tx.failed,
        origin: tx.origin.clone(),
    }
}

fn invocation_from_stored(stored: StoredPendingInvocation) -> anyhow::Result<DecodedInvocation> {
    let internal_tx = InternalTx {
        ethereum_tx_hash: bytes_to_hash(&stored.ethereum_tx_hash)?,
        block_number: BlockNumber(stored.block_number as u64),
        transaction_index: TransactionIndex(stored.transaction_index as u64),
        trace_address: trace_address_from_sql(&stored.trace_address),
        trace_type: stored.trace_type.parse::<TraceType>()?,
        call_type: stored.call_type.parse::<CallType>()?,
        from: bytes_to_address(&stored.from_address)?,
        to: stored
            .to_address
            .as_deref()
            .map(bytes_to_address)
            .transpose()?,
        value: big_decimal_to_u256(&stored.value)?,
        data: stored.data.unwrap_or_default(),
        contract_address: stored
            .contract_address
            .as_deref()
            .map(bytes_to_address)
            .transpose()?,
        error: stored.error,
    };
    Ok(DecodedInvocation {
        id: stored.internal_tx_id,
        internal_tx,
        call: DecodedCall {
            function_name: stored.function_name,
            arguments: stored.arguments,
        },
    })
}

async fn apply_effects(
    transaction: &mut StorageProcessor<'_>,
    effects: InvocationEffects,
) -> anyhow::Result<()> {
    match effects {
        InvocationEffects::RegisterSafe {
            ethereum_tx_hash,
            created_block_number,
            transition,
        } => {
            transaction
                .safe_schema()
                .insert_safe_contract(
                    address_to_bytes(&transition.status.address),
                    Some(hash_to_bytes(&ethereum_tx_hash)),
                    created_block_number as i64,
                )
                .await?;
            transaction
                .safe_schema()
                .insert_safe_status(status_record(&transition))
                .await?;
        }
        InvocationEffects::NewStatus { transition } => {
            transaction
                .safe_schema()
                .insert_safe_status(status_record(&transition))
                .await?;
        }
        InvocationEffects::Confirmation { confirmation } => {
            transaction
                .multisig_schema()
                .upsert_confirmation(
                    &hash_to_bytes(&confirmation.multisig_transaction_hash),
                    &address_to_bytes(&confirmation.owner),
                    confirmation.ethereum_tx_hash.as_ref().map(hash_to_bytes),
                    confirmation.signature,
                )
                .await?;
        }
        InvocationEffects::ExecTransaction {
            transaction: multisig_tx,
            confirmations,
            transition,
        } => {
            if let Some(ethereum_tx_hash) = &multisig_tx.ethereum_tx_hash {
                transaction
                    .multisig_schema()
                    .delete_stale_transactions(
                        &hash_to_bytes(ethereum_tx_hash),
                        &address_to_bytes(&multisig_tx.safe),
                        multisig_tx.nonce.0 as i64,
                        &hash_to_bytes(&multisig_tx.safe_tx_hash),
                    )
                    .await?;
            }
            transaction
                .multisig_schema()
                .upsert_from_chain(multisig_record(&multisig_tx))
                .await?;
            for confirmation in confirmations {
                transaction
                    .multisig_schema()
                    .upsert_confirmation(
                        &hash_to_bytes(&confirmation.multisig_transaction_hash),
                        &address_to_bytes(&confirmation.owner),
                        confirmation.ethereum_tx_hash.as_ref().map(hash_to_bytes),
                        confirmation.signature,
                    )
                    .await?;
            }
            transaction
                .safe_schema()
                .insert_safe_status(status_record(&transition))
                .await?;
        }
        InvocationEffects::None => {}
    }
    Ok(())
}

#[async_trait]
impl StorageInteractor for DatabaseStorageInteractor {
    async fn save_traced_transaction(
        &mut self,
        block: BlockData,
        transaction: EthereumTxData,
        internal_txs: Vec<InternalTx>,
        decoded: Vec<(Vec<u64>, DecodedCall)>,
    ) -> anyhow::Result<()> {
        let mut storage = self.storage().await?;
        let mut db_transaction = storage.start_transaction().await?;

        db_transaction
            .ethereum_schema()
            .save_block(block_record(&block))
            .await?;
        db_transaction
            .ethereum_schema()
            .save_transaction(transaction_record(&transaction))
            .await?;

        let mut stored_ids = Vec::with_capacity(internal_txs.len());
        for internal_tx in &internal_txs {
            let (id, _created) = db_transaction
                .internal_txs_schema()
                .insert_internal_tx(internal_tx_record(internal_tx))
                .await?;
            stored_ids.push((internal_tx.trace_address.clone(), id));
        }

        for (trace_address, call) in decoded {
            let id = stored_ids
                .iter()
                .find(|(stored_trace, _)| stored_trace == &trace_address)
                .map(|(_, id)| *id)
                .ok_or_else(|| format_err!("decoded trace without a stored internal tx"))?;
            db_transaction
                .internal_txs_schema()
                .insert_decoded(id, &call.function_name, call.arguments)
                .await?;
        }

        db_transaction.commit().await?;
        Ok(())
    }

    async fn save_events(&mut self, events: Vec<EthereumEvent>) -> anyhow::Result<()> {
        let mut storage = self.storage().await?;
        let mut db_transaction = storage.start_transaction().await?;
        for event in events {
            let record = safe_history_storage::events::records::NewEthereumEvent {
                ethereum_tx_hash: hash_to_bytes(&event.ethereum_tx_hash),
                block_number: event.block_number as i64,
                log_index: event.log_index as i64,
                address: address_to_bytes(&event.address),
                topic: hash_to_bytes(&event.topic),
                arguments: event.arguments(),
            };
            db_transaction.events_schema().insert_event(record).await?;
        }
        db_transaction.commit().await?;
        Ok(())
    }

    async fn register_safe(
        &mut self,
        address: Address,
        ethereum_tx_hash: Option<H256>,
        created_block_number: u64,
    ) -> anyhow::Result<bool> {
        let mut storage = self.storage().await?;
        let created = storage
            .safe_schema()
            .insert_safe_contract(
                address_to_bytes(&address),
                ethereum_tx_hash.as_ref().map(hash_to_bytes),
                created_block_number as i64,
            )
            .await?;
        Ok(created)
    }

    async fn monitored_safes(
        &mut self,
        stream: CursorStream,
        below_block: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<MonitoredAddress>> {
        let mut storage = self.storage().await?;
        let stored = storage
            .safe_schema()
            .safes_below(stream.into(), below_block as i64, limit as i64)
            .await?;
        stored
            .into_iter()
            .map(|row| {
                Ok(MonitoredAddress {
                    address: bytes_to_address(&row.address)?,
                    cursor_block_number: row.cursor_block_number as u64,
                })
            })
            .collect()
    }

    async fn advance_safe_cursors(
        &mut self,
        stream: CursorStream,
        addresses: &[Address],
        block_number: u64,
    ) -> anyhow::Result<()> {
        let mut storage = self.storage().await?;
        let addresses: Vec<Vec<u8>> = addresses.iter().map(address_to_bytes).collect();
        storage
            .safe_schema()
            .update_safe_cursors(stream.into(), &addresses, block_number as i64)
            .await?;
        Ok(())
    }

    async fn register_proxy_factory(
        &mut self,
        address: Address,
        initial_block_number: u64,
    ) -> anyhow::Result<()> {
        let mut storage = self.storage().await?;
        storage
            .safe_schema()
            .insert_proxy_factory(address_to_bytes(&address), initial_block_number as i64)
            .await?;
        Ok(())
    }

    async fn monitored_proxy_factories(
        &mut self,
        below_block: u64,
    ) -> anyhow::Result<Vec<MonitoredAddress>> {
        let mut storage = self.storage().await?;
        let stored = storage
            .safe_schema()
            .proxy_factories_below(below_block as i64)
            .await?;
        stored
            .into_iter()
            .map(|row| {
                Ok(MonitoredAddress {
                    address: bytes_to_address(&row.address)?,
                    cursor_block_number: row.tx_block_number as u64,
                })
            })
            .collect()
    }

    async fn advance_proxy_factory_cursor(
        &mut self,
        address: Address,
        block_number: u64,
    ) -> anyhow::Result<()> {
        let mut storage = self.storage().await?;
        storage
            .safe_schema()
            .update_proxy_factory_cursor(&address_to_bytes(&address), block_number as i64)
            .await?;
        Ok(())
    }

    async fn pending_invocations(
        &mut self,
        limit: usize,
    ) -> anyhow::Result<Vec<DecodedInvocation>> {
        let mut storage = self.storage().await?;
        let stored = storage
            .internal_txs_schema()
            .pending_decoded(limit as i64)
            .await?;
        stored.into_iter().map(invocation_from_stored).collect()
    }

    async fn last_safe_status(
        &mut self,
        address: Address,
    ) -> anyhow::Result<Option<SafeStatus>> {
        let mut storage = self.storage().await?;
        let stored = storage
            .safe_schema()
            .last_status_for_address(&address_to_bytes(&address))
            .await?;
        stored
            .map(|row| {
                let owners: Vec<String> = serde_json::from_value(row.owners)?;
                let owners = owners
                    .iter()
                    .map(|owner| {
                        let bytes = safe_history_types::utils::from_hex_string(owner)?;
                        Ok(Address::from_slice(&bytes))
                    })
                    .collect::<anyhow::Result<Vec<Address>>>()?;
                Ok(SafeStatus {
                    address,
                    owners,
                    threshold: row.threshold as u64,
                    nonce: Nonce(row.nonce as u64),
                    master_copy: bytes_to_address(&row.master_copy)?,
                })
            })
            .transpose()
    }

    async fn parent_trace_from(
        &mut self,
        ethereum_tx_hash: H256,
        parent_trace_address: &[u64],
    ) -> anyhow::Result<Option<Address>> {
        let mut storage = self.storage().await?;
        let stored = storage
            .internal_txs_schema()
            .parent_trace_from(
                &hash_to_bytes(&ethereum_tx_hash),
                trace_address_to_sql(parent_trace_address),
            )
            .await?;
        stored.as_deref().map(bytes_to_address).transpose()
    }

    async fn commit_invocation(&mut self, commit: CommittedInvocation) -> anyhow::Result<()> {
        let mut storage = self.storage().await?;
        let mut db_transaction = storage.start_transaction().await?;

        apply_effects(&mut db_transaction, commit.effects).await?;
        if commit.mark_processed {
            db_transaction
                .internal_txs_schema()
                .mark_processed(commit.id, commit.successful)
                .await?;
        }

        db_transaction.commit().await?;
        Ok(())
    }

    async fn erc721_tokens_transferred_to(
        &mut self,
        owner: Address,
    ) -> anyhow::Result<Vec<(Address, U256)>> {
        let mut storage = self.storage().await?;
        let events = storage
            .events_schema()
            .erc721_transfers_to_address(&checksum_address(&owner))
            .await?;

        let mut seen = Vec::new();
        for event in events {
            let token_address = bytes_to_address(&event.address)?;
            let token_id = event
                .arguments
                .get("tokenId")
                .and_then(|value| value.as_str())
                .map(U256::from_dec_str)
                .transpose()
                .map_err(|err| format_err!("stored tokenId is not decimal: {:?}", err))?
                .ok_or_else(|| format_err!("erc721 row without tokenId"))?;
            let pair = (token_address, token_id);
            if !seen.contains(&pair) {
                seen.push(pair);
            }
        }
        Ok(seen)
    }
}
