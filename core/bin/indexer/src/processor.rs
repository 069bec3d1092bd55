//! The state machine deriving wallet state and the multi-sig transaction
//! lifecycle from decoded invocations.
//!
//! Invocations are consumed in strict `(block_number, tx_index,
//! trace_address)` order. Every invocation commits atomically: the derived
//! rows and the `processed` mark land in one ledger transaction, so a crash
//! replays the invocation instead of losing it.

// Built-in deps
// External deps
use once_cell::sync::Lazy;
// Workspace deps
use safe_history_config::ProcessorConfig;
use safe_history_contracts::{safe_contract_v1_0_0, safe_contract_v1_1_1};
use safe_history_eth_client::EthereumGateway;
use safe_history_types::signature::parse_signatures;
use safe_history_types::{
    Address, ExecTransactionArgs, Nonce, SafeOperation, SafeStatus, SafeTx, H256, NULL_ADDRESS,
    U256,
};
// Local deps
use crate::storage_interactor::{
    CommittedInvocation, ConfirmationData, DecodedInvocation, InvocationEffects,
    MultisigTransactionData, StatusTransition, StorageInteractor,
};

/// Failure events across the supported master-copy versions:
/// `ExecutionFailure(bytes32,uint256)` since v1.0.0 and the older
/// `ExecutionFailed(bytes32)`. Both carry the safe tx hash as the first
/// data word.
static FAILURE_TOPICS: Lazy<[H256; 2]> = Lazy::new(|| {
    [
        safe_contract_v1_1_1()
            .event("ExecutionFailure")
            .expect("safe contract abi")
            .signature(),
        safe_contract_v1_0_0()
            .event("ExecutionFailed")
            .expect("safe contract abi")
            .signature(),
    ]
});

/// Processor for invocations of the Safe master copies v0.0.1 - v1.1.1.
pub struct SafeTxProcessor<W> {
    client: W,
    config: ProcessorConfig,
}

impl<W: EthereumGateway> SafeTxProcessor<W> {
    pub fn new(client: W, config: ProcessorConfig) -> Self {
        Self { client, config }
    }

    /// Drains one batch of the pending queue. Returns the amount of
    /// processed invocations; a ledger or RPC failure stops the batch so
    /// the ordering contract holds on retry.
    pub async fn process_pending<I: StorageInteractor>(
        &self,
        interactor: &mut I,
    ) -> anyhow::Result<usize> {
        let pending = interactor
            .pending_invocations(self.config.batch_size)
            .await?;
        let mut processed = 0;
        for invocation in pending {
            self.process_invocation(interactor, invocation).await?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Applies one decoded invocation.
    pub async fn process_invocation<I: StorageInteractor>(
        &self,
        interactor: &mut I,
        invocation: DecodedInvocation,
    ) -> anyhow::Result<bool> {
        let operation = match SafeOperation::from_decoded(&invocation.call) {
            Ok(operation) => operation,
            Err(err) => {
                // The arguments were persisted by the decoder, so a parse
                // failure here means drifted data. Keep the queue moving.
                vlog::error!(
                    "cannot parse stored invocation of `{}` (tx {:?}, trace {:?}): {}",
                    invocation.call.function_name,
                    invocation.internal_tx.ethereum_tx_hash,
                    invocation.internal_tx.trace_address,
                    err
                );
                let commit = CommittedInvocation {
                    id: invocation.id,
                    mark_processed: true,
                    successful: false,
                    effects: InvocationEffects::None,
                };
                interactor.commit_invocation(commit).await?;
                return Ok(false);
            }
        };

        let contract_address = invocation.internal_tx.from;
        let (successful, mark_processed, effects) = match operation {
            SafeOperation::Setup { owners, threshold } => {
                if contract_address == NULL_ADDRESS {
                    (false, true, InvocationEffects::None)
                } else {
                    let master_copy = invocation.internal_tx.to.unwrap_or_default();
                    let status = SafeStatus {
                        address: contract_address,
                        owners,
                        threshold,
                        nonce: Nonce(0),
                        master_copy,
                    };
                    vlog::info!("found new safe {:?}", contract_address);
                    (
                        true,
                        true,
                        InvocationEffects::RegisterSafe {
                            ethereum_tx_hash: invocation.internal_tx.ethereum_tx_hash,
                            created_block_number: invocation.internal_tx.block_number.0,
                            transition: transition_of(&invocation, status),
                        },
                    )
                }
            }
            SafeOperation::AddOwnerWithThreshold { owner, threshold } => {
                match self.load_status(interactor, &invocation).await? {
                    None => (false, true, InvocationEffects::None),
                    Some(mut status) => {
                        status.owners.push(owner);
                        status.threshold = threshold;
                        (
                            true,
                            true,
                            InvocationEffects::NewStatus {
                                transition: transition_of(&invocation, status),
                            },
                        )
                    }
                }
            }
            SafeOperation::RemoveOwner { owner, threshold } => {
                match self.load_status(interactor, &invocation).await? {
                    None => (false, true, InvocationEffects::None),
                    Some(mut status) => {
                        if !status.remove_owner(&owner) {
                            self.log_invariant_violation(&invocation, "owner not in set");
                        }
                        status.threshold = threshold;
                        (
                            true,
                            true,
                            InvocationEffects::NewStatus {
                                transition: transition_of(&invocation, status),
                            },
                        )
                    }
                }
            }
            SafeOperation::SwapOwner {
                old_owner,
                new_owner,
            } => match self.load_status(interactor, &invocation).await? {
                None => (false, true, InvocationEffects::None),
                Some(mut status) => {
                    if !status.swap_owner(&old_owner, new_owner) {
                        self.log_invariant_violation(&invocation, "old owner not in set");
                    }
                    (
                        true,
                        true,
                        InvocationEffects::NewStatus {
                            transition: transition_of(&invocation, status),
                        },
                    )
                }
            },
            SafeOperation::ChangeThreshold { threshold } => {
                match self.load_status(interactor, &invocation).await? {
                    None => (false, true, InvocationEffects::None),
                    Some(mut status) => {
                        status.threshold = threshold;
                        (
                            true,
                            true,
                            InvocationEffects::NewStatus {
                                transition: transition_of(&invocation, status),
                            },
                        )
                    }
                }
            }
            SafeOperation::ChangeMasterCopy { master_copy } => {
                match self.load_status(interactor, &invocation).await? {
                    None => (false, true, InvocationEffects::None),
                    Some(mut status) => {
                        status.master_copy = master_copy;
                        (
                            true,
                            true,
                            InvocationEffects::NewStatus {
                                transition: transition_of(&invocation, status),
                            },
                        )
                    }
                }
            }
            SafeOperation::ApproveHash { hash } => {
                let owner = self.approve_hash_owner(interactor, &invocation).await?;
                (
                    true,
                    true,
                    InvocationEffects::Confirmation {
                        confirmation: ConfirmationData {
                            multisig_transaction_hash: hash,
                            owner,
                            ethereum_tx_hash: Some(invocation.internal_tx.ethereum_tx_hash),
                            signature: None,
                        },
                    },
                )
            }
            SafeOperation::ExecTransaction(args) => {
                match self.load_status(interactor, &invocation).await? {
                    None => (false, true, InvocationEffects::None),
                    Some(status) => {
                        let effects = self
                            .exec_transaction_effects(&invocation, *args, status)
                            .await?;
                        (true, true, effects)
                    }
                }
            }
            // No side effects or nonce increase, but the trace is consumed.
            SafeOperation::ExecTransactionFromModule => (true, true, InvocationEffects::None),
            SafeOperation::Other(function_name) => {
                vlog::debug!(
                    "no state transition for `{}` on {:?}",
                    function_name,
                    contract_address
                );
                (
                    false,
                    self.config.mark_unknown_as_processed,
                    InvocationEffects::None,
                )
            }
        };

        let commit = CommittedInvocation {
            id: invocation.id,
            mark_processed,
            successful,
            effects,
        };
        interactor.commit_invocation(commit).await?;
        Ok(successful)
    }

    /// The eight-step `execTransaction` derivation; see the transition
    /// table of the processor.
    async fn exec_transaction_effects(
        &self,
        invocation: &DecodedInvocation,
        args: ExecTransactionArgs,
        status: SafeStatus,
    ) -> anyhow::Result<InvocationEffects> {
        let nonce = status.nonce;
        let contract_address = status.address;

        let safe_tx = SafeTx {
            safe: contract_address,
            to: args.to,
            value: args.value,
            data: args.data.clone(),
            operation: args.operation,
            safe_tx_gas: args.safe_tx_gas,
            base_gas: args.base_gas,
            gas_price: args.gas_price,
            gas_token: args.gas_token,
            refund_receiver: args.refund_receiver,
            nonce: U256::from(nonce.0),
            version: args.version,
        };
        let safe_tx_hash = safe_tx.safe_tx_hash();
        let ethereum_tx_hash = invocation.internal_tx.ethereum_tx_hash;

        let failed = self
            .is_failed(ethereum_tx_hash, contract_address, safe_tx_hash)
            .await?;

        let confirmations = match parse_signatures(&args.signatures, safe_tx_hash) {
            Ok(signatures) => signatures
                .into_iter()
                .map(|signature| ConfirmationData {
                    multisig_transaction_hash: safe_tx_hash,
                    owner: signature.owner,
                    ethereum_tx_hash: None,
                    signature: Some(signature.signature),
                })
                .collect(),
            Err(err) => {
                self.log_invariant_violation(
                    invocation,
                    &format!("signature blob does not parse: {}", err),
                );
                Vec::new()
            }
        };

        let transaction = MultisigTransactionData {
            safe_tx_hash,
            safe: contract_address,
            ethereum_tx_hash: Some(ethereum_tx_hash),
            to: Some(args.to),
            value: args.value,
            data: if args.data.is_empty() {
                None
            } else {
                Some(args.data)
            },
            operation: args.operation as u8,
            safe_tx_gas: args.safe_tx_gas,
            base_gas: args.base_gas,
            gas_price: args.gas_price,
            gas_token: none_if_null(args.gas_token),
            refund_receiver: none_if_null(args.refund_receiver),
            nonce,
            signatures: if args.signatures.is_empty() {
                None
            } else {
                Some(args.signatures)
            },
            failed: Some(failed),
            origin: None,
        };

        let mut new_status = status;
        new_status.nonce = Nonce(nonce.0 + 1);

        Ok(InvocationEffects::ExecTransaction {
            transaction,
            confirmations,
            transition: transition_of(invocation, new_status),
        })
    }

    /// Whether the receipt of the execution transaction carries a failure
    /// event matching the safe tx hash.
    async fn is_failed(
        &self,
        ethereum_tx_hash: H256,
        safe_address: Address,
        safe_tx_hash: H256,
    ) -> anyhow::Result<bool> {
        let receipt = match self.client.get_transaction_receipt(ethereum_tx_hash).await? {
            Some(receipt) => receipt,
            None => return Ok(false),
        };

        Ok(receipt.logs.iter().any(|log| {
            log.address == safe_address
                && log
                    .topics
                    .first()
                    .map(|topic| FAILURE_TOPICS.contains(topic))
                    .unwrap_or(false)
                && log.data.0.len() >= 32
                && log.data.0[..32] == safe_tx_hash.as_bytes()[..]
        }))
    }

    /// The owner an on-chain `approveHash` is attributed to: the caller of
    /// the wallet, i.e. the `from` of the previous trace. Root traces fall
    /// back to the trace's own sender.
    async fn approve_hash_owner<I: StorageInteractor>(
        &self,
        interactor: &mut I,
        invocation: &DecodedInvocation,
    ) -> anyhow::Result<Address> {
        if let Some(parent) = invocation.internal_tx.parent_trace_address() {
            let parent = parent.to_vec();
            if let Some(owner) = interactor
                .parent_trace_from(invocation.internal_tx.ethereum_tx_hash, &parent)
                .await?
            {
                return Ok(owner);
            }
        }
        Ok(invocation.internal_tx.from)
    }

    async fn load_status<I: StorageInteractor>(
        &self,
        interactor: &mut I,
        invocation: &DecodedInvocation,
    ) -> anyhow::Result<Option<SafeStatus>> {
        let address = invocation.internal_tx.from;
        let status = interactor.last_safe_status(address).await?;
        if status.is_none() {
            self.log_invariant_violation(invocation, "no state recorded for wallet");
        }
        Ok(status)
    }

    fn log_invariant_violation(&self, invocation: &DecodedInvocation, reason: &str) {
        vlog::error!(
            "error processing trace {:?} of tx {:?} for contract {:?}: {}",
            invocation.internal_tx.trace_address,
            invocation.internal_tx.ethereum_tx_hash,
            invocation.internal_tx.from,
            reason
        );
    }
}

fn transition_of(invocation: &DecodedInvocation, status: SafeStatus) -> StatusTransition {
    StatusTransition {
        internal_tx_id: invocation.id,
        block_number: invocation.internal_tx.block_number.0,
        transaction_index: invocation.internal_tx.transaction_index.0,
        trace_address: invocation.internal_tx.trace_address.clone(),
        status,
    }
}

fn none_if_null(address: Address) -> Option<Address> {
    if address == NULL_ADDRESS {
        None
    } else {
        Some(address)
    }
}
