// Built-in deps
use std::convert::TryFrom;
// External deps
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web3::types::{Block, Transaction, TransactionReceipt};
// Workspace deps
use safe_history_basic_types::{Address, BlockNumber, TransactionIndex, H256, U256};

#[derive(Debug, Error, PartialEq)]
pub enum BlockConvertError {
    #[error("block is pending (missing number or hash)")]
    PendingBlock,
    #[error("transaction is pending (missing block context)")]
    PendingTransaction,
    #[error("transaction has no sender")]
    MissingSender,
}

/// A mined block, the fields the ledger keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockData {
    pub number: BlockNumber,
    pub hash: H256,
    pub parent_hash: H256,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
}

impl TryFrom<&Block<H256>> for BlockData {
    type Error = BlockConvertError;

    fn try_from(block: &Block<H256>) -> Result<Self, Self::Error> {
        let number = block.number.ok_or(BlockConvertError::PendingBlock)?;
        let hash = block.hash.ok_or(BlockConvertError::PendingBlock)?;
        Ok(BlockData {
            number: BlockNumber(number.as_u64()),
            hash,
            parent_hash: block.parent_hash,
            timestamp: block.timestamp.low_u64(),
            gas_limit: block.gas_limit.low_u64(),
            gas_used: block.gas_used.low_u64(),
        })
    }
}

/// A mined Ethereum transaction together with the receipt fields worth
/// keeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthereumTxData {
    pub tx_hash: H256,
    pub block_number: BlockNumber,
    pub transaction_index: TransactionIndex,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub value: U256,
    pub gas: u64,
    pub gas_price: U256,
    pub data: Vec<u8>,
    pub status: Option<u64>,
    pub gas_used: Option<u64>,
}

impl EthereumTxData {
    /// Combines `eth_getTransaction` and `eth_getTransactionReceipt`
    /// responses into the persisted shape.
    pub fn from_parts(
        transaction: &Transaction,
        receipt: Option<&TransactionReceipt>,
    ) -> Result<Self, BlockConvertError> {
        let block_number = transaction
            .block_number
            .ok_or(BlockConvertError::PendingTransaction)?;
        let transaction_index = transaction
            .transaction_index
            .ok_or(BlockConvertError::PendingTransaction)?;

        Ok(EthereumTxData {
            tx_hash: transaction.hash,
            block_number: BlockNumber(block_number.as_u64()),
            transaction_index: TransactionIndex(transaction_index.as_u64()),
            from: transaction.from.ok_or(BlockConvertError::MissingSender)?,
            to: transaction.to,
            nonce: transaction.nonce.low_u64(),
            value: transaction.value,
            gas: transaction.gas.low_u64(),
            gas_price: transaction.gas_price.unwrap_or_default(),
            data: transaction.input.0.clone(),
            status: receipt.and_then(|r| r.status).map(|status| status.as_u64()),
            gas_used: receipt
                .and_then(|r| r.gas_used)
                .map(|gas_used| gas_used.low_u64()),
        })
    }
}
