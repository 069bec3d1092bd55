// Built-in deps
// External imports
// Workspace imports
// Local imports
use self::records::{NewBlock, NewEthereumTx, StoredBlock, StoredEthereumTx};
use crate::{QueryResult, StorageProcessor};

pub mod records;

/// Ethereum schema stores the blocks and transactions fetched from the
/// chain. Both are immutable once stored; repeated saves of the same block
/// or transaction are absorbed.
#[derive(Debug)]
pub struct EthereumSchema<'a, 'c>(pub &'a mut StorageProcessor<'c>);

impl<'a, 'c> EthereumSchema<'a, 'c> {
    pub async fn save_block(&mut self, block: NewBlock) -> QueryResult<()> {
        sqlx::query(
            "INSERT INTO ethereum_blocks (number, hash, parent_hash, timestamp, gas_limit, gas_used)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (number) DO NOTHING",
        )
        .bind(block.number)
        .bind(block.hash)
        .bind(block.parent_hash)
        .bind(block.timestamp)
        .bind(block.gas_limit)
        .bind(block.gas_used)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    pub async fn get_block(&mut self, number: i64) -> QueryResult<Option<StoredBlock>> {
        let block = sqlx::query_as::<_, StoredBlock>(
            "SELECT * FROM ethereum_blocks WHERE number = $1",
        )
        .bind(number)
        .fetch_optional(self.0.conn())
        .await?;
        Ok(block)
    }

    pub async fn save_transaction(&mut self, tx: NewEthereumTx) -> QueryResult<()> {
        sqlx::query(
            "INSERT INTO ethereum_txs
               (tx_hash, block_number, transaction_index, from_address, to_address,
                nonce, value, gas, gas_price, data, status, gas_used)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (tx_hash) DO NOTHING",
        )
        .bind(tx.tx_hash)
        .bind(tx.block_number)
        .bind(tx.transaction_index)
        .bind(tx.from_address)
        .bind(tx.to_address)
        .bind(tx.nonce)
        .bind(tx.value)
        .bind(tx.gas)
        .bind(tx.gas_price)
        .bind(tx.data)
        .bind(tx.status)
        .bind(tx.gas_used)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    pub async fn get_transaction(
        &mut self,
        tx_hash: &[u8],
    ) -> QueryResult<Option<StoredEthereumTx>> {
        let tx = sqlx::query_as::<_, StoredEthereumTx>(
            "SELECT * FROM ethereum_txs WHERE tx_hash = $1",
        )
        .bind(tx_hash)
        .fetch_optional(self.0.conn())
        .await?;
        Ok(tx)
    }
}
