// Built-in deps
// External imports
// Workspace imports
// Local imports
use self::records::{
    NewMultisigTransaction, StoredMultisigConfirmation, StoredMultisigTransaction,
};
use crate::{QueryResult, StorageProcessor};

pub mod records;

/// Multisig schema stores the multi-sig transaction lifecycle: rows created
/// by API submissions (not yet executed), rows recovered from traces, and
/// the confirmations attached to both.
#[derive(Debug)]
pub struct MultisigSchema<'a, 'c>(pub &'a mut StorageProcessor<'c>);

impl<'a, 'c> MultisigSchema<'a, 'c> {
    pub async fn get_transaction(
        &mut self,
        safe_tx_hash: &[u8],
    ) -> QueryResult<Option<StoredMultisigTransaction>> {
        let tx = sqlx::query_as::<_, StoredMultisigTransaction>(
            "SELECT * FROM multisig_transactions WHERE safe_tx_hash = $1",
        )
        .bind(safe_tx_hash)
        .fetch_optional(self.0.conn())
        .await?;
        Ok(tx)
    }

    pub async fn transactions_for_safe(
        &mut self,
        safe_address: &[u8],
    ) -> QueryResult<Vec<StoredMultisigTransaction>> {
        let txs = sqlx::query_as::<_, StoredMultisigTransaction>(
            "SELECT * FROM multisig_transactions WHERE safe_address = $1
             ORDER BY nonce ASC, created_at ASC",
        )
        .bind(safe_address)
        .fetch_all(self.0.conn())
        .await?;
        Ok(txs)
    }

    /// Deletes rows that share the execution transaction, wallet and nonce
    /// with a freshly computed hash but disagree on the hash itself. Such
    /// rows come from earlier indexing against an outdated master copy.
    pub async fn delete_stale_transactions(
        &mut self,
        ethereum_tx_hash: &[u8],
        safe_address: &[u8],
        nonce: i64,
        safe_tx_hash_to_keep: &[u8],
    ) -> QueryResult<u64> {
        let result = sqlx::query(
            "DELETE FROM multisig_transactions
             WHERE ethereum_tx_hash = $1 AND safe_address = $2 AND nonce = $3
               AND safe_tx_hash <> $4",
        )
        .bind(ethereum_tx_hash)
        .bind(safe_address)
        .bind(nonce)
        .bind(safe_tx_hash_to_keep)
        .execute(self.0.conn())
        .await?;
        Ok(result.rows_affected())
    }

    /// Stores a multi-sig transaction recovered from a trace. If the row
    /// already exists from an earlier API submission and has no execution
    /// transaction yet, the execution context is filled in; afterwards any
    /// dangling confirmations are linked to the row.
    pub async fn upsert_from_chain(&mut self, tx: NewMultisigTransaction) -> QueryResult<()> {
        let result = sqlx::query(
            "INSERT INTO multisig_transactions
               (safe_tx_hash, safe_address, ethereum_tx_hash, to_address, value, data,
                operation, safe_tx_gas, base_gas, gas_price, gas_token, refund_receiver,
                nonce, signatures, failed, origin)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             ON CONFLICT (safe_tx_hash) DO NOTHING",
        )
        .bind(tx.safe_tx_hash.clone())
        .bind(tx.safe_address)
        .bind(tx.ethereum_tx_hash.clone())
        .bind(tx.to_address)
        .bind(tx.value)
        .bind(tx.data)
        .bind(tx.operation)
        .bind(tx.safe_tx_gas)
        .bind(tx.base_gas)
        .bind(tx.gas_price)
        .bind(tx.gas_token)
        .bind(tx.refund_receiver)
        .bind(tx.nonce)
        .bind(tx.signatures.clone())
        .bind(tx.failed)
        .bind(tx.origin)
        .execute(self.0.conn())
        .await?;

        if result.rows_affected() == 0 {
            sqlx::query(
                "UPDATE multisig_transactions
                 SET ethereum_tx_hash = $2, failed = $3, signatures = $4
                 WHERE safe_tx_hash = $1 AND ethereum_tx_hash IS NULL",
            )
            .bind(tx.safe_tx_hash.clone())
            .bind(tx.ethereum_tx_hash)
            .bind(tx.failed)
            .bind(tx.signatures)
            .execute(self.0.conn())
            .await?;
        }

        self.link_confirmations(&tx.safe_tx_hash).await?;
        Ok(())
    }

    /// Stores a transaction submitted through the API before execution.
    /// Duplicate submissions are absorbed.
    pub async fn insert_offchain_transaction(
        &mut self,
        tx: NewMultisigTransaction,
    ) -> QueryResult<()> {
        sqlx::query(
            "INSERT INTO multisig_transactions
               (safe_tx_hash, safe_address, ethereum_tx_hash, to_address, value, data,
                operation, safe_tx_gas, base_gas, gas_price, gas_token, refund_receiver,
                nonce, signatures, failed, origin)
             VALUES ($1, $2, NULL, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NULL, $14)
             ON CONFLICT (safe_tx_hash) DO NOTHING",
        )
        .bind(tx.safe_tx_hash.clone())
        .bind(tx.safe_address)
        .bind(tx.to_address)
        .bind(tx.value)
        .bind(tx.data)
        .bind(tx.operation)
        .bind(tx.safe_tx_gas)
        .bind(tx.base_gas)
        .bind(tx.gas_price)
        .bind(tx.gas_token)
        .bind(tx.refund_receiver)
        .bind(tx.nonce)
        .bind(tx.signatures)
        .bind(tx.origin)
        .execute(self.0.conn())
        .await?;

        self.link_confirmations(&tx.safe_tx_hash).await?;
        Ok(())
    }

    /// Inserts or completes a confirmation.
    ///
    /// A row observed on-chain first (`approveHash`) has no signature; one
    /// submitted off-chain first has no execution transaction. Whichever
    /// half arrives later fills in the missing piece, and a changed
    /// recovered signature replaces the stored one.
    pub async fn upsert_confirmation(
        &mut self,
        multisig_transaction_hash: &[u8],
        owner: &[u8],
        ethereum_tx_hash: Option<Vec<u8>>,
        signature: Option<Vec<u8>>,
    ) -> QueryResult<()> {
        let linked_transaction: Option<(Vec<u8>,)> = sqlx::query_as(
            "SELECT safe_tx_hash FROM multisig_transactions WHERE safe_tx_hash = $1",
        )
        .bind(multisig_transaction_hash)
        .fetch_optional(self.0.conn())
        .await?;
        let multisig_transaction_id = linked_transaction.map(|(hash,)| hash);

        let result = sqlx::query(
            "INSERT INTO multisig_confirmations
               (multisig_transaction_hash, multisig_transaction_id, owner,
                ethereum_tx_hash, signature)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (multisig_transaction_hash, owner) DO NOTHING",
        )
        .bind(multisig_transaction_hash)
        .bind(multisig_transaction_id.clone())
        .bind(owner)
        .bind(ethereum_tx_hash.clone())
        .bind(signature.clone())
        .execute(self.0.conn())
        .await?;

        if result.rows_affected() == 0 {
            sqlx::query(
                "UPDATE multisig_confirmations
                 SET ethereum_tx_hash = COALESCE(ethereum_tx_hash, $3),
                     signature = COALESCE($4, signature),
                     multisig_transaction_id = COALESCE(multisig_transaction_id, $5)
                 WHERE multisig_transaction_hash = $1 AND owner = $2",
            )
            .bind(multisig_transaction_hash)
            .bind(owner)
            .bind(ethereum_tx_hash)
            .bind(signature)
            .bind(multisig_transaction_id)
            .execute(self.0.conn())
            .await?;
        }
        Ok(())
    }

    /// Points dangling confirmations of the given hash at the transaction
    /// row. Used when the transaction lands after its confirmations.
    pub async fn link_confirmations(&mut self, safe_tx_hash: &[u8]) -> QueryResult<()> {
        sqlx::query(
            "UPDATE multisig_confirmations
             SET multisig_transaction_id = $1
             WHERE multisig_transaction_hash = $1 AND multisig_transaction_id IS NULL",
        )
        .bind(safe_tx_hash)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    pub async fn confirmations_for(
        &mut self,
        safe_tx_hash: &[u8],
    ) -> QueryResult<Vec<StoredMultisigConfirmation>> {
        let confirmations = sqlx::query_as::<_, StoredMultisigConfirmation>(
            "SELECT * FROM multisig_confirmations
             WHERE multisig_transaction_hash = $1
             ORDER BY owner ASC",
        )
        .bind(safe_tx_hash)
        .fetch_all(self.0.conn())
        .await?;
        Ok(confirmations)
    }
}
