// Built-in deps
// External imports
use serde_json::Value;
// Workspace imports
// Local imports
use self::records::{NewInternalTx, StoredInternalTx, StoredPendingInvocation};
use crate::{QueryResult, StorageProcessor};

pub mod records;

/// InternalTxs schema stores the call trees of the indexed transactions,
/// the decoded form of the decodable traces and the processor queue built
/// on top of them.
#[derive(Debug)]
pub struct InternalTxsSchema<'a, 'c>(pub &'a mut StorageProcessor<'c>);

impl<'a, 'c> InternalTxsSchema<'a, 'c> {
    /// Inserts one trace. Returns the row id together with a flag telling
    /// whether the row was actually created by this call; replays of
    /// already-stored traces come back with `created = false`.
    pub async fn insert_internal_tx(&mut self, tx: NewInternalTx) -> QueryResult<(i64, bool)> {
        let inserted: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO internal_txs
               (ethereum_tx_hash, block_number, transaction_index, trace_address, trace_type,
                call_type, from_address, to_address, value, data, contract_address, error)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (ethereum_tx_hash, trace_address) DO NOTHING
             RETURNING id",
        )
        .bind(tx.ethereum_tx_hash.clone())
        .bind(tx.block_number)
        .bind(tx.transaction_index)
        .bind(tx.trace_address.clone())
        .bind(tx.trace_type)
        .bind(tx.call_type)
        .bind(tx.from_address)
        .bind(tx.to_address)
        .bind(tx.value)
        .bind(tx.data)
        .bind(tx.contract_address)
        .bind(tx.error)
        .fetch_optional(self.0.conn())
        .await?;

        if let Some((id,)) = inserted {
            return Ok((id, true));
        }

        let (id,): (i64,) = sqlx::query_as(
            "SELECT id FROM internal_txs WHERE ethereum_tx_hash = $1 AND trace_address = $2",
        )
        .bind(tx.ethereum_tx_hash)
        .bind(tx.trace_address)
        .fetch_one(self.0.conn())
        .await?;
        Ok((id, false))
    }

    /// Stores the decoded form of one trace. At most one decoded row exists
    /// per trace.
    pub async fn insert_decoded(
        &mut self,
        internal_tx_id: i64,
        function_name: &str,
        arguments: Value,
    ) -> QueryResult<()> {
        sqlx::query(
            "INSERT INTO internal_txs_decoded (internal_tx_id, function_name, arguments)
             VALUES ($1, $2, $3)
             ON CONFLICT (internal_tx_id) DO NOTHING",
        )
        .bind(internal_tx_id)
        .bind(function_name)
        .bind(arguments)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    /// The processor queue: not-yet-processed decoded invocations in strict
    /// chain order.
    pub async fn pending_decoded(
        &mut self,
        limit: i64,
    ) -> QueryResult<Vec<StoredPendingInvocation>> {
        let pending = sqlx::query_as::<_, StoredPendingInvocation>(
            "SELECT d.internal_tx_id, d.function_name, d.arguments,
                    i.ethereum_tx_hash, i.block_number, i.transaction_index, i.trace_address,
                    i.trace_type, i.call_type, i.from_address, i.to_address, i.value, i.data,
                    i.contract_address, i.error
             FROM internal_txs_decoded d
             JOIN internal_txs i ON i.id = d.internal_tx_id
             WHERE NOT d.processed
             ORDER BY i.block_number ASC, i.transaction_index ASC, i.trace_address ASC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.0.conn())
        .await?;
        Ok(pending)
    }

    /// Marks an invocation as consumed by the processor. `processed` is
    /// monotonic: once set it is never cleared.
    pub async fn mark_processed(
        &mut self,
        internal_tx_id: i64,
        successfully: bool,
    ) -> QueryResult<()> {
        sqlx::query(
            "UPDATE internal_txs_decoded
             SET processed = TRUE, processed_successfully = $2
             WHERE internal_tx_id = $1",
        )
        .bind(internal_tx_id)
        .bind(successfully)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    /// The `from` address of the parent trace of the given trace, used to
    /// attribute `approveHash` invocations to the caller of the wallet.
    pub async fn parent_trace_from(
        &mut self,
        ethereum_tx_hash: &[u8],
        parent_trace_address: Vec<i64>,
    ) -> QueryResult<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as(
            "SELECT from_address FROM internal_txs
             WHERE ethereum_tx_hash = $1 AND trace_address = $2",
        )
        .bind(ethereum_tx_hash)
        .bind(parent_trace_address)
        .fetch_optional(self.0.conn())
        .await?;
        Ok(row.map(|(from_address,)| from_address))
    }

    pub async fn get_internal_tx(&mut self, id: i64) -> QueryResult<Option<StoredInternalTx>> {
        let tx = sqlx::query_as::<_, StoredInternalTx>(
            "SELECT * FROM internal_txs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.0.conn())
        .await?;
        Ok(tx)
    }
}
