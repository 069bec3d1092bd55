// Built-in deps
// External imports
// Workspace imports
// Local imports
use self::records::{
    MonitoredAddress, NewSafeStatus, StoredProxyFactory, StoredSafeContract, StoredSafeStatus,
};
use crate::{QueryResult, StorageProcessor};

pub mod records;

/// Cursor column of one indexing stream. Every stream advances its own
/// column independently; none of them ever decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorField {
    InternalTxs,
    Events,
    Erc20,
}

impl CursorField {
    fn column(self) -> &'static str {
        match self {
            CursorField::InternalTxs => "tx_block_number",
            CursorField::Events => "events_block_number",
            CursorField::Erc20 => "erc20_block_number",
        }
    }
}

/// Safe schema tracks the discovered wallets and proxy factories, their
/// per-stream cursors and the append-only wallet state log.
#[derive(Debug)]
pub struct SafeSchema<'a, 'c>(pub &'a mut StorageProcessor<'c>);

impl<'a, 'c> SafeSchema<'a, 'c> {
    /// Registers a newly discovered Safe. Every cursor starts at the block
    /// the wallet was created in, so no stream ever scans before it exists.
    /// Returns whether the wallet was unknown before this call.
    pub async fn insert_safe_contract(
        &mut self,
        address: Vec<u8>,
        ethereum_tx_hash: Option<Vec<u8>>,
        created_block_number: i64,
    ) -> QueryResult<bool> {
        let result = sqlx::query(
            "INSERT INTO safe_contracts
               (address, ethereum_tx_hash, created_block_number,
                tx_block_number, events_block_number, erc20_block_number)
             VALUES ($1, $2, $3, $3, $3, $3)
             ON CONFLICT (address) DO NOTHING",
        )
        .bind(address)
        .bind(ethereum_tx_hash)
        .bind(created_block_number)
        .execute(self.0.conn())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_safe_contract(
        &mut self,
        address: &[u8],
    ) -> QueryResult<Option<StoredSafeContract>> {
        let contract = sqlx::query_as::<_, StoredSafeContract>(
            "SELECT * FROM safe_contracts WHERE address = $1",
        )
        .bind(address)
        .fetch_optional(self.0.conn())
        .await?;
        Ok(contract)
    }

    pub async fn insert_proxy_factory(
        &mut self,
        address: Vec<u8>,
        initial_block_number: i64,
    ) -> QueryResult<()> {
        sqlx::query(
            "INSERT INTO proxy_factories (address, initial_block_number, tx_block_number)
             VALUES ($1, $2, $2)
             ON CONFLICT (address) DO NOTHING",
        )
        .bind(address)
        .bind(initial_block_number)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    pub async fn proxy_factories_below(
        &mut self,
        block_number: i64,
    ) -> QueryResult<Vec<StoredProxyFactory>> {
        let factories = sqlx::query_as::<_, StoredProxyFactory>(
            "SELECT * FROM proxy_factories WHERE tx_block_number < $1 ORDER BY tx_block_number ASC",
        )
        .bind(block_number)
        .fetch_all(self.0.conn())
        .await?;
        Ok(factories)
    }

    /// Advances a proxy-factory cursor. Going backwards is a no-op.
    pub async fn update_proxy_factory_cursor(
        &mut self,
        address: &[u8],
        block_number: i64,
    ) -> QueryResult<()> {
        sqlx::query(
            "UPDATE proxy_factories SET tx_block_number = $2
             WHERE address = $1 AND tx_block_number < $2",
        )
        .bind(address)
        .bind(block_number)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    /// Monitored Safes whose cursor for the given stream lags behind
    /// `block_number`, most-behind first.
    pub async fn safes_below(
        &mut self,
        field: CursorField,
        block_number: i64,
        limit: i64,
    ) -> QueryResult<Vec<MonitoredAddress>> {
        let query = format!(
            "SELECT address, {column} AS cursor_block_number FROM safe_contracts
             WHERE {column} < $1
             ORDER BY {column} ASC
             LIMIT $2",
            column = field.column()
        );
        let addresses = sqlx::query_as::<_, MonitoredAddress>(&query)
            .bind(block_number)
            .bind(limit)
            .fetch_all(self.0.conn())
            .await?;
        Ok(addresses)
    }

    /// Advances the stream cursor of the given Safes. Addresses whose
    /// cursor is already past `block_number` are left untouched, so the
    /// cursor never decreases.
    pub async fn update_safe_cursors(
        &mut self,
        field: CursorField,
        addresses: &[Vec<u8>],
        block_number: i64,
    ) -> QueryResult<()> {
        let query = format!(
            "UPDATE safe_contracts SET {column} = $2
             WHERE address = ANY($1) AND {column} < $2",
            column = field.column()
        );
        sqlx::query(&query)
            .bind(addresses.to_vec())
            .bind(block_number)
            .execute(self.0.conn())
            .await?;
        Ok(())
    }

    pub async fn insert_safe_status(&mut self, status: NewSafeStatus) -> QueryResult<()> {
        sqlx::query(
            "INSERT INTO safe_statuses
               (internal_tx_id, address, block_number, transaction_index, trace_address,
                owners, threshold, nonce, master_copy)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (internal_tx_id) DO NOTHING",
        )
        .bind(status.internal_tx_id)
        .bind(status.address)
        .bind(status.block_number)
        .bind(status.transaction_index)
        .bind(status.trace_address)
        .bind(status.owners)
        .bind(status.threshold)
        .bind(status.nonce)
        .bind(status.master_copy)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    /// The current state of a wallet: the snapshot with the greatest
    /// `(block_number, transaction_index, trace_address)` tuple.
    pub async fn last_status_for_address(
        &mut self,
        address: &[u8],
    ) -> QueryResult<Option<StoredSafeStatus>> {
        let status = sqlx::query_as::<_, StoredSafeStatus>(
            "SELECT * FROM safe_statuses WHERE address = $1
             ORDER BY block_number DESC, transaction_index DESC, trace_address DESC
             LIMIT 1",
        )
        .bind(address)
        .fetch_optional(self.0.conn())
        .await?;
        Ok(status)
    }

    /// Full state history of a wallet in chain order.
    pub async fn status_history_for_address(
        &mut self,
        address: &[u8],
    ) -> QueryResult<Vec<StoredSafeStatus>> {
        let statuses = sqlx::query_as::<_, StoredSafeStatus>(
            "SELECT * FROM safe_statuses WHERE address = $1
             ORDER BY block_number ASC, transaction_index ASC, trace_address ASC",
        )
        .bind(address)
        .fetch_all(self.0.conn())
        .await?;
        Ok(statuses)
    }
}
