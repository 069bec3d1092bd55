// Built-in deps
// External imports
// Workspace imports
// Local imports
use self::records::{NewEthereumEvent, StoredEthereumEvent};
use crate::{QueryResult, StorageProcessor};

pub mod records;

/// Events schema stores the token-standard logs observed on monitored
/// addresses. ERC-20 rows carry a `value` argument, ERC-721 rows a
/// `tokenId` argument; the readers discriminate by that shape.
#[derive(Debug)]
pub struct EventsSchema<'a, 'c>(pub &'a mut StorageProcessor<'c>);

impl<'a, 'c> EventsSchema<'a, 'c> {
    pub async fn insert_event(&mut self, event: NewEthereumEvent) -> QueryResult<()> {
        sqlx::query(
            "INSERT INTO ethereum_events
               (ethereum_tx_hash, block_number, log_index, address, topic, arguments)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (ethereum_tx_hash, log_index) DO NOTHING",
        )
        .bind(event.ethereum_tx_hash)
        .bind(event.block_number)
        .bind(event.log_index)
        .bind(event.address)
        .bind(event.topic)
        .bind(event.arguments)
        .execute(self.0.conn())
        .await?;
        Ok(())
    }

    /// ERC-721 transfer rows that moved a token towards `owner`, in chain
    /// order. The collectibles resolver verifies current ownership against
    /// the chain afterwards.
    pub async fn erc721_transfers_to_address(
        &mut self,
        owner_checksummed: &str,
    ) -> QueryResult<Vec<StoredEthereumEvent>> {
        let events = sqlx::query_as::<_, StoredEthereumEvent>(
            "SELECT * FROM ethereum_events
             WHERE arguments ? 'tokenId' AND arguments->>'to' = $1
             ORDER BY block_number ASC, log_index ASC",
        )
        .bind(owner_checksummed)
        .fetch_all(self.0.conn())
        .await?;
        Ok(events)
    }

    /// All stored transfer rows touching the address, both token standards,
    /// both directions.
    pub async fn transfers_for_address(
        &mut self,
        address_checksummed: &str,
    ) -> QueryResult<Vec<StoredEthereumEvent>> {
        let events = sqlx::query_as::<_, StoredEthereumEvent>(
            "SELECT * FROM ethereum_events
             WHERE arguments->>'to' = $1 OR arguments->>'from' = $1
             ORDER BY block_number ASC, log_index ASC",
        )
        .bind(address_checksummed)
        .fetch_all(self.0.conn())
        .await?;
        Ok(events)
    }
}
