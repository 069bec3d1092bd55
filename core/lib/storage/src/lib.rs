//! Storage crate provides the interfaces to interact with the database.
//! The backend database used in this crate is `Postgres`, and interaction
//! with it is based on the `sqlx` crate.
//!
//! The essential structure of this crate is the `StorageProcessor`, which
//! holds down the connection to the database and provides abstract
//! interfaces to modify it (called `Schema`s):
//!
//! - `ethereum`, blocks and transactions fetched from the chain;
//! - `internal_txs`, the trace tree, its decoded form and the processor
//!   queue;
//! - `events`, token transfer/approval logs on monitored addresses;
//! - `safe`, the monitored wallets and factories with their per-stream
//!   cursors and the append-only wallet state log;
//! - `multisig`, multi-sig transactions and their confirmations.
//!
//! Most schema modules contain two files: `mod.rs` with the schema itself
//! and `records.rs` with the representation of the associated database
//! tables as structures. Replaying the same chain data through any schema
//! is idempotent: every insert either lands on a fresh unique key or is
//! absorbed by the corresponding `ON CONFLICT` clause.

// Built-in deps
// External imports
use sqlx::{postgres::Postgres, Connection, PgConnection, Transaction};
// Workspace imports
// Local imports
use crate::connection::{ConnectionHolder, PooledConnection};

pub mod connection;
pub mod ethereum;
pub mod events;
pub mod internal_txs;
pub mod multisig;
pub mod safe;
pub mod utils;

#[cfg(all(test, feature = "db_test"))]
mod tests;

pub use crate::connection::ConnectionPool;
pub type QueryResult<T> = Result<T, anyhow::Error>;

/// Storage processor is the main storage interaction point.
/// It holds down the connection (either direct or pooled) to the database
/// and provide methods to obtain different storage schemas.
#[derive(Debug)]
pub struct StorageProcessor<'a> {
    conn: ConnectionHolder<'a>,
    in_transaction: bool,
}

impl<'a> StorageProcessor<'a> {
    /// Creates a `StorageProcessor` using an unique sole connection to the database.
    pub async fn establish_connection<'b>(
        database_url: &str,
    ) -> QueryResult<StorageProcessor<'b>> {
        let connection = PgConnection::connect(database_url).await?;
        Ok(StorageProcessor {
            conn: ConnectionHolder::Direct(connection),
            in_transaction: false,
        })
    }

    pub async fn start_transaction<'c: 'b, 'b>(
        &'c mut self,
    ) -> Result<StorageProcessor<'b>, anyhow::Error> {
        let transaction = self.conn().begin().await?;

        let mut processor = StorageProcessor::from_transaction(transaction);
        processor.in_transaction = true;

        Ok(processor)
    }

    /// Checks if the `StorageProcessor` is currently within database transaction.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn from_transaction(conn: Transaction<'_, Postgres>) -> StorageProcessor<'_> {
        StorageProcessor {
            conn: ConnectionHolder::Transaction(conn),
            in_transaction: true,
        }
    }

    pub async fn commit(self) -> QueryResult<()> {
        if let ConnectionHolder::Transaction(transaction) = self.conn {
            transaction.commit().await?;
            Ok(())
        } else {
            panic!("StorageProcessor::commit can only be invoked after calling StorageProcessor::start_transaction");
        }
    }

    /// Creates a `StorageProcessor` using a pool of connections.
    /// This method borrows one of the connections from the pool, and releases it
    /// after `drop`.
    pub fn from_pool(conn: PooledConnection) -> Self {
        Self {
            conn: ConnectionHolder::Pooled(conn),
            in_transaction: false,
        }
    }

    /// Gains access to the `Ethereum` schema.
    pub fn ethereum_schema(&mut self) -> ethereum::EthereumSchema<'_, 'a> {
        ethereum::EthereumSchema(self)
    }

    /// Gains access to the `InternalTxs` schema.
    pub fn internal_txs_schema(&mut self) -> internal_txs::InternalTxsSchema<'_, 'a> {
        internal_txs::InternalTxsSchema(self)
    }

    /// Gains access to the `Events` schema.
    pub fn events_schema(&mut self) -> events::EventsSchema<'_, 'a> {
        events::EventsSchema(self)
    }

    /// Gains access to the `Safe` schema.
    pub fn safe_schema(&mut self) -> safe::SafeSchema<'_, 'a> {
        safe::SafeSchema(self)
    }

    /// Gains access to the `Multisig` schema.
    pub fn multisig_schema(&mut self) -> multisig::MultisigSchema<'_, 'a> {
        multisig::MultisigSchema(self)
    }

    fn conn(&mut self) -> &mut PgConnection {
        match &mut self.conn {
            ConnectionHolder::Pooled(conn) => conn,
            ConnectionHolder::Direct(conn) => conn,
            ConnectionHolder::Transaction(conn) => conn,
        }
    }
}
