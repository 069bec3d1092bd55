// External imports
use serde_json::Value;
use sqlx::FromRow;
// Workspace imports
// Local imports

#[derive(Debug, Clone, FromRow)]
pub struct StoredSafeContract {
    pub address: Vec<u8>,
    pub ethereum_tx_hash: Option<Vec<u8>>,
    pub created_block_number: i64,
    pub tx_block_number: i64,
    pub events_block_number: i64,
    pub erc20_block_number: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct StoredProxyFactory {
    pub address: Vec<u8>,
    pub initial_block_number: i64,
    pub tx_block_number: i64,
}

/// A monitored address together with its cursor for one stream.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct MonitoredAddress {
    pub address: Vec<u8>,
    pub cursor_block_number: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct StoredSafeStatus {
    pub id: i64,
    pub internal_tx_id: i64,
    pub address: Vec<u8>,
    pub block_number: i64,
    pub transaction_index: i64,
    pub trace_address: Vec<i64>,
    pub owners: Value,
    pub threshold: i64,
    pub nonce: i64,
    pub master_copy: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NewSafeStatus {
    pub internal_tx_id: i64,
    pub address: Vec<u8>,
    pub block_number: i64,
    pub transaction_index: i64,
    pub trace_address: Vec<i64>,
    /// JSON array of checksummed owner addresses, order-preserving.
    pub owners: Value,
    pub threshold: i64,
    pub nonce: i64,
    pub master_copy: Vec<u8>,
}
