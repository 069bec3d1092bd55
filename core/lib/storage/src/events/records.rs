// External imports
use serde_json::Value;
use sqlx::FromRow;
// Workspace imports
// Local imports

#[derive(Debug, Clone, FromRow)]
pub struct StoredEthereumEvent {
    pub id: i64,
    pub ethereum_tx_hash: Vec<u8>,
    pub block_number: i64,
    pub log_index: i64,
    pub address: Vec<u8>,
    pub topic: Vec<u8>,
    pub arguments: Value,
}

#[derive(Debug, Clone)]
pub struct NewEthereumEvent {
    pub ethereum_tx_hash: Vec<u8>,
    pub block_number: i64,
    pub log_index: i64,
    pub address: Vec<u8>,
    pub topic: Vec<u8>,
    pub arguments: Value,
}
