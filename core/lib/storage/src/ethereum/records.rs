// External imports
use bigdecimal::BigDecimal;
use sqlx::FromRow;
// Workspace imports
// Local imports

#[derive(Debug, Clone, FromRow)]
pub struct StoredBlock {
    pub number: i64,
    pub hash: Vec<u8>,
    pub parent_hash: Vec<u8>,
    pub timestamp: i64,
    pub gas_limit: i64,
    pub gas_used: i64,
}

#[derive(Debug, Clone)]
pub struct NewBlock {
    pub number: i64,
    pub hash: Vec<u8>,
    pub parent_hash: Vec<u8>,
    pub timestamp: i64,
    pub gas_limit: i64,
    pub gas_used: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct StoredEthereumTx {
    pub tx_hash: Vec<u8>,
    pub block_number: i64,
    pub transaction_index: i64,
    pub from_address: Vec<u8>,
    pub to_address: Option<Vec<u8>>,
    pub nonce: i64,
    pub value: BigDecimal,
    pub gas: i64,
    pub gas_price: BigDecimal,
    pub data: Option<Vec<u8>>,
    pub status: Option<i64>,
    pub gas_used: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewEthereumTx {
    pub tx_hash: Vec<u8>,
    pub block_number: i64,
    pub transaction_index: i64,
    pub from_address: Vec<u8>,
    pub to_address: Option<Vec<u8>>,
    pub nonce: i64,
    pub value: BigDecimal,
    pub gas: i64,
    pub gas_price: BigDecimal,
    pub data: Option<Vec<u8>>,
    pub status: Option<i64>,
    pub gas_used: Option<i64>,
}
