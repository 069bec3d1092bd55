// External imports
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
// Workspace imports
// Local imports

#[derive(Debug, Clone, FromRow)]
pub struct StoredMultisigTransaction {
    pub safe_tx_hash: Vec<u8>,
    pub safe_address: Vec<u8>,
    pub ethereum_tx_hash: Option<Vec<u8>>,
    pub to_address: Option<Vec<u8>>,
    pub value: BigDecimal,
    pub data: Option<Vec<u8>>,
    pub operation: i64,
    pub safe_tx_gas: BigDecimal,
    pub base_gas: BigDecimal,
    pub gas_price: BigDecimal,
    pub gas_token: Option<Vec<u8>>,
    pub refund_receiver: Option<Vec<u8>>,
    pub nonce: i64,
    pub signatures: Option<Vec<u8>>,
    pub failed: Option<bool>,
    pub origin: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMultisigTransaction {
    pub safe_tx_hash: Vec<u8>,
    pub safe_address: Vec<u8>,
    pub ethereum_tx_hash: Option<Vec<u8>>,
    pub to_address: Option<Vec<u8>>,
    pub value: BigDecimal,
    pub data: Option<Vec<u8>>,
    pub operation: i64,
    pub safe_tx_gas: BigDecimal,
    pub base_gas: BigDecimal,
    pub gas_price: BigDecimal,
    pub gas_token: Option<Vec<u8>>,
    pub refund_receiver: Option<Vec<u8>>,
    pub nonce: i64,
    pub signatures: Option<Vec<u8>>,
    pub failed: Option<bool>,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct StoredMultisigConfirmation {
    pub id: i64,
    pub multisig_transaction_hash: Vec<u8>,
    pub multisig_transaction_id: Option<Vec<u8>>,
    pub owner: Vec<u8>,
    pub ethereum_tx_hash: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}
