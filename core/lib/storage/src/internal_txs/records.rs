// External imports
use bigdecimal::BigDecimal;
use serde_json::Value;
use sqlx::FromRow;
// Workspace imports
// Local imports

#[derive(Debug, Clone, FromRow)]
pub struct StoredInternalTx {
    pub id: i64,
    pub ethereum_tx_hash: Vec<u8>,
    pub block_number: i64,
    pub transaction_index: i64,
    pub trace_address: Vec<i64>,
    pub trace_type: String,
    pub call_type: String,
    pub from_address: Vec<u8>,
    pub to_address: Option<Vec<u8>>,
    pub value: BigDecimal,
    pub data: Option<Vec<u8>>,
    pub contract_address: Option<Vec<u8>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewInternalTx {
    pub ethereum_tx_hash: Vec<u8>,
    pub block_number: i64,
    pub transaction_index: i64,
    pub trace_address: Vec<i64>,
    pub trace_type: String,
    pub call_type: String,
    pub from_address: Vec<u8>,
    pub to_address: Option<Vec<u8>>,
    pub value: BigDecimal,
    pub data: Option<Vec<u8>>,
    pub contract_address: Option<Vec<u8>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct StoredInternalTxDecoded {
    pub internal_tx_id: i64,
    pub function_name: String,
    pub arguments: Value,
    pub processed: bool,
    pub processed_successfully: Option<bool>,
}

/// A pending decoded invocation joined with its trace context, in the
/// exact shape the processor consumes.
#[derive(Debug, Clone, FromRow)]
pub struct StoredPendingInvocation {
    pub internal_tx_id: i64,
    pub function_name: String,
    pub arguments: Value,
    pub ethereum_tx_hash: Vec<u8>,
    pub block_number: i64,
    pub transaction_index: i64,
    pub trace_address: Vec<i64>,
    pub trace_type: String,
    pub call_type: String,
    pub from_address: Vec<u8>,
    pub to_address: Option<Vec<u8>>,
    pub value: BigDecimal,
    pub data: Option<Vec<u8>>,
    pub contract_address: Option<Vec<u8>>,
    pub error: Option<String>,
}
