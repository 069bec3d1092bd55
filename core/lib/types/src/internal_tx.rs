// Built-in deps
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
// External deps
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web3::types::{Action, Res, Trace};
// Workspace deps
use safe_history_basic_types::{Address, BlockNumber, TransactionIndex, H256, U256};

/// Kind of the trace node, as reported by `trace_transaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceType {
    Call,
    Create,
    Suicide,
}

impl TraceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceType::Call => "call",
            TraceType::Create => "create",
            TraceType::Suicide => "suicide",
        }
    }
}

impl fmt::Display for TraceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceType {
    type Err = TraceConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "call" => Ok(TraceType::Call),
            "create" => Ok(TraceType::Create),
            "suicide" => Ok(TraceType::Suicide),
            other => Err(TraceConvertError::UnknownTraceType(other.to_string())),
        }
    }
}

/// Call flavor of a `call`-type trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallType {
    None,
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::None => "none",
            CallType::Call => "call",
            CallType::CallCode => "callcode",
            CallType::DelegateCall => "delegatecall",
            CallType::StaticCall => "staticcall",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallType {
    type Err = TraceConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CallType::None),
            "call" => Ok(CallType::Call),
            "callcode" => Ok(CallType::CallCode),
            "delegatecall" => Ok(CallType::DelegateCall),
            "staticcall" => Ok(CallType::StaticCall),
            other => Err(TraceConvertError::UnknownCallType(other.to_string())),
        }
    }
}

impl From<web3::types::CallType> for CallType {
    fn from(call_type: web3::types::CallType) -> Self {
        match call_type {
            web3::types::CallType::None => CallType::None,
            web3::types::CallType::Call => CallType::Call,
            web3::types::CallType::CallCode => CallType::CallCode,
            web3::types::CallType::DelegateCall => CallType::DelegateCall,
            web3::types::CallType::StaticCall => CallType::StaticCall,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TraceConvertError {
    #[error("trace has no transaction hash")]
    MissingTransactionHash,
    #[error("trace has no transaction position")]
    MissingTransactionPosition,
    #[error("unsupported trace action: {0}")]
    UnsupportedAction(&'static str),
    #[error("unknown trace type: {0}")]
    UnknownTraceType(String),
    #[error("unknown call type: {0}")]
    UnknownCallType(String),
}

/// A single node of the call tree of an Ethereum transaction.
///
/// `(ethereum_tx_hash, trace_address)` identifies the node; the trace
/// address is the path of child indices from the root, so sorting by
/// `(block_number, transaction_index, trace_address)` reproduces the
/// execution order across the whole chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTx {
    pub ethereum_tx_hash: H256,
    pub block_number: BlockNumber,
    pub transaction_index: TransactionIndex,
    pub trace_address: Vec<u64>,
    pub trace_type: TraceType,
    pub call_type: CallType,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    /// Address deployed by a `create` trace.
    pub contract_address: Option<Address>,
    pub error: Option<String>,
}

impl InternalTx {
    /// A trace can be decoded against the Safe ABIs iff it is a plain or
    /// delegate call carrying input data.
    pub fn can_be_decoded(&self) -> bool {
        matches!(self.call_type, CallType::Call | CallType::DelegateCall)
            && !self.data.is_empty()
    }

    /// Trace address of the direct parent, `None` for root traces.
    pub fn parent_trace_address(&self) -> Option<&[u64]> {
        if self.trace_address.is_empty() {
            None
        } else {
            Some(&self.trace_address[..self.trace_address.len() - 1])
        }
    }

    /// Total ordering of traces across the chain.
    pub fn ordering_key(&self) -> (u64, u64, &[u64]) {
        (
            self.block_number.0,
            self.transaction_index.0,
            &self.trace_address,
        )
    }
}

impl TryFrom<&Trace> for InternalTx {
    type Error = TraceConvertError;

    fn try_from(trace: &Trace) -> Result<Self, Self::Error> {
        let ethereum_tx_hash = trace
            .transaction_hash
            .ok_or(TraceConvertError::MissingTransactionHash)?;
        let transaction_index = trace
            .transaction_position
            .ok_or(TraceConvertError::MissingTransactionPosition)?
            as u64;
        let trace_address = trace.trace_address.iter().map(|i| *i as u64).collect();

        let (trace_type, call_type, from, to, value, data) = match &trace.action {
            Action::Call(call) => (
                TraceType::Call,
                CallType::from(call.call_type.clone()),
                call.from,
                Some(call.to),
                call.value,
                call.input.0.clone(),
            ),
            Action::Create(create) => (
                TraceType::Create,
                CallType::None,
                create.from,
                None,
                create.value,
                create.init.0.clone(),
            ),
            Action::Suicide(suicide) => (
                TraceType::Suicide,
                CallType::None,
                suicide.address,
                Some(suicide.refund_address),
                suicide.balance,
                Vec::new(),
            ),
            Action::Reward(_) => {
                return Err(TraceConvertError::UnsupportedAction("reward"));
            }
        };

        let contract_address = match &trace.result {
            Some(Res::Create(create_result)) => Some(create_result.address),
            _ => None,
        };

        Ok(InternalTx {
            ethereum_tx_hash,
            block_number: BlockNumber(trace.block_number),
            transaction_index: TransactionIndex(transaction_index),
            trace_address,
            trace_type,
            call_type,
            from,
            to,
            value,
            data,
            contract_address,
            error: trace.error.clone(),
        })
    }
}
