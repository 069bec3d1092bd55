//! The decoder's output and its strongly-typed form.
//!
//! The persisted shape of a decoded invocation stays a JSON argument map for
//! forward compatibility; before the processor applies it, the map is parsed
//! into the `SafeOperation` tagged union so every transition works with
//! concrete fields instead of string lookups.

// Built-in deps
use std::convert::TryFrom;
// External deps
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
// Workspace deps
use safe_history_basic_types::{Address, H256, U256};
// Local deps
use crate::safe_tx::{Operation, SafeContractVersion};
use crate::utils::from_hex_string;

/// Canonical `{function_name, arguments}` form produced by the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedCall {
    pub function_name: String,
    pub arguments: Value,
}

#[derive(Debug, Error, PartialEq)]
pub enum OperationParseError {
    #[error("argument `{0}` is missing")]
    MissingField(&'static str),
    #[error("argument `{0}` is not a valid address")]
    InvalidAddress(&'static str),
    #[error("argument `{0}` is not a valid number")]
    InvalidNumber(&'static str),
    #[error("argument `{0}` is not valid hex data")]
    InvalidBytes(&'static str),
    #[error("argument `{0}` is not a valid 32-byte hash")]
    InvalidHash(&'static str),
    #[error("unknown multi-sig operation {0}")]
    UnknownOperation(u8),
}

/// Arguments of `execTransaction`, the full multi-sig tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecTransactionArgs {
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub operation: Operation,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub signatures: Vec<u8>,
    /// `dataGas` was renamed to `baseGas` in v1.0.0, so the argument naming
    /// reveals the interface version of the master copy that was called.
    pub version: SafeContractVersion,
}

/// A decoded Safe-function invocation, one variant per state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SafeOperation {
    Setup {
        owners: Vec<Address>,
        threshold: u64,
    },
    AddOwnerWithThreshold {
        owner: Address,
        threshold: u64,
    },
    RemoveOwner {
        owner: Address,
        threshold: u64,
    },
    SwapOwner {
        old_owner: Address,
        new_owner: Address,
    },
    ChangeThreshold {
        threshold: u64,
    },
    ChangeMasterCopy {
        master_copy: Address,
    },
    ApproveHash {
        hash: H256,
    },
    ExecTransaction(Box<ExecTransactionArgs>),
    ExecTransactionFromModule,
    /// A known-contract call outside the state machine (module management,
    /// fallback handler updates, …). Processed without effect.
    Other(String),
}

impl SafeOperation {
    /// Parses a decoded call into its typed form. Functions outside the
    /// transition table come back as `Other`.
    pub fn from_decoded(call: &DecodedCall) -> Result<Self, OperationParseError> {
        let args = &call.arguments;
        let operation = match call.function_name.as_str() {
            "setup" => SafeOperation::Setup {
                owners: addresses_arg(args, "_owners")?,
                threshold: u64_arg(args, "_threshold")?,
            },
            "addOwnerWithThreshold" => SafeOperation::AddOwnerWithThreshold {
                owner: address_arg(args, "owner")?,
                threshold: u64_arg(args, "_threshold")?,
            },
            // `removeOwnerWithThreshold` is the early name of `removeOwner`.
            "removeOwner" | "removeOwnerWithThreshold" => SafeOperation::RemoveOwner {
                owner: address_arg(args, "owner")?,
                threshold: u64_arg(args, "_threshold")?,
            },
            "swapOwner" => SafeOperation::SwapOwner {
                old_owner: address_arg(args, "oldOwner")?,
                new_owner: address_arg(args, "newOwner")?,
            },
            "changeThreshold" => SafeOperation::ChangeThreshold {
                threshold: u64_arg(args, "_threshold")?,
            },
            "changeMasterCopy" => SafeOperation::ChangeMasterCopy {
                master_copy: address_arg(args, "_masterCopy")?,
            },
            "approveHash" => SafeOperation::ApproveHash {
                hash: hash_arg(args, "hashToApprove")?,
            },
            "execTransaction" => {
                let (base_gas, version) = match u256_arg(args, "baseGas") {
                    Ok(base_gas) => (base_gas, SafeContractVersion::V1_0_0),
                    Err(OperationParseError::MissingField(_)) => {
                        (u256_arg(args, "dataGas")?, SafeContractVersion::V0_0_1)
                    }
                    Err(err) => return Err(err),
                };
                let operation_byte = u64_arg(args, "operation")? as u8;
                SafeOperation::ExecTransaction(Box::new(ExecTransactionArgs {
                    to: address_arg(args, "to")?,
                    value: u256_arg(args, "value")?,
                    data: bytes_arg(args, "data")?,
                    operation: Operation::try_from(operation_byte)
                        .map_err(|err| OperationParseError::UnknownOperation(err.0))?,
                    safe_tx_gas: u256_arg(args, "safeTxGas")?,
                    base_gas,
                    gas_price: u256_arg(args, "gasPrice")?,
                    gas_token: address_arg(args, "gasToken")?,
                    refund_receiver: address_arg(args, "refundReceiver")?,
                    signatures: bytes_arg(args, "signatures")?,
                    version,
                }))
            }
            "execTransactionFromModule" => SafeOperation::ExecTransactionFromModule,
            other => SafeOperation::Other(other.to_string()),
        };
        Ok(operation)
    }
}

fn field<'a>(args: &'a Value, name: &'static str) -> Result<&'a Value, OperationParseError> {
    args.get(name).ok_or(OperationParseError::MissingField(name))
}

fn address_arg(args: &Value, name: &'static str) -> Result<Address, OperationParseError> {
    parse_address(field(args, name)?).ok_or(OperationParseError::InvalidAddress(name))
}

fn addresses_arg(args: &Value, name: &'static str) -> Result<Vec<Address>, OperationParseError> {
    field(args, name)?
        .as_array()
        .ok_or(OperationParseError::InvalidAddress(name))?
        .iter()
        .map(|entry| parse_address(entry).ok_or(OperationParseError::InvalidAddress(name)))
        .collect()
}

fn parse_address(value: &Value) -> Option<Address> {
    let text = value.as_str()?;
    let bytes = from_hex_string(text).ok()?;
    if bytes.len() != 20 {
        return None;
    }
    Some(Address::from_slice(&bytes))
}

fn u64_arg(args: &Value, name: &'static str) -> Result<u64, OperationParseError> {
    let value = field(args, name)?;
    match value {
        Value::Number(number) => number
            .as_u64()
            .ok_or(OperationParseError::InvalidNumber(name)),
        Value::String(text) => text
            .parse::<u64>()
            .map_err(|_| OperationParseError::InvalidNumber(name)),
        _ => Err(OperationParseError::InvalidNumber(name)),
    }
}

fn u256_arg(args: &Value, name: &'static str) -> Result<U256, OperationParseError> {
    let value = field(args, name)?;
    match value {
        Value::Number(number) => number
            .as_u64()
            .map(U256::from)
            .ok_or(OperationParseError::InvalidNumber(name)),
        Value::String(text) => U256::from_dec_str(text)
            .map_err(|_| OperationParseError::InvalidNumber(name)),
        _ => Err(OperationParseError::InvalidNumber(name)),
    }
}

fn bytes_arg(args: &Value, name: &'static str) -> Result<Vec<u8>, OperationParseError> {
    let value = field(args, name)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => {
            from_hex_string(text).map_err(|_| OperationParseError::InvalidBytes(name))
        }
        _ => Err(OperationParseError::InvalidBytes(name)),
    }
}

fn hash_arg(args: &Value, name: &'static str) -> Result<H256, OperationParseError> {
    let bytes = bytes_arg(args, name).map_err(|_| OperationParseError::InvalidHash(name))?;
    if bytes.len() != 32 {
        return Err(OperationParseError::InvalidHash(name));
    }
    Ok(H256::from_slice(&bytes))
}
