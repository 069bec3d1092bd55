//! Resolves opaque call data against the registry of Safe ABIs into the
//! canonical `{function_name, arguments}` form.
//!
//! The registry is a precomputed selector table built once from the
//! embedded ABIs. Decoding is pure: the same four leading bytes always
//! resolve to the same function, newest interface version first, so
//! argument renames between versions (`dataGas` → `baseGas`) resolve to
//! the newest naming.

// Built-in deps
use std::collections::HashMap;
// External deps
use ethabi::{Function, Token};
use serde_json::{Map, Value};
use thiserror::Error;
// Workspace deps
use safe_history_contracts::{
    safe_contract_v0_0_1, safe_contract_v1_0_0, safe_contract_v1_1_1,
};
use safe_history_types::utils::{checksum_address, to_hex_string};
use safe_history_types::{DecodedCall, SafeContractVersion};

/// Length of the function selector prefixing the call data.
const SELECTOR_LENGTH: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum TxDecoderError {
    /// The selector is not part of any known Safe interface (or the data is
    /// shorter than a selector). Callers skip these silently.
    #[error("cannot decode data: {0}")]
    CannotDecode(String),
    /// The selector matched but the arguments do not parse. This means
    /// either corrupted call data or an ABI drift and is fatal to the unit
    /// of work being indexed.
    #[error("unexpected problem decoding `{function}`: {reason}")]
    UnexpectedDecoding { function: String, reason: String },
}

/// Selector registry over the embedded Safe ABIs.
#[derive(Debug)]
pub struct TxDecoder {
    functions: HashMap<[u8; 4], (SafeContractVersion, Function)>,
}

impl Default for TxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TxDecoder {
    pub fn new() -> Self {
        let mut functions = HashMap::new();
        // Oldest to newest, so a selector shared between versions resolves
        // to the newest argument naming.
        let supported_contracts = [
            (SafeContractVersion::V0_0_1, safe_contract_v0_0_1()),
            (SafeContractVersion::V1_0_0, safe_contract_v1_0_0()),
            (SafeContractVersion::V1_1_1, safe_contract_v1_1_1()),
        ];
        for (version, contract) in &supported_contracts {
            for function in contract.functions() {
                functions.insert(function.short_signature(), (*version, function.clone()));
            }
        }
        Self { functions }
    }

    /// Decodes call data into `(function_name, arguments)`.
    pub fn decode(&self, data: &[u8]) -> Result<DecodedCall, TxDecoderError> {
        let selector =
            selector_of(data).ok_or_else(|| TxDecoderError::CannotDecode(to_hex_string(data)))?;
        let (_, function) = self
            .functions
            .get(&selector)
            .ok_or_else(|| TxDecoderError::CannotDecode(to_hex_string(data)))?;

        let tokens = function
            .decode_input(&data[SELECTOR_LENGTH..])
            .map_err(|err| TxDecoderError::UnexpectedDecoding {
                function: function.name.clone(),
                reason: err.to_string(),
            })?;

        if tokens.len() != function.inputs.len() {
            return Err(TxDecoderError::UnexpectedDecoding {
                function: function.name.clone(),
                reason: format!(
                    "expected {} arguments, decoded {}",
                    function.inputs.len(),
                    tokens.len()
                ),
            });
        }

        let mut arguments = Map::new();
        for (input, token) in function.inputs.iter().zip(tokens) {
            arguments.insert(input.name.clone(), token_to_value(token));
        }

        Ok(DecodedCall {
            function_name: function.name.clone(),
            arguments: Value::Object(arguments),
        })
    }
}

fn selector_of(data: &[u8]) -> Option<[u8; 4]> {
    if data.len() < SELECTOR_LENGTH {
        return None;
    }
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..SELECTOR_LENGTH]);
    Some(selector)
}

/// Canonical JSON shape of a decoded argument: addresses checksummed,
/// `bytes` as hex strings, numbers numeric while they fit and decimal
/// strings beyond that.
fn token_to_value(token: Token) -> Value {
    match token {
        Token::Address(address) => Value::String(checksum_address(&address)),
        Token::Bytes(bytes) | Token::FixedBytes(bytes) => Value::String(to_hex_string(&bytes)),
        Token::Uint(value) => {
            if value <= u64::max_value().into() {
                Value::from(value.as_u64())
            } else {
                Value::String(value.to_string())
            }
        }
        Token::Int(value) => Value::String(value.to_string()),
        Token::Bool(value) => Value::Bool(value),
        Token::String(value) => Value::String(value),
        Token::Array(tokens) | Token::FixedArray(tokens) | Token::Tuple(tokens) => {
            Value::Array(tokens.into_iter().map(token_to_value).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethabi::Token;
    use safe_history_types::{Address, SafeOperation, H256};

    fn encode_call(function: &Function, tokens: &[Token]) -> Vec<u8> {
        function.encode_input(tokens).expect("encoding test input")
    }

    #[test]
    fn short_data_cannot_be_decoded() {
        let decoder = TxDecoder::new();
        assert!(matches!(
            decoder.decode(&[0x6a, 0x76]),
            Err(TxDecoderError::CannotDecode(_))
        ));
    }

    #[test]
    fn foreign_selector_cannot_be_decoded() {
        let decoder = TxDecoder::new();
        // `transfer(address,uint256)` is no Safe function.
        assert!(matches!(
            decoder.decode(&[0xa9, 0x05, 0x9c, 0xbb, 0x00, 0x00]),
            Err(TxDecoderError::CannotDecode(_))
        ));
    }

    #[test]
    fn truncated_arguments_are_an_unexpected_problem() {
        let decoder = TxDecoder::new();
        let function = safe_contract_v1_1_1().function("approveHash").unwrap().clone();
        let mut data = encode_call(&function, &[Token::FixedBytes(vec![0x11; 32])]);
        data.truncate(20);

        assert!(matches!(
            decoder.decode(&data),
            Err(TxDecoderError::UnexpectedDecoding { .. })
        ));
    }

    #[test]
    fn add_owner_round_trip() {
        let decoder = TxDecoder::new();
        let owner = Address::from_low_u64_be(0xbeef);
        let function = safe_contract_v1_1_1()
            .function("addOwnerWithThreshold")
            .unwrap()
            .clone();
        let data = encode_call(
            &function,
            &[Token::Address(owner), Token::Uint(2u64.into())],
        );

        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(decoded.function_name, "addOwnerWithThreshold");
        assert_eq!(
            SafeOperation::from_decoded(&decoded).unwrap(),
            SafeOperation::AddOwnerWithThreshold {
                owner,
                threshold: 2
            }
        );
    }

    #[test]
    fn every_registry_function_round_trips() {
        let decoder = TxDecoder::new();
        for contract in &[
            safe_contract_v0_0_1(),
            safe_contract_v1_0_0(),
            safe_contract_v1_1_1(),
        ] {
            for function in contract.functions() {
                let tokens: Vec<Token> = function
                    .inputs
                    .iter()
                    .map(|input| sample_token(&input.kind))
                    .collect();
                let data = encode_call(function, &tokens);
                let decoded = decoder.decode(&data).expect("registry function decodes");
                // A shared selector may resolve under a newer version with
                // different argument names, but never a different function.
                assert_eq!(decoded.function_name, function.name);
            }
        }
    }

    #[test]
    fn exec_transaction_resolves_to_newest_naming() {
        let decoder = TxDecoder::new();
        let function = safe_contract_v0_0_1()
            .function("execTransaction")
            .unwrap()
            .clone();
        let tokens: Vec<Token> = function
            .inputs
            .iter()
            .map(|input| sample_token(&input.kind))
            .collect();
        let decoded = decoder.decode(&encode_call(&function, &tokens)).unwrap();

        // The selector is shared with v1.1.1, whose naming wins.
        assert!(decoded.arguments.get("baseGas").is_some());
        assert!(decoded.arguments.get("dataGas").is_none());
    }

    #[test]
    fn approve_hash_carries_the_hash_through() {
        let decoder = TxDecoder::new();
        let hash = H256::from_low_u64_be(0x1234);
        let function = safe_contract_v1_1_1().function("approveHash").unwrap().clone();
        let data = encode_call(&function, &[Token::FixedBytes(hash.as_bytes().to_vec())]);

        let decoded = decoder.decode(&data).unwrap();
        assert_eq!(
            SafeOperation::from_decoded(&decoded).unwrap(),
            SafeOperation::ApproveHash { hash }
        );
    }

    fn sample_token(kind: &ethabi::ParamType) -> Token {
        use ethabi::ParamType;
        match kind {
            ParamType::Address => Token::Address(Address::from_low_u64_be(0x11)),
            ParamType::Bytes => Token::Bytes(vec![0xde, 0xad]),
            ParamType::Uint(_) => Token::Uint(1u64.into()),
            ParamType::Int(_) => Token::Int(1u64.into()),
            ParamType::Bool => Token::Bool(true),
            ParamType::String => Token::String("test".into()),
            ParamType::FixedBytes(len) => Token::FixedBytes(vec![0x22; *len]),
            ParamType::Array(inner) => Token::Array(vec![sample_token(inner)]),
            ParamType::FixedArray(inner, len) => {
                Token::FixedArray(vec![sample_token(inner); *len])
            }
            ParamType::Tuple(inner) => Token::Tuple(
                inner.iter().map(|param| sample_token(param)).collect(),
            ),
        }
    }
}
