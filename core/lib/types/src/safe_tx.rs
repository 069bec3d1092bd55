// Built-in deps
use std::convert::TryFrom;
use std::fmt;
// External deps
use ethabi::Token;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
// Workspace deps
use safe_history_basic_types::{Address, H256, U256};
// Local deps
use crate::utils::keccak256_hash;

/// `keccak256("EIP712Domain(address verifyingContract)")`.
/// The Safe domain binds a transaction hash to one wallet instance.
static DOMAIN_SEPARATOR_TYPEHASH: Lazy<H256> =
    Lazy::new(|| keccak256_hash(b"EIP712Domain(address verifyingContract)"));

/// Typehash of the multi-sig transaction tuple, v1.0.0 and later.
static SAFE_TX_TYPEHASH: Lazy<H256> = Lazy::new(|| {
    keccak256_hash(
        b"SafeTx(address to,uint256 value,bytes data,uint8 operation,\
          uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,\
          address refundReceiver,uint256 nonce)"
            .as_ref(),
    )
});

/// Typehash of the pre-1.0.0 tuple, where `baseGas` was still `dataGas`.
static SAFE_TX_TYPEHASH_V0_0_1: Lazy<H256> = Lazy::new(|| {
    keccak256_hash(
        b"SafeTx(address to,uint256 value,bytes data,uint8 operation,\
          uint256 safeTxGas,uint256 dataGas,uint256 gasPrice,address gasToken,\
          address refundReceiver,uint256 nonce)"
            .as_ref(),
    )
});

/// Interface version of a Safe master copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SafeContractVersion {
    V0_0_1,
    V1_0_0,
    V1_1_1,
}

impl SafeContractVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafeContractVersion::V0_0_1 => "0.0.1",
            SafeContractVersion::V1_0_0 => "1.0.0",
            SafeContractVersion::V1_1_1 => "1.1.1",
        }
    }

    fn safe_tx_typehash(&self) -> H256 {
        match self {
            SafeContractVersion::V0_0_1 => *SAFE_TX_TYPEHASH_V0_0_1,
            _ => *SAFE_TX_TYPEHASH,
        }
    }
}

impl fmt::Display for SafeContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of call a multi-sig transaction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Operation {
    Call = 0,
    DelegateCall = 1,
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub u8);

impl TryFrom<u8> for Operation {
    type Error = UnknownOperation;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Operation::Call),
            1 => Ok(Operation::DelegateCall),
            other => Err(UnknownOperation(other)),
        }
    }
}

/// A multi-sig transaction as passed to `execTransaction`, bound to a wallet
/// and a nonce. Its EIP-712 digest is the identity of the logical
/// transaction across its whole lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SafeTx {
    pub safe: Address,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub operation: Operation,
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
    pub nonce: U256,
    pub version: SafeContractVersion,
}

impl SafeTx {
    /// Domain separator of the wallet the transaction belongs to.
    pub fn domain_separator(&self) -> H256 {
        keccak256_hash(&ethabi::encode(&[
            Token::FixedBytes(DOMAIN_SEPARATOR_TYPEHASH.as_bytes().to_vec()),
            Token::Address(self.safe),
        ]))
    }

    /// EIP-712 digest of the transaction:
    /// `keccak256(0x19 || 0x01 || domainSeparator || structHash)`.
    pub fn safe_tx_hash(&self) -> H256 {
        let data_hash = keccak256_hash(&self.data);
        let struct_hash = keccak256_hash(&ethabi::encode(&[
            Token::FixedBytes(self.version.safe_tx_typehash().as_bytes().to_vec()),
            Token::Address(self.to),
            Token::Uint(self.value),
            Token::FixedBytes(data_hash.as_bytes().to_vec()),
            Token::Uint(U256::from(self.operation as u8)),
            Token::Uint(self.safe_tx_gas),
            Token::Uint(self.base_gas),
            Token::Uint(self.gas_price),
            Token::Address(self.gas_token),
            Token::Address(self.refund_receiver),
            Token::Uint(self.nonce),
        ]));

        let mut preimage = Vec::with_capacity(2 + 32 + 32);
        preimage.extend_from_slice(&[0x19, 0x01]);
        preimage.extend_from_slice(self.domain_separator().as_bytes());
        preimage.extend_from_slice(struct_hash.as_bytes());
        keccak256_hash(&preimage)
    }
}
