//! Parsing and recovery of the signature blob passed to `execTransaction`.
//!
//! The blob is a concatenation of 65-byte `{r, s, v}` chunks, one per
//! confirming owner. The `v` byte doubles as a type tag:
//!   * `0`: contract (EIP-1271) signature, owner packed into `r`;
//!   * `1`: pre-validated signature (`approveHash`), owner packed into `r`;
//!   * `>30`: `eth_sign` over the prefixed digest, `v` shifted by 4;
//!   * else: plain EIP-712 signature.

// Built-in deps
use std::convert::TryInto;
// External deps
use parity_crypto::publickey;
use serde::{Deserialize, Serialize};
use thiserror::Error;
// Workspace deps
use safe_history_basic_types::{Address, H256};
// Local deps
use crate::utils::keccak256_hash;

const SIGNATURE_CHUNK_LEN: usize = 65;
const ETH_SIGN_V_OFFSET: u8 = 4;

#[derive(Debug, Error, PartialEq)]
pub enum SignatureError {
    #[error("signature blob length {0} is not a multiple of 65")]
    InvalidLength(usize),
    #[error("signature {index} has invalid recovery byte v={v}")]
    InvalidRecoveryByte { index: usize, v: u8 },
    #[error("cannot recover signer of signature {index}")]
    Recovery { index: usize },
}

/// How a confirmation was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafeSignatureKind {
    Contract,
    ApprovedHash,
    EthSign,
    Eip712,
}

/// One recovered confirmation from the `execTransaction` signature blob.
#[derive(Debug, Clone, PartialEq)]
pub struct SafeSignature {
    pub owner: Address,
    pub kind: SafeSignatureKind,
    /// The raw 65-byte static chunk.
    pub signature: Vec<u8>,
}

/// Splits the blob into chunks and recovers the signing owner of each one
/// against `safe_tx_hash`.
pub fn parse_signatures(
    signatures: &[u8],
    safe_tx_hash: H256,
) -> Result<Vec<SafeSignature>, SignatureError> {
    if signatures.len() % SIGNATURE_CHUNK_LEN != 0 {
        return Err(SignatureError::InvalidLength(signatures.len()));
    }

    signatures
        .chunks(SIGNATURE_CHUNK_LEN)
        .enumerate()
        .map(|(index, chunk)| parse_signature_chunk(index, chunk, safe_tx_hash))
        .collect()
}

fn parse_signature_chunk(
    index: usize,
    chunk: &[u8],
    safe_tx_hash: H256,
) -> Result<SafeSignature, SignatureError> {
    let r: [u8; 32] = chunk[0..32].try_into().unwrap();
    let v = chunk[64];

    let (kind, owner) = match v {
        0 => (SafeSignatureKind::Contract, address_from_word(&r)),
        1 => (SafeSignatureKind::ApprovedHash, address_from_word(&r)),
        v if v > 30 => {
            let message = eth_sign_digest(safe_tx_hash);
            let owner = recover_signer(index, chunk, v - ETH_SIGN_V_OFFSET, message)?;
            (SafeSignatureKind::EthSign, owner)
        }
        _ => {
            let owner = recover_signer(index, chunk, v, safe_tx_hash)?;
            (SafeSignatureKind::Eip712, owner)
        }
    };

    Ok(SafeSignature {
        owner,
        kind,
        signature: chunk.to_vec(),
    })
}

/// `keccak256("\x19Ethereum Signed Message:\n32" || hash)`, the digest
/// actually signed by `eth_sign`.
fn eth_sign_digest(hash: H256) -> H256 {
    let mut message = Vec::with_capacity(28 + 32);
    message.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
    message.extend_from_slice(hash.as_bytes());
    keccak256_hash(&message)
}

fn recover_signer(
    index: usize,
    chunk: &[u8],
    v: u8,
    digest: H256,
) -> Result<Address, SignatureError> {
    if v != 27 && v != 28 {
        return Err(SignatureError::InvalidRecoveryByte { index, v });
    }
    let signature = publickey::Signature::from_rsv(
        &publickey::Message::from_slice(&chunk[0..32]),
        &publickey::Message::from_slice(&chunk[32..64]),
        v - 27,
    );
    let message = publickey::Message::from_slice(digest.as_bytes());

    let public = publickey::recover(&signature, &message)
        .map_err(|_| SignatureError::Recovery { index })?;
    let recovered = publickey::public_to_address(&public);
    Ok(Address::from_slice(recovered.as_bytes()))
}

/// The last 20 bytes of a 32-byte word, the way the Safe contracts unpack
/// an address from `r`.
fn address_from_word(word: &[u8; 32]) -> Address {
    Address::from_slice(&word[12..])
}

/// Signs `safe_tx_hash` the EIP-712 way and renders the 65-byte chunk.
/// Only used by tests and tooling; the service itself never signs.
pub fn sign_hash(
    secret: &publickey::Secret,
    safe_tx_hash: H256,
) -> Result<Vec<u8>, publickey::Error> {
    let message = publickey::Message::from_slice(safe_tx_hash.as_bytes());
    let signature = publickey::sign(secret, &message)?;

    // parity-crypto lays the signature out as r || s || recovery_id.
    let mut chunk = signature.to_vec();
    chunk[64] += 27;
    Ok(chunk)
}
