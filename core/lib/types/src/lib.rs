//! Domain model of the Safe history service: traces and their decoded form,
//! the Safe-function tagged union consumed by the processor, multi-sig
//! transaction hashing and signature recovery, and wallet state snapshots.

pub mod decoded;
pub mod ethereum_tx;
pub mod internal_tx;
pub mod safe_status;
pub mod safe_tx;
pub mod signature;
pub mod token_event;
pub mod utils;

pub use safe_history_basic_types::*;

pub use decoded::{DecodedCall, ExecTransactionArgs, OperationParseError, SafeOperation};
pub use ethereum_tx::{BlockData, EthereumTxData};
pub use internal_tx::{CallType, InternalTx, TraceType};
pub use safe_status::SafeStatus;
pub use safe_tx::{Operation, SafeContractVersion, SafeTx};
pub use signature::{SafeSignature, SafeSignatureKind, SignatureError};
pub use token_event::{EthereumEvent, TokenEvent, APPROVAL_TOPIC, TRANSFER_TOPIC};

/// The zero address. A `setup` coming from it must not spawn wallet state.
pub const NULL_ADDRESS: Address = H160([0u8; 20]);
