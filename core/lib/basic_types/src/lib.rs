//! The declaration of the most primitive types used across the Safe history
//! service. Most of them are just re-exported from the `web3` crate.

#[macro_use]
mod macros;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::ops::{Add, Deref, DerefMut, Sub};
use std::str::FromStr;

pub use web3::types::{
    Address, Bytes, Log, TransactionReceipt, H160, H256, U128, U256, U64,
};

basic_type!(
    /// Block number in the Ethereum network.
    BlockNumber,
    u64
);

basic_type!(
    /// Nonce of a Safe contract. Incremented by every executed
    /// multi-signature transaction.
    Nonce,
    u64
);

basic_type!(
    /// Position of a transaction inside its block.
    TransactionIndex,
    u64
);
