//! Typed access to the Ethereum JSON-RPC surface the indexers rely on:
//! blocks, transactions, receipts, logs, parity-style traces and batched
//! `eth_call`s. The `EthereumGateway` trait is the seam every consumer is
//! generic over; `EthereumClient` is the HTTP implementation and
//! `MockEthereumClient` the canned-state one used in tests.

pub mod client;
pub mod mock;

pub use client::{ContractCall, EthereumClient, EthereumGateway};
pub use mock::MockEthereumClient;
