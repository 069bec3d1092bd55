//! The indexing service. It scans the chain for everything that touches the
//! monitored Safe wallets, reconstructs per-wallet state from the decoded
//! call traces, and keeps the ledger the read API serves from.
//!
//! Sub-modules:
//!
//! - `decoder`, call data against the embedded Safe ABI registry;
//! - `indexers`, the three block-range scanners (internal txs, token
//!   events, proxy factory);
//! - `processor`, the state machine deriving wallet state from decoded
//!   invocations;
//! - `collectibles`, NFT ownership and metadata resolution;
//! - `storage_interactor`, the ledger seam with a database-backed and an
//!   in-memory implementation.

// Built-in deps
// External deps
use futures::future;
use tokio::task::JoinHandle;
// Workspace deps
// Local deps

pub mod collectibles;
pub mod database_storage_interactor;
pub mod decoder;
pub mod indexers;
pub mod inmemory_storage_interactor;
pub mod processor;
pub mod storage_interactor;

#[cfg(test)]
mod tests;

/// Waits for *any* of the tokio tasks to be finished.
/// Since the main tokio tasks are used as actors which should live as long
/// as application runs, any possible outcome (either `Ok` or `Err`) is
/// considered as a reason to stop the server completely.
pub async fn wait_for_tasks(task_futures: Vec<JoinHandle<()>>) {
    match future::select_all(task_futures).await {
        (Ok(_), _, _) => {
            panic!("One of the actors finished its run, while it wasn't expected to do it");
        }
        (Err(error), _, _) => {
            vlog::warn!("One of the tokio actors unexpectedly finished, shutting down");
            if error.is_panic() {
                // Resume the panic on the main task
                std::panic::resume_unwind(error.into_panic());
            }
        }
    }
}
