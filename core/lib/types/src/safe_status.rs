// External deps
use serde::{Deserialize, Serialize};
// Workspace deps
use safe_history_basic_types::{Address, Nonce};

/// Snapshot of the state of one Safe wallet.
///
/// Snapshots are append-only; the ledger keeps one row per state-changing
/// invocation, keyed by the internal tx that caused the transition, and the
/// current state is the snapshot with the greatest ordering tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeStatus {
    pub address: Address,
    pub owners: Vec<Address>,
    pub threshold: u64,
    pub nonce: Nonce,
    pub master_copy: Address,
}

impl SafeStatus {
    /// Removes `owner` from the owner list. Returns whether it was present.
    pub fn remove_owner(&mut self, owner: &Address) -> bool {
        match self.owners.iter().position(|o| o == owner) {
            Some(position) => {
                self.owners.remove(position);
                true
            }
            None => false,
        }
    }

    /// Replaces `old_owner` with `new_owner` preserving its position.
    /// Returns whether `old_owner` was present.
    pub fn swap_owner(&mut self, old_owner: &Address, new_owner: Address) -> bool {
        match self.owners.iter().position(|o| o == old_owner) {
            Some(position) => {
                self.owners[position] = new_owner;
                true
            }
            None => false,
        }
    }
}
