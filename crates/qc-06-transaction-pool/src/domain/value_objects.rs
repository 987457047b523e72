//! Value objects for the transaction pool.
//!
//! Immutable results and snapshots handed out by pool operations.

use super::entities::{BlockHeight, OutputDiffs, TransactionId};

/// Result of putting a batch of transactions back into the pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reinsertion {
    /// Every map change made while undoing and reinserting, in order.
    pub diffs: OutputDiffs,
    /// Number of transactions that passed validation again.
    pub readded: usize,
    /// Transactions that no longer validate and were dropped.
    pub dropped: Vec<TransactionId>,
}

/// Summary of one resynchronization against the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResyncOutcome {
    /// Number of confirmed blocks reverted.
    pub reverted_blocks: usize,
    /// Number of confirmed blocks applied.
    pub applied_blocks: usize,
    /// Transactions back in the pool afterwards.
    pub readded: usize,
    /// Transactions dropped because they no longer validate or were confirmed.
    pub dropped: Vec<TransactionId>,
    /// Ledger height the pool is rebased on.
    pub height: BlockHeight,
    /// Ledger diffs that did not match the pool's maps.
    pub inconsistent_diffs: usize,
    /// Sequence number of the update log entry written for this resync.
    pub log_sequence: u64,
}

/// Snapshot of pool sizes for monitoring.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStatus {
    /// Pending transactions.
    pub transactions: usize,
    /// Spendable value outputs in the unconfirmed view.
    pub value_outputs: usize,
    /// Open contracts in the unconfirmed view.
    pub contracts: usize,
    /// Spendable asset outputs in the unconfirmed view.
    pub asset_outputs: usize,
    /// Objects held in the reference set.
    pub reference_objects: usize,
    /// Ledger height the pool is rebased on.
    pub height: BlockHeight,
    /// Entries in the update log.
    pub log_entries: usize,
    /// Registered subscribers.
    pub subscribers: usize,
}

impl PoolStatus {
    /// Returns true if no transaction is pending.
    pub fn is_empty(&self) -> bool {
        self.transactions == 0
    }
}
